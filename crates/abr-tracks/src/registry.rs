//! Ordered, single-select track registry.
//!
//! A [`TrackRegistry`] holds the qualities or audio tracks of the current
//! stream. Every mutation is tagged with an [`Origin`] so the session
//! controller can tell engine-reported changes (which it must not echo back
//! to the engine) from caller intents (which it must forward).

use std::fmt;

use abr_core::{EventRef, Result, SwitchMode};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Channel capacity for registry change subscribers.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// An entry that can live in a [`TrackRegistry`].
pub trait ListItem: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Stable string identifier of the entry.
    fn id(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Origin / Cause
// ---------------------------------------------------------------------------

/// Who asked for a registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// The engine reported its own choice.
    Engine,
    /// A caller (UI, API) expressed an intent.
    Caller,
}

/// Origin plus the causal event of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cause {
    pub origin: Origin,
    pub trigger: Option<EventRef>,
}

impl Cause {
    /// A mutation reported by the engine, caused by `trigger`.
    pub fn engine(trigger: Option<EventRef>) -> Self {
        Self {
            origin: Origin::Engine,
            trigger,
        }
    }

    /// A mutation requested by a caller.
    pub fn caller() -> Self {
        Self {
            origin: Origin::Caller,
            trigger: None,
        }
    }

    pub fn is_user_initiated(&self) -> bool {
        self.origin == Origin::Caller
    }
}

// ---------------------------------------------------------------------------
// RegistryChange
// ---------------------------------------------------------------------------

/// What changed in a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// The whole list was replaced.
    Replaced { len: usize, selected: Option<usize> },
    /// The selection moved. `auto_cleared` is set when a caller selection
    /// turned auto mode off on the way.
    Selected {
        index: usize,
        previous: Option<usize>,
        auto_cleared: bool,
    },
    /// Auto mode was toggled.
    Auto { enabled: bool },
    /// The list was emptied on teardown.
    Cleared,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryChange {
    /// Name of the registry that changed.
    pub list: &'static str,
    pub kind: ChangeKind,
    pub origin: Origin,
    pub trigger: Option<EventRef>,
}

impl RegistryChange {
    /// Whether the controller must turn this change into an engine call.
    pub fn needs_forwarding(&self) -> bool {
        self.origin == Origin::Caller
    }
}

// ---------------------------------------------------------------------------
// TrackRegistry
// ---------------------------------------------------------------------------

/// Ordered sequence with at most one selected entry and an optional auto
/// flag.
///
/// Invariant: `selected`, when set, is a valid index into `items`.
pub struct TrackRegistry<T: ListItem> {
    name: &'static str,
    items: Vec<T>,
    selected: Option<usize>,
    auto: bool,
    auto_capable: bool,
    switch: SwitchMode,
    tx: broadcast::Sender<RegistryChange>,
}

impl<T: ListItem> TrackRegistry<T> {
    /// Create an empty registry. Only registries with `auto_capable` accept
    /// [`set_auto`](Self::set_auto).
    pub fn new(name: &'static str, auto_capable: bool) -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            name,
            items: Vec::new(),
            selected: None,
            auto: false,
            auto_capable,
            switch: SwitchMode::default(),
            tx,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }

    /// Whether the engine (not the caller) is choosing the active entry.
    pub fn auto(&self) -> bool {
        self.auto
    }

    pub fn switch_mode(&self) -> SwitchMode {
        self.switch
    }

    pub fn set_switch_mode(&mut self, mode: SwitchMode) {
        self.switch = mode;
    }

    /// Position of the first entry equal to `item`.
    pub fn position(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    /// First entry with the given identifier.
    pub fn find_by_id(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|i| i.id() == id)
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryChange> {
        self.tx.subscribe()
    }

    /// Clear and repopulate the list in one step.
    ///
    /// The selection is reset to `default` when it names a valid index, and
    /// to "no selection" otherwise. Exactly one notification is emitted.
    pub fn replace_all(&mut self, items: Vec<T>, default: Option<usize>, cause: Cause) -> RegistryChange {
        self.selected = default.filter(|&i| i < items.len());
        self.items = items;
        tracing::debug!(list = self.name, len = self.items.len(), "registry replaced");
        self.emit(
            ChangeKind::Replaced {
                len: self.items.len(),
                selected: self.selected,
            },
            cause,
        )
    }

    /// Select `item`.
    ///
    /// A caller selection turns auto mode off before applying; an engine
    /// selection leaves auto mode alone. Returns `Ok(None)` when nothing
    /// changed, and a selection error when `item` is not in the list.
    pub fn select(&mut self, item: &T, cause: Cause) -> Result<Option<RegistryChange>> {
        match self.position(item) {
            Some(index) => Ok(self.apply_selection(index, cause)),
            None => Err(abr_core::Error::selection(
                self.name,
                format!("{} is not in the list", item.id()),
            )),
        }
    }

    /// Select the entry at `index`. See [`select`](Self::select).
    pub fn select_index(&mut self, index: usize, cause: Cause) -> Result<Option<RegistryChange>> {
        if index >= self.items.len() {
            return Err(abr_core::Error::selection(
                self.name,
                format!("index {index} out of range (len {})", self.items.len()),
            ));
        }
        Ok(self.apply_selection(index, cause))
    }

    fn apply_selection(&mut self, index: usize, cause: Cause) -> Option<RegistryChange> {
        let auto_cleared = cause.is_user_initiated() && self.auto;
        if self.selected == Some(index) && !auto_cleared {
            return None;
        }
        if auto_cleared {
            self.auto = false;
        }
        let previous = self.selected.replace(index);
        Some(self.emit(
            ChangeKind::Selected {
                index,
                previous,
                auto_cleared,
            },
            cause,
        ))
    }

    /// Toggle auto mode. Re-asserting the current value emits nothing.
    pub fn set_auto(&mut self, enabled: bool, cause: Cause) -> Result<Option<RegistryChange>> {
        if !self.auto_capable {
            return Err(abr_core::Error::selection(self.name, "auto mode is not supported"));
        }
        if self.auto == enabled {
            return Ok(None);
        }
        self.auto = enabled;
        Ok(Some(self.emit(ChangeKind::Auto { enabled }, cause)))
    }

    /// Empty the registry and drop auto mode. Emits once, and only when
    /// there was something to clear.
    pub fn reset(&mut self, cause: Cause) -> Option<RegistryChange> {
        if self.items.is_empty() && self.selected.is_none() && !self.auto {
            return None;
        }
        self.items.clear();
        self.selected = None;
        self.auto = false;
        Some(self.emit(ChangeKind::Cleared, cause))
    }

    fn emit(&self, kind: ChangeKind, cause: Cause) -> RegistryChange {
        let change = RegistryChange {
            list: self.name,
            kind,
            origin: cause.origin,
            trigger: cause.trigger,
        };
        // No subscribers is fine.
        let _ = self.tx.send(change.clone());
        change
    }
}

impl<T: ListItem> fmt::Debug for TrackRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackRegistry")
            .field("name", &self.name)
            .field("len", &self.items.len())
            .field("selected", &self.selected)
            .field("auto", &self.auto)
            .field("switch", &self.switch)
            .finish()
    }
}
