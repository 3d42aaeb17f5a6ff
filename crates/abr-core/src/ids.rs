//! Typed identifiers for sessions, engine instances, load attempts and bus
//! events.
//!
//! Each ID type is a newtype over `Uuid`. The controller compares them by
//! identity to discard stale loader outcomes and events from engine
//! instances that have already been torn down.
//!
//! `Display` renders a short tagged form (`inst-9f1c02ab`) for log fields;
//! serialization always carries the full UUID.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Hex digits of the UUID shown by `Display`.
const SHORT_LEN: usize = 8;

/// Generate a newtype ID wrapper over `Uuid` with a log tag.
macro_rules! typed_id {
    ($($(#[doc = $doc:expr])* $name:ident => $tag:literal),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(Uuid);

            impl $name {
                /// Tag prefixed to the short form.
                pub const TAG: &'static str = $tag;

                /// Create a new random ID.
                #[must_use]
                pub fn new() -> Self {
                    Self(Uuid::new_v4())
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    let simple = self.0.simple().to_string();
                    write!(f, "{}-{}", Self::TAG, &simple[..SHORT_LEN])
                }
            }
        )+
    };
}

typed_id! {
    /// Identifies one playback session (one controller / media element pair).
    SessionId => "sess",
    /// Identifies one engine instance; a new one is minted on every attach.
    InstanceId => "inst",
    /// Identifies one `setup()` attempt, used as the loader abort token.
    AttemptId => "load",
    /// Identifies one event dispatched on the player bus.
    EventId => "evt",
}
