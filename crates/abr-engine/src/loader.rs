//! Engine library resolution.
//!
//! An [`EngineLoader`] turns an [`EngineLibrary`] into a ready constructor,
//! dispatching the lib-load lifecycle on the player bus: `{prefix}-lib-load-start`
//! first, then exactly one of `{prefix}-lib-loaded` or `{prefix}-lib-load-error`.
//! The constructor's own environment check runs before success is declared;
//! when it fails the loader additionally dispatches `{prefix}-unsupported`.
//!
//! Script injections are shared: concurrent loads of the same URL await one
//! injection, and a URL that loaded once is never injected again.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use abr_core::{Error, EventDetail, PlayerBus, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::traits::EngineConstructor;

/// Exports of a dynamically imported engine module.
#[derive(Clone, Default)]
pub struct ModuleExports {
    pub default: Option<Arc<dyn EngineConstructor>>,
}

pub type ModuleFuture = BoxFuture<'static, Result<Option<ModuleExports>>>;

/// Deferred module import.
pub type ModuleLoader = Arc<dyn Fn() -> ModuleFuture + Send + Sync>;

/// Where the engine comes from.
#[derive(Clone)]
pub enum EngineLibrary {
    /// Remote script installing a global namespace.
    Url(String),
    /// The constructor itself.
    Module(Arc<dyn EngineConstructor>),
    /// A deferred import resolving to a module with a default export.
    Loader(ModuleLoader),
}

impl EngineLibrary {
    pub fn loader<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ModuleExports>>> + Send + 'static,
    {
        EngineLibrary::Loader(Arc::new(move || f().boxed()))
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            EngineLibrary::Url(url) => Some(url),
            _ => None,
        }
    }
}

impl From<&str> for EngineLibrary {
    fn from(url: &str) -> Self {
        EngineLibrary::Url(url.to_string())
    }
}

impl From<String> for EngineLibrary {
    fn from(url: String) -> Self {
        EngineLibrary::Url(url)
    }
}

impl fmt::Debug for EngineLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineLibrary::Url(url) => f.debug_tuple("Url").field(url).finish(),
            EngineLibrary::Module(ctor) => f.debug_tuple("Module").field(&ctor.name()).finish(),
            EngineLibrary::Loader(_) => f.write_str("Loader(..)"),
        }
    }
}

impl fmt::Display for EngineLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineLibrary::Url(url) => f.write_str(url),
            EngineLibrary::Module(ctor) => write!(f, "<module {}>", ctor.name()),
            EngineLibrary::Loader(_) => f.write_str("<deferred import>"),
        }
    }
}

/// The environment that executes remote scripts.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Fetch and execute the script at `url`.
    async fn inject(&self, url: &str) -> Result<()>;

    /// Constructor installed under a global namespace, if any.
    fn lookup_global(&self, namespace: &str) -> Option<Arc<dyn EngineConstructor>>;
}

type Injection = Shared<BoxFuture<'static, Result<()>>>;

/// Resolves engine libraries and reports the load lifecycle.
pub struct EngineLoader {
    host: Arc<dyn ScriptHost>,
    bus: Arc<PlayerBus>,
    prefix: &'static str,
    namespace: String,
    injections: Mutex<HashMap<String, Injection>>,
}

impl EngineLoader {
    pub fn new(host: Arc<dyn ScriptHost>, bus: Arc<PlayerBus>, prefix: &'static str, namespace: impl Into<String>) -> Self {
        Self {
            host,
            bus,
            prefix,
            namespace: namespace.into(),
            injections: Mutex::new(HashMap::new()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolve `library` to a constructor the environment supports.
    pub async fn load(&self, library: &EngineLibrary) -> Result<Arc<dyn EngineConstructor>> {
        info!(library = %library, "loading engine library");
        self.bus
            .dispatch(format!("{}-lib-load-start", self.prefix), EventDetail::None, None);

        let resolved = match library {
            EngineLibrary::Url(url) => self.load_script(url).await,
            EngineLibrary::Module(ctor) => Ok(Arc::clone(ctor)),
            EngineLibrary::Loader(import) => match import().await {
                Ok(Some(ModuleExports { default: Some(ctor) })) => Ok(ctor),
                Ok(_) => Err(Error::engine_load("dynamic import returned invalid constructor")),
                Err(e) => Err(e),
            },
        };

        let ctor = match resolved {
            Ok(ctor) => ctor,
            Err(err) => {
                self.report_error(library, &err);
                return Err(err);
            }
        };

        if !ctor.supports_media_source() {
            let err = Error::EngineUnsupported(format!("{} is not supported in this environment", ctor.name()));
            self.report_error(library, &err);
            self.bus
                .dispatch(format!("{}-unsupported", self.prefix), EventDetail::None, None);
            return Err(err);
        }

        info!(library = %library, engine = ctor.name(), version = ?ctor.version(), "engine library loaded");
        self.bus.dispatch(
            format!("{}-lib-loaded", self.prefix),
            EventDetail::Engine {
                name: ctor.name().to_string(),
                version: ctor.version(),
            },
            None,
        );
        Ok(ctor)
    }

    async fn load_script(&self, url: &str) -> Result<Arc<dyn EngineConstructor>> {
        let injection = {
            let mut injections = self.injections.lock();
            injections
                .entry(url.to_string())
                .or_insert_with(|| {
                    debug!(url, "injecting engine script");
                    let host = Arc::clone(&self.host);
                    let url = url.to_string();
                    async move { host.inject(&url).await }.boxed().shared()
                })
                .clone()
        };

        if let Err(err) = injection.clone().await {
            let mut injections = self.injections.lock();
            if injections.get(url).is_some_and(|current| current.ptr_eq(&injection)) {
                injections.remove(url);
            }
            return Err(err);
        }

        self.host
            .lookup_global(&self.namespace)
            .ok_or_else(|| Error::engine_load(format!("missing global `{}`", self.namespace)))
    }

    fn report_error(&self, library: &EngineLibrary, err: &Error) {
        error!(library = %library, error = %err, "failed to load engine library");
        self.bus
            .dispatch(format!("{}-lib-load-error", self.prefix), EventDetail::from(err), None);
    }
}

impl fmt::Debug for EngineLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineLoader")
            .field("prefix", &self.prefix)
            .field("namespace", &self.namespace)
            .field("injections", &self.injections.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConstructor, MockScriptHost};
    use std::time::Duration;

    const URL: &str = "https://cdn.example/dash.all.min.js";

    fn names(bus: &PlayerBus) -> Vec<String> {
        let mut names: Vec<String> = bus.recent_events(100).into_iter().map(|e| e.name).collect();
        names.reverse();
        names
    }

    fn loader_with(host: MockScriptHost) -> (EngineLoader, Arc<MockScriptHost>, Arc<PlayerBus>) {
        let host = Arc::new(host);
        let bus = Arc::new(PlayerBus::default());
        let loader = EngineLoader::new(host.clone(), bus.clone(), "dash", "dashjs");
        (loader, host, bus)
    }

    #[tokio::test]
    async fn url_load_emits_start_then_loaded() {
        let (loader, _host, bus) =
            loader_with(MockScriptHost::new().installing("dashjs", Arc::new(MockConstructor::new())));

        let ctor = loader.load(&URL.into()).await.unwrap();

        assert_eq!(ctor.name(), "mock-dash");
        assert_eq!(names(&bus), vec!["dash-lib-load-start", "dash-lib-loaded"]);
    }

    #[tokio::test]
    async fn missing_global_is_load_error() {
        let (loader, _host, bus) = loader_with(MockScriptHost::new());

        let err = loader.load(&URL.into()).await.unwrap_err();

        assert_eq!(err.kind(), "engine-load");
        assert!(err.to_string().contains("missing global"));
        assert_eq!(names(&bus), vec!["dash-lib-load-start", "dash-lib-load-error"]);
    }

    #[tokio::test]
    async fn failed_injection_is_retried_on_next_load() {
        let (loader, host, bus) =
            loader_with(MockScriptHost::new().installing("dashjs", Arc::new(MockConstructor::new())));
        host.fail_next(1);

        assert!(loader.load(&URL.into()).await.is_err());
        assert!(loader.load(&URL.into()).await.is_ok());

        assert_eq!(host.injections().len(), 2);
        assert_eq!(bus.events_named("dash-lib-load-error").len(), 1);
        assert_eq!(bus.events_named("dash-lib-loaded").len(), 1);
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_injection() {
        let (loader, host, _bus) = loader_with(
            MockScriptHost::new()
                .installing("dashjs", Arc::new(MockConstructor::new()))
                .with_delay(Duration::from_millis(20)),
        );
        let library: EngineLibrary = URL.into();

        let (a, b) = tokio::join!(loader.load(&library), loader.load(&library));
        assert!(a.is_ok() && b.is_ok());
        assert!(loader.load(&library).await.is_ok());

        assert_eq!(host.injections(), vec![URL.to_string()]);
    }

    #[tokio::test]
    async fn module_and_deferred_import() {
        let (loader, host, _bus) = loader_with(MockScriptHost::new());
        let ctor: Arc<dyn EngineConstructor> = Arc::new(MockConstructor::new());

        assert!(loader.load(&EngineLibrary::Module(ctor.clone())).await.is_ok());

        let deferred = EngineLibrary::loader(move || {
            let ctor = ctor.clone();
            async move { Ok(Some(ModuleExports { default: Some(ctor) })) }
        });
        assert!(loader.load(&deferred).await.is_ok());
        assert!(host.injections().is_empty());
    }

    #[tokio::test]
    async fn deferred_import_without_default_fails() {
        let (loader, _host, bus) = loader_with(MockScriptHost::new());
        let empty = EngineLibrary::loader(|| async { Ok(Some(ModuleExports::default())) });

        let err = loader.load(&empty).await.unwrap_err();

        assert!(err.to_string().contains("invalid constructor"));
        assert_eq!(bus.events_named("dash-lib-load-error").len(), 1);
    }

    #[tokio::test]
    async fn unsupported_environment_is_distinct_from_load_failure() {
        let (loader, _host, bus) = loader_with(MockScriptHost::new());
        let ctor: Arc<dyn EngineConstructor> = Arc::new(MockConstructor::unsupported());

        let err = loader.load(&EngineLibrary::Module(ctor)).await.unwrap_err();

        assert_eq!(err.kind(), "engine-unsupported");
        assert_eq!(err.code(), 4);
        assert_eq!(
            names(&bus),
            vec!["dash-lib-load-start", "dash-lib-load-error", "dash-unsupported"]
        );
        assert!(bus.events_named("dash-lib-loaded").is_empty());
    }
}
