//! Name → factory registries.
//!
//! Each provider family (caches, certificate providers, policy queries, policy
//! engines, graph stores, credential providers) gets its own [`Registry`], so
//! names only need to be unique within a family.
//!
//! Registration happens while the host is starting up, before any lookup. A
//! duplicate name is a wiring bug and aborts the process; an unknown name at
//! [`Registry::create`] time is a user misconfiguration and is returned as a
//! `PROVIDER_NOT_FOUND` error.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error};

use crate::errors::code::{CACHE_NOT_SET, PROVIDER_NOT_FOUND};
use crate::errors::{ComponentType, Error, Result};

/// Unrecoverable startup failures.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Two providers registered under the same name in one family.
    #[error("duplicate {family} registration: {name}")]
    DuplicateProvider { family: &'static str, name: String },

    /// Two error descriptors claimed the same code.
    #[error("error code {code} is already registered")]
    DuplicateErrorCode { code: u32 },

    /// Two error descriptors claimed the same value string.
    #[error("error value {value} is already registered")]
    DuplicateErrorValue { value: String },
}

impl StartupError {
    /// Log and abort the process.
    pub fn abort(self) -> ! {
        error!(error = %self, "fatal startup error, aborting");
        std::process::abort()
    }
}

/// Constructor for one provider implementation.
pub trait Factory<P, O>: Send + Sync {
    fn create(&self, params: P) -> Result<O>;
}

impl<P, O, F> Factory<P, O> for F
where
    F: Fn(P) -> Result<O> + Send + Sync,
{
    fn create(&self, params: P) -> Result<O> {
        self(params)
    }
}

/// Registry for one provider family.
pub struct Registry<P, O> {
    family: &'static str,
    component: ComponentType,
    factories: RwLock<BTreeMap<String, Arc<dyn Factory<P, O>>>>,
}

impl<P, O> Registry<P, O> {
    pub fn new(family: &'static str, component: ComponentType) -> Self {
        Self {
            family,
            component,
            factories: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Register `factory` under `name`, aborting the process on duplicates.
    pub fn register(&self, name: impl Into<String>, factory: impl Factory<P, O> + 'static) {
        if let Err(e) = self.try_register(name, factory) {
            e.abort();
        }
    }

    /// Register `factory` under `name`.
    pub fn try_register(
        &self,
        name: impl Into<String>,
        factory: impl Factory<P, O> + 'static,
    ) -> std::result::Result<(), StartupError> {
        let name = name.into();
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if factories.contains_key(&name) {
            return Err(StartupError::DuplicateProvider {
                family: self.family,
                name,
            });
        }

        debug!(family = self.family, name = %name, "registered provider");
        factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Construct the provider registered under `name`.
    pub fn create(&self, name: &str, params: P) -> Result<O> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();

        let Some(factory) = factory else {
            return Err(PROVIDER_NOT_FOUND
                .with_detail(format!("no {} registered with name '{}'", self.family, name))
                .with_component_type(self.component)
                .with_plugin_name(name)
                .with_remediation(format!(
                    "use one of the registered {} names: {}",
                    self.family,
                    self.names().join(", ")
                )));
        };

        debug!(family = self.family, name, "creating provider");
        factory.create(params)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl<P, O> std::fmt::Debug for Registry<P, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("family", &self.family)
            .field("names", &self.names())
            .finish()
    }
}

/// Registry that also remembers the most recently created instance.
///
/// Used for families where exactly one implementation is active at a time.
pub struct CurrentRegistry<P, O> {
    inner: Registry<P, O>,
    current: RwLock<Option<O>>,
}

impl<P, O: Clone> CurrentRegistry<P, O> {
    pub fn new(family: &'static str, component: ComponentType) -> Self {
        Self {
            inner: Registry::new(family, component),
            current: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &Registry<P, O> {
        &self.inner
    }

    pub fn register(&self, name: impl Into<String>, factory: impl Factory<P, O> + 'static) {
        self.inner.register(name, factory)
    }

    pub fn try_register(
        &self,
        name: impl Into<String>,
        factory: impl Factory<P, O> + 'static,
    ) -> std::result::Result<(), StartupError> {
        self.inner.try_register(name, factory)
    }

    /// Create an instance and make it the current one.
    pub fn create(&self, name: &str, params: P) -> Result<O> {
        let instance = self.inner.create(name, params)?;
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(instance.clone());
        Ok(instance)
    }

    /// The instance from the last successful [`CurrentRegistry::create`].
    pub fn current(&self) -> Result<O> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                Error::new(CACHE_NOT_SET)
                    .with_detail(format!("no {} has been created yet", self.inner.family))
                    .with_component_type(self.inner.component)
            })
    }
}

impl<P, O> std::fmt::Debug for CurrentRegistry<P, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentRegistry")
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::code::CONFIG_INVALID;

    fn doubling_registry() -> Registry<u32, u32> {
        let registry = Registry::new("test provider", ComponentType::Executor);
        registry.register("double", |n: u32| -> Result<u32> { Ok(n * 2) });
        registry
    }

    #[test]
    fn test_create_registered() {
        let registry = doubling_registry();
        assert_eq!(registry.create("double", 21).unwrap(), 42);
        assert!(registry.contains("double"));
        assert_eq!(registry.names(), vec!["double".to_string()]);
    }

    #[test]
    fn test_create_unknown_is_not_found() {
        let registry = doubling_registry();
        let err = registry.create("triple", 1).unwrap_err();
        assert_eq!(err.code(), PROVIDER_NOT_FOUND);
        assert_eq!(err.component_type(), Some(ComponentType::Executor));
        assert_eq!(err.plugin_name(), Some("triple"));
        assert!(err.to_string().contains("double"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = doubling_registry();
        let err = registry
            .try_register("double", |n: u32| -> Result<u32> { Ok(n + n) })
            .unwrap_err();
        assert!(matches!(
            err,
            StartupError::DuplicateProvider { ref name, .. } if name == "double"
        ));
        // Original factory is untouched.
        assert_eq!(registry.create("double", 2).unwrap(), 4);
    }

    #[test]
    fn test_families_are_independent() {
        let a: Registry<(), &'static str> = Registry::new("cache", ComponentType::Cache);
        let b: Registry<(), &'static str> = Registry::new("store", ComponentType::ReferrerStore);
        a.register("memory", |_: ()| -> Result<&'static str> { Ok("cache") });
        b.register("memory", |_: ()| -> Result<&'static str> { Ok("store") });
        assert_eq!(a.create("memory", ()).unwrap(), "cache");
        assert_eq!(b.create("memory", ()).unwrap(), "store");
    }

    #[test]
    fn test_factory_error_passes_through() {
        let registry: Registry<bool, ()> = Registry::new("test", ComponentType::Policy);
        registry.register("strict", |ok: bool| -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(CONFIG_INVALID.with_detail("rejected"))
            }
        });
        let err = registry.create("strict", false).unwrap_err();
        assert_eq!(err.code(), CONFIG_INVALID);
    }

    #[test]
    fn test_current_slot() {
        let registry: CurrentRegistry<u32, Arc<u32>> =
            CurrentRegistry::new("cache", ComponentType::Cache);
        registry.register("boxed", |n: u32| -> Result<Arc<u32>> { Ok(Arc::new(n)) });

        let err = registry.current().unwrap_err();
        assert_eq!(err.code(), CACHE_NOT_SET);

        registry.create("boxed", 7).unwrap();
        assert_eq!(*registry.current().unwrap(), 7);

        registry.create("boxed", 9).unwrap();
        assert_eq!(*registry.current().unwrap(), 9);

        assert!(registry.create("missing", 1).is_err());
        assert_eq!(*registry.current().unwrap(), 9);
    }
}
