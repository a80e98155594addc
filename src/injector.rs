//! Service registry consumed by adapters and injected parameters.
//!
//! Bindings are made during setup; afterwards the injector is shared behind an
//! `Arc` and only read.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Type-erased service instance.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Identifies a bound service by its concrete type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceKey {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Typed service bindings plus named (qualified) values.
#[derive(Default)]
pub struct Injector {
    services: HashMap<TypeId, Service>,
    named: HashMap<String, Value>,
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `instance` as the shared instance of `T`. A later binding replaces it.
    pub fn bind<T: Any + Send + Sync>(&mut self, instance: Arc<T>) -> &mut Self {
        self.services.insert(TypeId::of::<T>(), instance);
        self
    }

    /// Bind a value under a qualifier name (e.g. `app_name`).
    pub fn bind_named(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn get_instance<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Look up a service by key without knowing its static type.
    pub fn get_service(&self, key: &ServiceKey) -> Option<Service> {
        self.services.get(&key.type_id).cloned()
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.services.contains_key(&key.type_id)
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("services", &self.services.len())
            .field("named", &self.named)
            .finish()
    }
}
