//! Scheme and host to adapter bindings.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::adapter::Adapter;
use crate::error::ResourceError;
use crate::uri::Uri;

/// Host pattern matching any host of a scheme.
pub const WILDCARD: &str = "*";

/// Registry of `(scheme, host)` bindings.
///
/// Bindings are registered during setup; a second binding for the same pair
/// replaces the first. Lookups take `&self` and are safe from many threads
/// once setup is done.
#[derive(Default, Clone)]
pub struct SchemeCollection {
    schemes: HashMap<String, HashMap<String, Arc<dyn Adapter>>>,
}

/// Builder step holding the scheme name.
pub struct SchemeBinder<'a> {
    collection: &'a mut SchemeCollection,
    scheme: String,
}

/// Builder step holding scheme and host pattern.
pub struct HostBinder<'a> {
    collection: &'a mut SchemeCollection,
    scheme: String,
    host: String,
}

impl SchemeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a binding: `scheme("app").host("self").to_adapter(adapter)`.
    pub fn scheme(&mut self, name: impl Into<String>) -> SchemeBinder<'_> {
        SchemeBinder {
            collection: self,
            scheme: name.into().to_ascii_lowercase(),
        }
    }

    fn insert(&mut self, scheme: String, host: String, adapter: Arc<dyn Adapter>) {
        let hosts = self.schemes.entry(scheme.clone()).or_default();
        if hosts.insert(host.clone(), adapter).is_some() {
            debug!(scheme = %scheme, host = %host, "replaced adapter binding");
        }
    }

    /// Adapter for `uri`: exact host first, then the scheme's `*` binding.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::AdapterNotFound` if neither is bound.
    pub fn get(&self, uri: &Uri) -> Result<Arc<dyn Adapter>, ResourceError> {
        self.schemes
            .get(uri.scheme())
            .and_then(|hosts| hosts.get(uri.host()).or_else(|| hosts.get(WILDCARD)))
            .cloned()
            .ok_or_else(|| ResourceError::AdapterNotFound {
                scheme: uri.scheme().to_string(),
                host: uri.host().to_string(),
            })
    }

    /// True if `scheme://host` has its own binding (wildcards not considered).
    pub fn contains(&self, scheme: &str, host: &str) -> bool {
        self.schemes
            .get(scheme)
            .is_some_and(|hosts| hosts.contains_key(host))
    }

    pub fn len(&self) -> usize {
        self.schemes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> SchemeBinder<'a> {
    pub fn host(self, pattern: impl Into<String>) -> HostBinder<'a> {
        HostBinder {
            collection: self.collection,
            scheme: self.scheme,
            host: pattern.into().to_ascii_lowercase(),
        }
    }
}

impl<'a> HostBinder<'a> {
    /// Bind the adapter and return the collection for further bindings.
    pub fn to_adapter(self, adapter: impl Adapter + 'static) -> &'a mut SchemeCollection {
        self.to_shared_adapter(Arc::new(adapter))
    }

    pub fn to_shared_adapter(self, adapter: Arc<dyn Adapter>) -> &'a mut SchemeCollection {
        self.collection.insert(self.scheme, self.host, adapter);
        self.collection
    }
}
