//! Adapters turn a URI into the resource object that will handle it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ResourceError;
use crate::injector::Injector;
use crate::resource::ResourceObject;
use crate::uri::Uri;

#[cfg(feature = "remote")]
pub use self::http::{HttpAdapter, HttpResource};

/// Resolves URIs for one `(scheme, host)` binding.
///
/// Implementations must be shareable across threads; a fresh resource object
/// is expected per call unless the adapter is deliberately stateful.
pub trait Adapter: Send + Sync {
    /// # Errors
    ///
    /// Returns `ResourceError::ResourceNotFound` when nothing answers `uri`.
    fn resolve(&self, uri: &Uri) -> Result<Box<dyn ResourceObject>, ResourceError>;
}

/// Creates a resource object, pulling what it needs from the injector.
pub type Factory = Arc<dyn Fn(&Injector) -> Box<dyn ResourceObject> + Send + Sync>;

/// Context name for `page://` resources.
pub const PAGE: &str = "page";
/// Context name for `app://` resources.
pub const APP: &str = "app";

/// In-process resources of one application, keyed by context and path.
#[derive(Clone)]
pub struct AppCatalog {
    name: String,
    factories: HashMap<(String, String), Factory>,
}

impl AppCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factories: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a resource under `context` (e.g. `page`, `app`) and `path`.
    pub fn resource<R, F>(mut self, context: &str, path: &str, factory: F) -> Self
    where
        R: ResourceObject,
        F: Fn(&Injector) -> R + Send + Sync + 'static,
    {
        let create: Factory = Arc::new(move |injector: &Injector| -> Box<dyn ResourceObject> {
            Box::new(factory(injector))
        });
        self.factories
            .insert((context.to_string(), normalize(path)), create);
        self
    }

    pub fn page<R, F>(self, path: &str, factory: F) -> Self
    where
        R: ResourceObject,
        F: Fn(&Injector) -> R + Send + Sync + 'static,
    {
        self.resource(PAGE, path, factory)
    }

    pub fn app<R, F>(self, path: &str, factory: F) -> Self
    where
        R: ResourceObject,
        F: Fn(&Injector) -> R + Send + Sync + 'static,
    {
        self.resource(APP, path, factory)
    }

    pub fn create(
        &self,
        context: &str,
        path: &str,
        injector: &Injector,
    ) -> Option<Box<dyn ResourceObject>> {
        self.factories
            .get(&(context.to_string(), normalize(path)))
            .map(|factory| factory(injector))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for AppCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self
            .factories
            .keys()
            .map(|(context, path)| format!("{}:{}", context, path))
            .collect();
        keys.sort();
        f.debug_struct("AppCatalog")
            .field("name", &self.name)
            .field("resources", &keys)
            .finish()
    }
}

/// `/` and the empty path address `/index`; trailing slashes are ignored.
fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/index".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Serves one context of an [`AppCatalog`] by instantiating resources in-process.
pub struct AppAdapter {
    context: String,
    catalog: Arc<AppCatalog>,
    injector: Arc<Injector>,
}

impl AppAdapter {
    pub fn new(context: impl Into<String>, catalog: Arc<AppCatalog>, injector: Arc<Injector>) -> Self {
        Self {
            context: context.into(),
            catalog,
            injector,
        }
    }
}

impl Adapter for AppAdapter {
    fn resolve(&self, uri: &Uri) -> Result<Box<dyn ResourceObject>, ResourceError> {
        self.catalog
            .create(&self.context, uri.path(), &self.injector)
            .ok_or_else(|| ResourceError::ResourceNotFound { uri: uri.base() })
    }
}

#[cfg(feature = "remote")]
mod http {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use reqwest::Method;
    use serde_json::Value;

    use super::Adapter;
    use crate::error::ResourceError;
    use crate::param::Param;
    use crate::resource::{Args, ResourceObject, ResourceState};
    use crate::types::Verb;
    use crate::uri::Uri;

    /// Default timeout for HTTP requests (10 seconds).
    const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

    /// Adapter for `http://` and `https://` resources.
    #[derive(Debug, Clone)]
    pub struct HttpAdapter {
        client: Client,
    }

    impl HttpAdapter {
        /// # Errors
        ///
        /// Returns `ResourceError::Config` if the HTTP client cannot be built.
        pub fn new() -> Result<Self, ResourceError> {
            let client = Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .map_err(|e| ResourceError::config(format!("http client: {}", e)))?;
            Ok(Self { client })
        }
    }

    impl Adapter for HttpAdapter {
        fn resolve(&self, _uri: &Uri) -> Result<Box<dyn ResourceObject>, ResourceError> {
            Ok(Box::new(HttpResource {
                client: self.client.clone(),
                state: ResourceState::default(),
            }))
        }
    }

    /// Remote resource; the request URI (query included) is fetched as is.
    ///
    /// JSON responses become the body; anything else is kept as a string.
    #[derive(Debug)]
    pub struct HttpResource {
        client: Client,
        state: ResourceState,
    }

    impl ResourceObject for HttpResource {
        fn state(&self) -> &ResourceState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut ResourceState {
            &mut self.state
        }

        fn signature(&self, verb: Verb) -> Option<Vec<Param>> {
            matches!(verb, Verb::Get | Verb::Delete).then(Vec::new)
        }

        fn invoke(&mut self, verb: Verb, _args: &Args) -> Result<(), ResourceError> {
            let uri = self
                .state
                .uri
                .as_ref()
                .ok_or_else(|| ResourceError::invocation("http resource has no uri"))?
                .to_string();
            let method = match verb {
                Verb::Delete => Method::DELETE,
                _ => Method::GET,
            };

            let response = self
                .client
                .request(method, uri.as_str())
                .send()
                .map_err(|e| ResourceError::invocation(format!("{}: {}", uri, e)))?;

            self.state.code = response.status().as_u16();
            for (name, value) in response.headers() {
                if let Ok(value) = value.to_str() {
                    self.state
                        .headers
                        .insert(name.as_str().to_string(), value.to_string());
                }
            }

            let text = response
                .text()
                .map_err(|e| ResourceError::invocation(format!("{}: {}", uri, e)))?;
            self.state.body = if text.is_empty() {
                None
            } else {
                Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
            };
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Param;
    use crate::resource::{Args, ResourceState};
    use crate::types::Verb;

    #[derive(Default)]
    struct Index {
        state: ResourceState,
    }

    impl ResourceObject for Index {
        fn state(&self) -> &ResourceState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut ResourceState {
            &mut self.state
        }

        fn signature(&self, _verb: Verb) -> Option<Vec<Param>> {
            None
        }

        fn invoke(&mut self, _verb: Verb, _args: &Args) -> Result<(), ResourceError> {
            Ok(())
        }
    }

    fn adapter(context: &str) -> AppAdapter {
        let catalog = AppCatalog::new("Sandbox").page("/index", |_| Index::default());
        AppAdapter::new(context, Arc::new(catalog), Arc::new(Injector::new()))
    }

    #[test]
    fn resolves_registered_path() {
        let uri = Uri::parse("page://self/index").unwrap();
        let resource = adapter(PAGE).resolve(&uri).unwrap();
        assert!(resource.is::<Index>());
    }

    #[test]
    fn root_path_is_index() {
        let uri = Uri::parse("page://self/").unwrap();
        assert!(adapter(PAGE).resolve(&uri).is_ok());
    }

    #[test]
    fn unknown_path_is_not_found() {
        let uri = Uri::parse("page://self/missing").unwrap();
        let result = adapter(PAGE).resolve(&uri);
        assert!(matches!(result, Err(ResourceError::ResourceNotFound { .. })));
    }

    #[test]
    fn context_separates_page_and_app() {
        let uri = Uri::parse("app://self/index").unwrap();
        let result = adapter(APP).resolve(&uri);
        assert!(matches!(result, Err(ResourceError::ResourceNotFound { .. })));
    }

    #[test]
    fn catalog_debug_lists_resources() {
        let catalog = AppCatalog::new("Sandbox")
            .page("/index", |_| Index::default())
            .app("/news/", |_| Index::default());
        assert_eq!(catalog.len(), 2);
        let debug = format!("{:?}", catalog);
        assert!(debug.contains("app:/news"));
        assert!(debug.contains("page:/index"));
    }
}
