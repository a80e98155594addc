//! Wiring: install applications and services, then dispatch requests by URI.
//!
//! ```
//! use resource_dispatch::{
//!     AppCatalog, Args, ModuleConfig, Param, ResourceError, ResourceModule, ResourceObject,
//!     ResourceState, Verb,
//! };
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct Index {
//!     state: ResourceState,
//! }
//!
//! impl ResourceObject for Index {
//!     fn state(&self) -> &ResourceState {
//!         &self.state
//!     }
//!
//!     fn state_mut(&mut self) -> &mut ResourceState {
//!         &mut self.state
//!     }
//!
//!     fn signature(&self, verb: Verb) -> Option<Vec<Param>> {
//!         (verb == Verb::Get).then(|| vec![Param::optional("name", "world")])
//!     }
//!
//!     fn invoke(&mut self, _verb: Verb, args: &Args) -> Result<(), ResourceError> {
//!         let name: String = args.get("name")?;
//!         self.state.body = Some(json!({ "greeting": format!("hello {}", name) }));
//!         Ok(())
//!     }
//! }
//!
//! let resource = ResourceModule::new(ModuleConfig::new("demo"))
//!     .install(AppCatalog::new("demo").page("/index", |_| Index::default()))
//!     .build()
//!     .unwrap();
//!
//! let request = resource
//!     .get()
//!     .uri("page://self/index")
//!     .with_query([("name", "koriym")])
//!     .request()
//!     .unwrap();
//! assert_eq!(request.body().unwrap(), Some(&json!({ "greeting": "hello koriym" })));
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::adapter::{AppAdapter, AppCatalog, APP, PAGE};
use crate::config::ModuleConfig;
use crate::error::ResourceError;
use crate::injector::Injector;
use crate::invoker::{Interceptor, Invoker};
use crate::param::{ParamProvider, SignalParameter};
use crate::request::Request;
use crate::resource::ResourceObject;
use crate::scheme::SchemeCollection;
use crate::types::{Query, Verb};
use crate::uri::Uri;
use crate::validation::{JsonSchema, JsonSchemaInterceptor};

/// Host under which the configured application is served.
pub const SELF_HOST: &str = "self";

/// Setup-phase builder for a [`Resource`].
pub struct ResourceModule {
    config: ModuleConfig,
    catalogs: Vec<AppCatalog>,
    injector: Injector,
    signal: SignalParameter,
    interceptors: Vec<Arc<dyn Interceptor>>,
    schemas: Vec<(TypeId, Verb, JsonSchema)>,
}

impl ResourceModule {
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            config,
            catalogs: Vec::new(),
            injector: Injector::new(),
            signal: SignalParameter::new(),
            interceptors: Vec::new(),
            schemas: Vec::new(),
        }
    }

    /// Make an application available; the one named by `app_name` is served.
    pub fn install(mut self, catalog: AppCatalog) -> Self {
        self.catalogs.push(catalog);
        self
    }

    /// Bind a shared service for injected parameters and resource factories.
    pub fn service<T: Any + Send + Sync>(mut self, instance: Arc<T>) -> Self {
        self.injector.bind(instance);
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.injector.bind_named(name, value);
        self
    }

    pub fn attach_param_provider(
        mut self,
        name: impl Into<String>,
        provider: impl ParamProvider + 'static,
    ) -> Self {
        self.signal.attach_param_provider(name, provider);
        self
    }

    /// Add an interceptor; interceptors wrap methods in the order added.
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Guard `R`'s `verb` method with a JSON schema. Requires `json_schema`
    /// in the configuration.
    pub fn json_schema<R: ResourceObject>(mut self, verb: Verb, schema: JsonSchema) -> Self {
        self.schemas.push((TypeId::of::<R>(), verb, schema));
        self
    }

    /// # Errors
    ///
    /// Returns `ResourceError::Config` if no installed catalog is named
    /// `app_name`, or if schemas are bound without a `json_schema` section.
    pub fn build(self) -> Result<Resource, ResourceError> {
        let ResourceModule {
            config,
            catalogs,
            mut injector,
            signal,
            mut interceptors,
            schemas,
        } = self;

        let catalog = catalogs
            .into_iter()
            .find(|catalog| catalog.name() == config.app_name)
            .map(Arc::new)
            .ok_or_else(|| {
                ResourceError::config(format!("no application installed as '{}'", config.app_name))
            })?;

        match (&config.json_schema, schemas.is_empty()) {
            (Some(schema_config), _) => {
                let guard = schemas.into_iter().fold(
                    JsonSchemaInterceptor::new(schema_config.clone()),
                    |guard, (resource_type, verb, schema)| {
                        guard.bind_type(resource_type, verb, schema)
                    },
                );
                interceptors.push(Arc::new(guard));
            }
            (None, false) => {
                return Err(ResourceError::config(
                    "json schemas are bound but json_schema is not configured",
                ));
            }
            (None, true) => {}
        }

        injector.bind_named("app_name", config.app_name.as_str());
        let injector = Arc::new(injector);

        let mut schemes = SchemeCollection::new();
        schemes
            .scheme(PAGE)
            .host(SELF_HOST)
            .to_adapter(AppAdapter::new(PAGE, Arc::clone(&catalog), Arc::clone(&injector)));
        schemes
            .scheme(APP)
            .host(SELF_HOST)
            .to_adapter(AppAdapter::new(APP, Arc::clone(&catalog), Arc::clone(&injector)));

        let invoker = interceptors.into_iter().fold(
            Invoker::new(injector).with_signal(signal),
            Invoker::with_interceptor,
        );

        info!(app = %config.app_name, resources = catalog.len(), "resource module built");
        Ok(Resource::new(schemes, invoker))
    }
}

impl fmt::Debug for ResourceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceModule")
            .field("config", &self.config)
            .field("catalogs", &self.catalogs)
            .field("interceptors", &self.interceptors.len())
            .field("schemas", &self.schemas.len())
            .finish()
    }
}

/// Entry point for requests.
///
/// Bindings and providers may change only during setup, through `&mut self`;
/// once shared, a `Resource` serves requests from any number of threads.
pub struct Resource {
    schemes: SchemeCollection,
    invoker: Arc<Invoker>,
}

impl Resource {
    pub fn new(schemes: SchemeCollection, invoker: Invoker) -> Self {
        Self {
            schemes,
            invoker: Arc::new(invoker),
        }
    }

    pub fn schemes(&self) -> &SchemeCollection {
        &self.schemes
    }

    /// Add or replace scheme bindings, e.g. `https://*` to an HTTP adapter.
    pub fn schemes_mut(&mut self) -> &mut SchemeCollection {
        &mut self.schemes
    }

    pub fn injector(&self) -> &Arc<Injector> {
        self.invoker.injector()
    }

    /// # Errors
    ///
    /// Returns `ResourceError::Config` once requests created from this
    /// resource are still alive.
    pub fn attach_param_provider(
        &mut self,
        name: impl Into<String>,
        provider: impl ParamProvider + 'static,
    ) -> Result<&mut Self, ResourceError> {
        let invoker = Arc::get_mut(&mut self.invoker).ok_or_else(|| {
            ResourceError::config("param providers cannot change while requests are pending")
        })?;
        invoker.signal_mut().attach_param_provider(name, provider);
        Ok(self)
    }

    pub fn get(&self) -> RequestBuilder<'_> {
        self.request_for(Verb::Get)
    }

    pub fn post(&self) -> RequestBuilder<'_> {
        self.request_for(Verb::Post)
    }

    pub fn put(&self) -> RequestBuilder<'_> {
        self.request_for(Verb::Put)
    }

    pub fn patch(&self) -> RequestBuilder<'_> {
        self.request_for(Verb::Patch)
    }

    pub fn delete(&self) -> RequestBuilder<'_> {
        self.request_for(Verb::Delete)
    }

    pub fn request_for(&self, verb: Verb) -> RequestBuilder<'_> {
        RequestBuilder {
            resource: self,
            verb,
            uri: None,
            query: Query::new(),
            eager: false,
        }
    }

    /// Resolve and bind; the method itself runs only when the request is
    /// forced, or right away when `eager`.
    fn dispatch(&self, verb: Verb, uri: Uri, eager: bool) -> Result<Request, ResourceError> {
        let adapter = self.schemes.get(&uri)?;
        let resource = adapter.resolve(&uri)?;
        debug!(uri = %uri, resource = resource.name(), "resource resolved");

        let call = self.invoker.bind(resource, verb, uri)?;
        let request = Request::new(Arc::clone(&self.invoker), call);
        if eager {
            request.force()?;
        }
        Ok(request)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("bindings", &self.schemes.len())
            .field("invoker", &self.invoker)
            .finish()
    }
}

/// One request under construction.
#[derive(Debug)]
#[must_use = "a request builder does nothing until `request` is called"]
pub struct RequestBuilder<'a> {
    resource: &'a Resource,
    verb: Verb,
    uri: Option<String>,
    query: Query,
    eager: bool,
}

impl RequestBuilder<'_> {
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Add query values; they override those written in the URI.
    pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Invoke as part of [`RequestBuilder::request`] instead of on first access.
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// # Errors
    ///
    /// `UriSyntax` for a missing or malformed URI, `AdapterNotFound`,
    /// `ResourceNotFound`, `MethodNotFound` or `MissingParameter` while
    /// resolving, and for an eager request the invocation's own error.
    pub fn request(self) -> Result<Request, ResourceError> {
        let raw = self.uri.ok_or_else(|| ResourceError::UriSyntax {
            uri: String::new(),
            message: "no uri given".to_string(),
        })?;
        let uri = Uri::parse(&raw)?.with_query(self.query);
        self.resource.dispatch(self.verb, uri, self.eager)
    }
}
