//! Resource Dispatch
//!
//! URI-addressed resource objects with verb dispatch, parameter injection and
//! JSON Schema guards.
//!
//! A request names a resource by URI (`page://self/index?name=koriym`) and a
//! verb. The URI's scheme and host select an [`Adapter`], the adapter produces
//! a [`ResourceObject`], and the [`Invoker`] binds the method's declared
//! parameters before running it through the interceptor chain.
//!
//! # Example
//!
//! ```
//! use resource_dispatch::{
//!     AppCatalog, Args, ModuleConfig, Param, ResourceError, ResourceModule, ResourceObject,
//!     ResourceState, Verb,
//! };
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct User {
//!     state: ResourceState,
//! }
//!
//! impl ResourceObject for User {
//!     fn state(&self) -> &ResourceState {
//!         &self.state
//!     }
//!
//!     fn state_mut(&mut self) -> &mut ResourceState {
//!         &mut self.state
//!     }
//!
//!     fn signature(&self, verb: Verb) -> Option<Vec<Param>> {
//!         match verb {
//!             Verb::Get => Some(vec![Param::required("id")]),
//!             _ => None,
//!         }
//!     }
//!
//!     fn invoke(&mut self, _verb: Verb, args: &Args) -> Result<(), ResourceError> {
//!         let id: u64 = args.get("id")?;
//!         self.state.body = Some(json!({ "id": id, "name": "Aramis" }));
//!         Ok(())
//!     }
//! }
//!
//! let resource = ResourceModule::new(ModuleConfig::new("blog"))
//!     .install(AppCatalog::new("blog").app("/user", |_| User::default()))
//!     .build()
//!     .unwrap();
//!
//! let request = resource.get().uri("app://self/user?id=2").request().unwrap();
//! assert_eq!(request.body().unwrap(), Some(&json!({ "id": 2, "name": "Aramis" })));
//!
//! let missing = resource.get().uri("app://self/user").request();
//! assert!(matches!(missing, Err(ResourceError::MissingParameter { .. })));
//! ```
//!
//! # Parameter resolution
//!
//! | Declared as | Attached provider | Tried in order |
//! |-------------|-------------------|----------------|
//! | `Param::required` | no | query |
//! | `Param::optional` | no | query, default |
//! | any | yes | query, provider, default |
//! | `Param::inject` | any | the above, then the injector |

mod adapter;
mod config;
mod error;
mod injector;
mod invoker;
mod loader;
mod module;
mod param;
mod render;
mod request;
mod resource;
mod scheme;
mod types;
mod uri;
mod validation;

pub use adapter::{Adapter, AppAdapter, AppCatalog, Factory, APP, PAGE};
pub use config::{LoggingConfig, ModuleConfig, DEFAULT_APP_NAME};
pub use error::{ResourceError, SchemaError};
pub use injector::{Injector, Service, ServiceKey};
pub use invoker::{BoundCall, Interceptor, Invoker, MethodDescriptor, Target};
pub use loader::{bundle_refs, load_bundled, load_schema, navigate_fragment};
pub use module::{RequestBuilder, Resource, ResourceModule, SELF_HOST};
pub use param::{
    from_fn, DefaultParam, InjectedParam, InvocationContext, OptionalParam, Param,
    ParamDescriptor, ParamInterface, ParamProvider, ProviderParam, QueryParam, SignalParameter,
    Strategy,
};
pub use render::to_json_text;
pub use request::{Request, Stage};
pub use resource::{Arg, Args, ResourceObject, ResourceState, DEFAULT_CODE};
pub use scheme::{HostBinder, SchemeBinder, SchemeCollection, WILDCARD};
pub use types::{json_type_name, query_from, Query, Verb};
pub use uri::Uri;
pub use validation::{
    compile, validate_file, violations, JsonSchema, JsonSchemaConfig, JsonSchemaInterceptor,
    SchemaPair,
};

#[cfg(feature = "remote")]
pub use adapter::{HttpAdapter, HttpResource};
