//! Method parameter resolution.
//!
//! Every declared parameter is resolved on its own, left to right, by trying
//! in order:
//!
//! | Step | Source | Strategy |
//! |------|--------|----------|
//! | a | query value with the parameter's name | [`QueryParam`] |
//! | b | provider attached for the name | [`ProviderParam`] |
//! | c | declared default | [`OptionalParam`] |
//! | d | service bound for the declared type | [`InjectedParam`] |
//!
//! A parameter with a default and no attached provider takes the
//! [`OptionalParam`] path alone: query value or default, injector untouched.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ResourceError;
use crate::injector::{Injector, ServiceKey};
use crate::resource::Arg;
use crate::types::{Query, Verb};
use crate::uri::Uri;

/// Declaration of one method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: Cow<'static, str>,
    default: Option<Value>,
    service: Option<ServiceKey>,
}

impl Param {
    /// Parameter that must come from the query or a provider.
    pub fn required(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            default: None,
            service: None,
        }
    }

    /// Parameter with a default used when the query lacks it.
    pub fn optional(name: impl Into<Cow<'static, str>>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
            service: None,
        }
    }

    /// Parameter filled with the service bound for `T`.
    pub fn inject<T: std::any::Any>(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            default: None,
            service: Some(ServiceKey::of::<T>()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn service(&self) -> Option<&ServiceKey> {
        self.service.as_ref()
    }
}

/// What a provider sees of the call it is resolving an argument for.
#[derive(Debug, Clone, Copy)]
pub struct InvocationContext<'a> {
    pub uri: &'a Uri,
    pub verb: Verb,
    /// Resource type name.
    pub resource: &'static str,
    pub query: &'a Query,
}

/// One parameter-resolution strategy.
///
/// `Ok(None)` means the strategy has nothing for this parameter and the next
/// one in the chain is tried.
pub trait ParamInterface: Send + Sync + fmt::Debug {
    fn resolve(
        &self,
        var_name: &str,
        ctx: &InvocationContext<'_>,
        injector: &Injector,
    ) -> Result<Option<Arg>, ResourceError>;
}

/// Computes an argument from the invocation context.
pub trait ParamProvider: Send + Sync {
    fn get_arg(
        &self,
        param: &Param,
        ctx: &InvocationContext<'_>,
    ) -> Result<Option<Value>, ResourceError>;
}

impl<F> ParamProvider for F
where
    F: Fn(&Param, &InvocationContext<'_>) -> Result<Option<Value>, ResourceError> + Send + Sync,
{
    fn get_arg(
        &self,
        param: &Param,
        ctx: &InvocationContext<'_>,
    ) -> Result<Option<Value>, ResourceError> {
        self(param, ctx)
    }
}

/// Wrap a closure as a [`ParamProvider`].
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(&Param, &InvocationContext<'_>) -> Result<Option<Value>, ResourceError> + Send + Sync,
{
    f
}

/// Query value with the parameter's name.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParam;

impl ParamInterface for QueryParam {
    fn resolve(
        &self,
        var_name: &str,
        ctx: &InvocationContext<'_>,
        _injector: &Injector,
    ) -> Result<Option<Arg>, ResourceError> {
        Ok(ctx.query.get(var_name).cloned().map(Arg::Value))
    }
}

/// Query value if given, else the stored default. Never consults the injector.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalParam {
    default_value: Value,
}

impl OptionalParam {
    pub fn new(default_value: Value) -> Self {
        Self { default_value }
    }
}

impl ParamInterface for OptionalParam {
    fn resolve(
        &self,
        var_name: &str,
        ctx: &InvocationContext<'_>,
        _injector: &Injector,
    ) -> Result<Option<Arg>, ResourceError> {
        let value = ctx
            .query
            .get(var_name)
            .cloned()
            .unwrap_or_else(|| self.default_value.clone());
        Ok(Some(Arg::Value(value)))
    }
}

/// Value computed by an attached provider.
pub struct ProviderParam {
    param: Param,
    provider: Arc<dyn ParamProvider>,
}

impl ProviderParam {
    pub fn new(param: Param, provider: Arc<dyn ParamProvider>) -> Self {
        Self { param, provider }
    }
}

impl fmt::Debug for ProviderParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderParam")
            .field("param", &self.param.name)
            .finish_non_exhaustive()
    }
}

impl ParamInterface for ProviderParam {
    fn resolve(
        &self,
        _var_name: &str,
        ctx: &InvocationContext<'_>,
        _injector: &Injector,
    ) -> Result<Option<Arg>, ResourceError> {
        Ok(self.provider.get_arg(&self.param, ctx)?.map(Arg::Value))
    }
}

/// Declared default, used after a provider declined.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultParam {
    default_value: Value,
}

impl ParamInterface for DefaultParam {
    fn resolve(
        &self,
        _var_name: &str,
        _ctx: &InvocationContext<'_>,
        _injector: &Injector,
    ) -> Result<Option<Arg>, ResourceError> {
        Ok(Some(Arg::Value(self.default_value.clone())))
    }
}

/// Service bound in the injector for the parameter's declared type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectedParam {
    key: ServiceKey,
}

impl InjectedParam {
    pub fn new(key: ServiceKey) -> Self {
        Self { key }
    }
}

impl ParamInterface for InjectedParam {
    fn resolve(
        &self,
        _var_name: &str,
        _ctx: &InvocationContext<'_>,
        injector: &Injector,
    ) -> Result<Option<Arg>, ResourceError> {
        Ok(injector.get_service(&self.key).map(Arg::Service))
    }
}

/// Tag naming how a parameter will be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Query value only.
    Query,
    /// Query value, else default.
    Optional,
    /// Query value, provider, then default when declared.
    Provided,
    /// Query value, else injected service.
    Injected,
}

/// Resolution chain for one parameter, built once per method signature.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    name: String,
    strategy: Strategy,
    chain: Vec<Arc<dyn ParamInterface>>,
}

impl ParamDescriptor {
    /// Build the chain for `param`, taking an attached provider into account.
    pub fn build(param: &Param, provider: Option<Arc<dyn ParamProvider>>) -> Self {
        let mut chain: Vec<Arc<dyn ParamInterface>> = Vec::new();

        let strategy = match (provider, &param.default) {
            (Some(provider), default) => {
                chain.push(Arc::new(QueryParam));
                chain.push(Arc::new(ProviderParam::new(param.clone(), provider)));
                if let Some(default_value) = default {
                    chain.push(Arc::new(DefaultParam {
                        default_value: default_value.clone(),
                    }));
                }
                Strategy::Provided
            }
            (None, Some(default_value)) => {
                chain.push(Arc::new(OptionalParam::new(default_value.clone())));
                Strategy::Optional
            }
            (None, None) => {
                chain.push(Arc::new(QueryParam));
                Strategy::Query
            }
        };

        let strategy = match param.service {
            Some(key) => {
                chain.push(Arc::new(InjectedParam::new(key)));
                if strategy == Strategy::Query {
                    Strategy::Injected
                } else {
                    strategy
                }
            }
            None => strategy,
        };

        Self {
            name: param.name.to_string(),
            strategy,
            chain,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Walk the chain; the first strategy yielding a value wins.
    pub fn resolve(
        &self,
        ctx: &InvocationContext<'_>,
        injector: &Injector,
    ) -> Result<Option<Arg>, ResourceError> {
        for strategy in &self.chain {
            if let Some(arg) = strategy.resolve(&self.name, ctx, injector)? {
                return Ok(Some(arg));
            }
        }
        Ok(None)
    }
}

/// Named providers consulted for parameters with a matching name.
///
/// Providers are attached during setup, before requests are served.
#[derive(Clone, Default)]
pub struct SignalParameter {
    providers: HashMap<String, Arc<dyn ParamProvider>>,
}

impl SignalParameter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_param_provider(
        &mut self,
        var_name: impl Into<String>,
        provider: impl ParamProvider + 'static,
    ) -> &mut Self {
        self.providers.insert(var_name.into(), Arc::new(provider));
        self
    }

    pub fn provider(&self, var_name: &str) -> Option<Arc<dyn ParamProvider>> {
        self.providers.get(var_name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for SignalParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.providers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::query_from;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Db;

    fn value(arg: Option<Arg>) -> Value {
        match arg {
            Some(Arg::Value(value)) => value,
            other => panic!("expected value, got {:?}", other),
        }
    }

    fn ctx<'a>(uri: &'a Uri, query: &'a Query) -> InvocationContext<'a> {
        InvocationContext {
            uri,
            verb: Verb::Get,
            resource: "Test",
            query,
        }
    }

    #[test]
    fn optional_param_prefers_query() {
        let uri = Uri::parse("app://self/user").unwrap();
        let query = query_from([("id", json!(5))]);
        let param = OptionalParam::new(json!(1));

        let resolved = param.resolve("id", &ctx(&uri, &query), &Injector::new()).unwrap();
        assert_eq!(value(resolved), json!(5));
    }

    #[test]
    fn optional_param_falls_back_to_default() {
        let uri = Uri::parse("app://self/user").unwrap();
        let query = Query::new();
        let param = OptionalParam::new(json!("male"));

        let resolved = param
            .resolve("gender", &ctx(&uri, &query), &Injector::new())
            .unwrap();
        assert_eq!(value(resolved), json!("male"));
    }

    #[test]
    fn optional_param_ignores_injector() {
        let uri = Uri::parse("app://self/user").unwrap();
        let query = Query::new();
        let mut injector = Injector::new();
        injector.bind(Arc::new(Db));
        let descriptor = ParamDescriptor::build(
            &Param {
                name: "db".into(),
                default: Some(json!(null)),
                service: Some(ServiceKey::of::<Db>()),
            },
            None,
        );

        let resolved = descriptor.resolve(&ctx(&uri, &query), &injector).unwrap();
        assert_eq!(value(resolved), json!(null));
    }

    #[test]
    fn required_param_missing_yields_none() {
        let uri = Uri::parse("app://self/user").unwrap();
        let query = Query::new();
        let descriptor = ParamDescriptor::build(&Param::required("name"), None);

        assert_eq!(descriptor.strategy(), Strategy::Query);
        assert!(descriptor
            .resolve(&ctx(&uri, &query), &Injector::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn provider_runs_after_query() {
        let uri = Uri::parse("app://self/user").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = from_fn(move |param, ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(json!(format!("{}@{}", param.name(), ctx.uri.path()))))
        });
        let descriptor =
            ParamDescriptor::build(&Param::optional("login", "guest"), Some(Arc::new(provider)));
        assert_eq!(descriptor.strategy(), Strategy::Provided);

        let query = query_from([("login", "alice")]);
        let resolved = descriptor.resolve(&ctx(&uri, &query), &Injector::new()).unwrap();
        assert_eq!(value(resolved), json!("alice"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let empty = Query::new();
        let resolved = descriptor.resolve(&ctx(&uri, &empty), &Injector::new()).unwrap();
        assert_eq!(value(resolved), json!("login@/user"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn declined_provider_falls_back_to_default() {
        let uri = Uri::parse("app://self/user").unwrap();
        let query = Query::new();
        let provider = from_fn(|_, _| Ok(None));
        let descriptor =
            ParamDescriptor::build(&Param::optional("page", 1), Some(Arc::new(provider)));

        let resolved = descriptor.resolve(&ctx(&uri, &query), &Injector::new()).unwrap();
        assert_eq!(value(resolved), json!(1));
    }

    #[test]
    fn injected_param_uses_bound_service() {
        let uri = Uri::parse("app://self/user").unwrap();
        let query = Query::new();
        let descriptor = ParamDescriptor::build(&Param::inject::<Db>("db"), None);
        assert_eq!(descriptor.strategy(), Strategy::Injected);

        assert!(descriptor
            .resolve(&ctx(&uri, &query), &Injector::new())
            .unwrap()
            .is_none());

        let mut injector = Injector::new();
        injector.bind(Arc::new(Db));
        let resolved = descriptor.resolve(&ctx(&uri, &query), &injector).unwrap();
        assert!(matches!(resolved, Some(Arg::Service(_))));
    }

    #[test]
    fn signal_parameter_registry() {
        let mut signal = SignalParameter::new();
        assert!(signal.is_empty());
        signal.attach_param_provider("user_id", from_fn(|_, _| Ok(Some(json!(7)))));
        assert!(signal.provider("user_id").is_some());
        assert!(signal.provider("other").is_none());
    }
}
