//! Verb dispatch: bind a resolved resource's method parameters and invoke it
//! through an ordered chain of interceptors.
//!
//! A request moves through
//! `UNRESOLVED -> RESOURCE_RESOLVED -> PARAMS_RESOLVED -> INVOKED -> (VALIDATED) -> COMPLETE`;
//! any failure ends it in `FAILED` with the originating error. The first two
//! steps happen in [`crate::module::Resource`], binding in [`Invoker::bind`] and
//! the rest in [`Invoker::invoke`].

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::ResourceError;
use crate::injector::Injector;
use crate::param::{InvocationContext, ParamDescriptor, SignalParameter};
use crate::resource::{Args, ResourceObject, ResourceState};
use crate::types::{Query, Verb};
use crate::uri::Uri;

/// The method an interceptor is wrapped around.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub resource_type: TypeId,
    /// Resource type name.
    pub resource: &'static str,
    pub verb: Verb,
    pub uri: &'a Uri,
}

/// Hook run around every method invocation.
///
/// `before` hooks run in registration order and may stop the call; `after`
/// hooks run in reverse order once the method returned.
pub trait Interceptor: Send + Sync {
    /// Sees the named value arguments the method is about to receive, with
    /// numeric and boolean strings read as scalars.
    fn before(&self, _target: &Target<'_>, _args: &Query) -> Result<(), ResourceError> {
        Ok(())
    }

    fn after(&self, _target: &Target<'_>, _state: &ResourceState) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Per-method parameter chains, built from a resource's declared signature.
#[derive(Debug)]
pub struct MethodDescriptor {
    pub resource: &'static str,
    pub verb: Verb,
    pub params: Vec<ParamDescriptor>,
}

/// A resource with its method's arguments resolved, ready to invoke.
pub struct BoundCall {
    pub(crate) resource: Box<dyn ResourceObject>,
    pub(crate) verb: Verb,
    pub(crate) uri: Uri,
    pub(crate) args: Args,
}

impl BoundCall {
    pub fn resource(&self) -> &dyn ResourceObject {
        self.resource.as_ref()
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn args(&self) -> &Args {
        &self.args
    }
}

impl fmt::Debug for BoundCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCall")
            .field("resource", &self.resource.name())
            .field("verb", &self.verb)
            .field("uri", &self.uri.to_string())
            .field("args", &self.args)
            .finish()
    }
}

/// Resolves parameters and invokes verb methods.
///
/// Descriptors are cached per `(resource type, verb)`; the cache is a
/// concurrent map so many requests may bind at once.
pub struct Invoker {
    injector: Arc<Injector>,
    signal: SignalParameter,
    interceptors: Vec<Arc<dyn Interceptor>>,
    descriptors: DashMap<(TypeId, Verb), Arc<MethodDescriptor>>,
}

impl Invoker {
    pub fn new(injector: Arc<Injector>) -> Self {
        Self {
            injector,
            signal: SignalParameter::new(),
            interceptors: Vec::new(),
            descriptors: DashMap::new(),
        }
    }

    pub fn with_signal(mut self, signal: SignalParameter) -> Self {
        self.signal = signal;
        self.descriptors.clear();
        self
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    /// Attach a provider during setup; cached descriptors are dropped.
    pub fn signal_mut(&mut self) -> &mut SignalParameter {
        self.descriptors.clear();
        &mut self.signal
    }

    /// Descriptor for `resource`'s `verb` method, built on first use.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::MethodNotFound` if the resource declares no
    /// method for `verb`.
    pub fn descriptor(
        &self,
        resource: &dyn ResourceObject,
        verb: Verb,
    ) -> Result<Arc<MethodDescriptor>, ResourceError> {
        let key = (resource.resource_type(), verb);
        if let Some(cached) = self.descriptors.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        let signature = resource
            .signature(verb)
            .ok_or_else(|| ResourceError::MethodNotFound {
                resource: resource.name().to_string(),
                verb: verb.to_string(),
                method: verb.method_name(),
            })?;
        let descriptor = Arc::new(MethodDescriptor {
            resource: resource.name(),
            verb,
            params: signature
                .iter()
                .map(|param| ParamDescriptor::build(param, self.signal.provider(param.name())))
                .collect(),
        });
        self.descriptors.insert(key, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Resolve every declared parameter of `resource`'s `verb` method.
    ///
    /// # Errors
    ///
    /// `MethodNotFound` for an unsupported verb, `MissingParameter` for the
    /// first parameter no strategy can supply, or a provider's own error.
    pub fn bind(
        &self,
        mut resource: Box<dyn ResourceObject>,
        verb: Verb,
        uri: Uri,
    ) -> Result<BoundCall, ResourceError> {
        let descriptor = self.descriptor(resource.as_ref(), verb)?;
        let ctx = InvocationContext {
            uri: &uri,
            verb,
            resource: descriptor.resource,
            query: uri.query(),
        };

        let mut args = Args::new();
        for param in &descriptor.params {
            let arg = param
                .resolve(&ctx, &self.injector)?
                .ok_or_else(|| ResourceError::MissingParameter {
                    param: param.name().to_string(),
                    resource: descriptor.resource.to_string(),
                    method: verb.method_name(),
                })?;
            args.push(param.name(), arg);
        }

        debug!(uri = %uri, verb = %verb, params = args.len(), "params resolved");
        resource.state_mut().uri = Some(uri.clone());
        Ok(BoundCall {
            resource,
            verb,
            uri,
            args,
        })
    }

    /// Run the interceptor chain around the bound method.
    ///
    /// On a `before` failure the method is not called and the body stays unset.
    ///
    /// # Errors
    ///
    /// The first error raised by an interceptor or by the method itself.
    pub fn invoke(&self, call: BoundCall) -> Result<Box<dyn ResourceObject>, ResourceError> {
        let BoundCall {
            mut resource,
            verb,
            uri,
            args,
        } = call;
        let target = Target {
            resource_type: resource.resource_type(),
            resource: resource.name(),
            verb,
            uri: &uri,
        };

        let named = args.to_typed_query();
        for interceptor in &self.interceptors {
            interceptor.before(&target, &named)?;
        }

        resource.invoke(verb, &args)?;
        debug!(uri = %uri, verb = %verb, code = resource.state().code, "invoked");

        for interceptor in self.interceptors.iter().rev() {
            interceptor.after(&target, resource.state())?;
        }
        Ok(resource)
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("signal", &self.signal)
            .field("interceptors", &self.interceptors.len())
            .field("descriptors", &self.descriptors.len())
            .finish()
    }
}
