//! Requests whose invocation may be deferred.
//!
//! A [`Request`] holds a resource with its arguments already bound. The method
//! runs the first time the request is forced and never again: later calls,
//! from any thread, see the same resource or the same error.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::ResourceError;
use crate::invoker::{BoundCall, Invoker};
use crate::render::to_json_text;
use crate::resource::ResourceObject;
use crate::types::Verb;
use crate::uri::Uri;

/// Where a request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Bound and waiting to be forced.
    ParamsResolved,
    Complete,
    Failed,
}

type Outcome = Result<Box<dyn ResourceObject>, ResourceError>;

pub struct Request {
    uri: Uri,
    verb: Verb,
    invoker: Arc<Invoker>,
    pending: Mutex<Option<BoundCall>>,
    outcome: OnceCell<Outcome>,
}

impl Request {
    pub(crate) fn new(invoker: Arc<Invoker>, call: BoundCall) -> Self {
        Self {
            uri: call.uri().clone(),
            verb: call.verb(),
            invoker,
            pending: Mutex::new(Some(call)),
            outcome: OnceCell::new(),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn stage(&self) -> Stage {
        match self.outcome.get() {
            None => Stage::ParamsResolved,
            Some(Ok(_)) => Stage::Complete,
            Some(Err(_)) => Stage::Failed,
        }
    }

    /// Invoke the method if that has not happened yet and return the resource.
    ///
    /// # Errors
    ///
    /// The error the invocation ended with; every caller receives a clone of
    /// the same error. A panicking method is reported as
    /// `ResourceError::Invocation`.
    pub fn force(&self) -> Result<&dyn ResourceObject, ResourceError> {
        let outcome = self.outcome.get_or_init(|| {
            let call = self.pending.lock().take();
            match call {
                Some(call) => {
                    panic::catch_unwind(AssertUnwindSafe(|| self.invoker.invoke(call)))
                        .unwrap_or_else(|payload| Err(panicked(payload.as_ref())))
                }
                None => Err(ResourceError::invocation("request was already consumed")),
            }
        });
        match outcome {
            Ok(resource) => Ok(resource.as_ref()),
            Err(e) => Err(e.clone()),
        }
    }

    /// Force and downcast to the concrete resource type.
    ///
    /// # Errors
    ///
    /// The invocation error, or `ResourceError::Invocation` if the resource is
    /// of another type.
    pub fn resource<T: ResourceObject>(&self) -> Result<&T, ResourceError> {
        let resource = self.force()?;
        resource.downcast_ref::<T>().ok_or_else(|| {
            ResourceError::invocation(format!(
                "{} is not a {}",
                resource.name(),
                std::any::type_name::<T>()
            ))
        })
    }

    /// # Errors
    ///
    /// See [`Request::force`].
    pub fn body(&self) -> Result<Option<&Value>, ResourceError> {
        Ok(self.force()?.body())
    }

    /// # Errors
    ///
    /// See [`Request::force`].
    pub fn code(&self) -> Result<u16, ResourceError> {
        Ok(self.force()?.code())
    }

    /// Force and render the body as JSON text; an unset body renders empty.
    ///
    /// # Errors
    ///
    /// See [`Request::force`].
    pub fn render(&self) -> Result<String, ResourceError> {
        match self.force()?.body() {
            Some(body) => to_json_text(body)
                .map_err(|e| ResourceError::invocation(format!("rendering body: {}", e))),
            None => Ok(String::new()),
        }
    }

    /// Force and take ownership of the resource.
    ///
    /// # Errors
    ///
    /// See [`Request::force`].
    pub fn into_resource(self) -> Result<Box<dyn ResourceObject>, ResourceError> {
        self.force()?;
        match self.outcome.into_inner() {
            Some(outcome) => outcome,
            None => Err(ResourceError::invocation("request was not evaluated")),
        }
    }
}

fn panicked(payload: &(dyn Any + Send)) -> ResourceError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    ResourceError::invocation(format!("resource method panicked: {}", message))
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("uri", &self.uri.to_string())
            .field("verb", &self.verb)
            .field("stage", &self.stage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::Injector;
    use crate::param::Param;
    use crate::resource::{Args, ResourceState};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        state: ResourceState,
        calls: Arc<AtomicUsize>,
        fail: bool,
        panic: bool,
    }

    impl ResourceObject for Counter {
        fn state(&self) -> &ResourceState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut ResourceState {
            &mut self.state
        }

        fn signature(&self, _verb: Verb) -> Option<Vec<Param>> {
            Some(Vec::new())
        }

        fn invoke(&mut self, _verb: Verb, _args: &Args) -> Result<(), ResourceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.panic {
                panic!("counter overflow");
            }
            if self.fail {
                return Err(ResourceError::invocation("boom"));
            }
            self.state.body = Some(json!({ "calls": n }));
            Ok(())
        }
    }

    fn request(calls: &Arc<AtomicUsize>, fail: bool) -> Request {
        counter_request(calls, fail, false)
    }

    fn counter_request(calls: &Arc<AtomicUsize>, fail: bool, panic: bool) -> Request {
        let invoker = Arc::new(Invoker::new(Arc::new(Injector::new())));
        let resource = Box::new(Counter {
            state: ResourceState::default(),
            calls: calls.clone(),
            fail,
            panic,
        });
        let call = invoker
            .bind(resource, Verb::Get, Uri::parse("app://self/counter").unwrap())
            .unwrap();
        Request::new(invoker, call)
    }

    #[test]
    fn lazy_until_forced() {
        let calls = Arc::new(AtomicUsize::new(0));
        let request = request(&calls, false);

        assert_eq!(request.stage(), Stage::ParamsResolved);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(request.body().unwrap(), Some(&json!({ "calls": 1 })));
        assert_eq!(request.stage(), Stage::Complete);
    }

    #[test]
    fn forcing_twice_invokes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let request = request(&calls, false);

        let first = request.render().unwrap();
        let second = request.render().unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_is_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let request = request(&calls, true);

        assert!(matches!(request.force(), Err(ResourceError::Invocation { .. })));
        assert!(matches!(request.code(), Err(ResourceError::Invocation { .. })));
        assert_eq!(request.stage(), Stage::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_is_memoized_as_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let request = counter_request(&calls, false, true);

        let first = request.force().err().unwrap();
        let second = request.force().err().unwrap();
        assert!(first.to_string().contains("resource method panicked: counter overflow"));
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(request.stage(), Stage::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_force_invokes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let request = Arc::new(request(&calls, false));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let request = Arc::clone(&request);
                std::thread::spawn(move || request.render().unwrap())
            })
            .collect();
        let rendered: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(rendered.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn typed_access() {
        let calls = Arc::new(AtomicUsize::new(0));
        let request = request(&calls, false);

        assert!(request.resource::<Counter>().is_ok());
        let resource = request.into_resource().unwrap();
        assert_eq!(resource.code(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
