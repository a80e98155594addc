//! Resource objects: the unit of dispatch.
//!
//! A resource declares, per verb, the parameters its method takes
//! ([`ResourceObject::signature`]) and receives them already resolved in
//! [`Args`]. Declarations replace reflection: the invoker reads them once per
//! resource type and verb and caches the result.

use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ResourceError;
use crate::injector::Service;
use crate::param::Param;
use crate::render::to_json_text;
use crate::types::{json_type_name, Query, Verb};
use crate::uri::Uri;

/// Status code a resource starts with.
pub const DEFAULT_CODE: u16 = 200;

/// Response state carried by every resource object.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState {
    pub uri: Option<Uri>,
    pub code: u16,
    pub headers: BTreeMap<String, String>,
    /// Unset until a method populates it.
    pub body: Option<Value>,
}

impl Default for ResourceState {
    fn default() -> Self {
        Self {
            uri: None,
            code: DEFAULT_CODE,
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

impl fmt::Display for ResourceState {
    /// Renders the body as JSON text; an unset body renders as nothing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Some(body) => f.write_str(&to_json_text(body).map_err(|_| fmt::Error)?),
            None => Ok(()),
        }
    }
}

/// A resource addressed by URI that answers one or more verbs.
pub trait ResourceObject: Any + Send + Sync {
    fn state(&self) -> &ResourceState;

    fn state_mut(&mut self) -> &mut ResourceState;

    /// Parameters of the method bound to `verb`, in declared order.
    ///
    /// `None` means the resource has no method for that verb.
    fn signature(&self, verb: Verb) -> Option<Vec<Param>>;

    /// Run the method bound to `verb` with resolved arguments.
    fn invoke(&mut self, verb: Verb, args: &Args) -> Result<(), ResourceError>;

    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn resource_type(&self) -> TypeId {
        TypeId::of::<Self>()
    }
}

impl dyn ResourceObject {
    pub fn downcast_ref<T: ResourceObject>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref::<T>()
    }

    pub fn is<T: ResourceObject>(&self) -> bool {
        self.resource_type() == TypeId::of::<T>()
    }

    pub fn body(&self) -> Option<&Value> {
        self.state().body.as_ref()
    }

    pub fn code(&self) -> u16 {
        self.state().code
    }
}

impl fmt::Debug for dyn ResourceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.name())
            .field("state", self.state())
            .finish()
    }
}

/// A single resolved argument.
#[derive(Clone)]
pub enum Arg {
    Value(Value),
    Service(Service),
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Arg::Service(_) => f.write_str("Service(..)"),
        }
    }
}

/// Resolved arguments of one method call, in declared parameter order.
#[derive(Debug, Clone, Default)]
pub struct Args {
    entries: Vec<(String, Arg)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, arg: Arg) {
        self.entries.push((name.into(), arg));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    fn arg(&self, name: &str) -> Option<&Arg> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, arg)| arg)
    }

    /// Raw value of a value-typed argument.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.arg(name) {
            Some(Arg::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Convert a value argument into `T`.
    ///
    /// Query values parsed from a URI arrive as strings; when the direct
    /// conversion fails, a string holding a JSON scalar (`"20"`, `"true"`) is
    /// tried as that scalar.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::InvalidArgument` if the argument is absent, is an
    /// injected service, or cannot be converted.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ResourceError> {
        let value = self.value(name).ok_or_else(|| invalid(name, "no value argument"))?;

        match T::deserialize(value) {
            Ok(converted) => Ok(converted),
            Err(first) => {
                let coerced = match value {
                    Value::String(s) => serde_json::from_str::<Value>(s).ok(),
                    _ => None,
                };
                coerced
                    .and_then(|scalar| T::deserialize(scalar).ok())
                    .ok_or_else(|| {
                        invalid(
                            name,
                            &format!("{} (got {})", first, json_type_name(value)),
                        )
                    })
            }
        }
    }

    /// Injected service argument.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::InvalidArgument` if the argument is absent or of
    /// another type.
    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ResourceError> {
        match self.arg(name) {
            Some(Arg::Service(service)) => service
                .clone()
                .downcast::<T>()
                .map_err(|_| invalid(name, &format!("not a {}", type_name::<T>()))),
            _ => Err(invalid(name, "no injected service")),
        }
    }

    /// Value arguments as a query mapping, in declared order.
    pub fn to_query(&self) -> Query {
        self.entries
            .iter()
            .filter_map(|(name, arg)| match arg {
                Arg::Value(value) => Some((name.clone(), value.clone())),
                Arg::Service(_) => None,
            })
            .collect()
    }

    /// Like [`Args::to_query`], with strings holding a number or boolean
    /// (`"5"`, `"true"`) replaced by that scalar.
    ///
    /// This is the view interceptors get of the named arguments, so a value
    /// written in a URI is checked as the number the method reads.
    pub fn to_typed_query(&self) -> Query {
        self.to_query()
            .into_iter()
            .map(|(name, value)| {
                let value = match &value {
                    Value::String(s) => scalar(s).unwrap_or(value),
                    _ => value,
                };
                (name, value)
            })
            .collect()
    }
}

fn scalar(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => Some(value),
        _ => None,
    }
}

impl From<Query> for Args {
    fn from(query: Query) -> Self {
        Self {
            entries: query
                .into_iter()
                .map(|(name, value)| (name, Arg::Value(value)))
                .collect(),
        }
    }
}

fn invalid(name: &str, message: &str) -> ResourceError {
    ResourceError::InvalidArgument {
        param: name.to_string(),
        message: message.to_string(),
    }
}
