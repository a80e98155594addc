//! JSON Schema guards around resource methods.
//!
//! A `(resource type, verb)` binding names a response schema and optionally a
//! request schema. Before the call the method's named arguments are checked
//! against the request schema; after it the body is checked against the
//! response schema, but only when the status code equals the configured
//! target (200 unless configured otherwise).

use std::any::TypeId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ResourceError, SchemaError};
use crate::invoker::{Interceptor, Target};
use crate::loader::load_bundled;
use crate::resource::{ResourceObject, ResourceState, DEFAULT_CODE};
use crate::types::{Query, Verb};

/// Where schema files live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JsonSchemaConfig {
    /// Response schemas.
    pub schema_dir: PathBuf,
    /// Request (parameter) schemas.
    pub validate_dir: PathBuf,
    /// Status code whose body is validated.
    #[serde(default = "default_target_code")]
    pub target_code: u16,
}

fn default_target_code() -> u16 {
    DEFAULT_CODE
}

impl JsonSchemaConfig {
    pub fn new(schema_dir: impl Into<PathBuf>, validate_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            validate_dir: validate_dir.into(),
            target_code: DEFAULT_CODE,
        }
    }

    pub fn target_code(mut self, code: u16) -> Self {
        self.target_code = code;
        self
    }
}

/// Schema reference attached to one verb method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonSchema {
    /// File names under `schema_dir` and, for the request, `validate_dir`.
    Files {
        schema: String,
        params: Option<String>,
    },
    /// Older convention: `<name>.json` in `schema_dir`, plus `<name>.json` in
    /// `validate_dir` when that file exists.
    Named(String),
}

impl JsonSchema {
    pub fn new(schema: impl Into<String>) -> Self {
        JsonSchema::Files {
            schema: schema.into(),
            params: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        JsonSchema::Named(name.into())
    }

    /// Add a request schema. Has no effect on [`JsonSchema::Named`].
    pub fn params(self, file: impl Into<String>) -> Self {
        match self {
            JsonSchema::Files { schema, .. } => JsonSchema::Files {
                schema,
                params: Some(file.into()),
            },
            named => named,
        }
    }
}

/// Resolved files guarding a `(resource, verb, status)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPair {
    pub request: Option<PathBuf>,
    pub response: PathBuf,
    pub target_code: u16,
}

/// Interceptor validating bound methods against their schemas.
///
/// Compiled validators are cached per file.
pub struct JsonSchemaInterceptor {
    config: JsonSchemaConfig,
    bindings: HashMap<(TypeId, Verb), JsonSchema>,
    validators: DashMap<PathBuf, Arc<Validator>>,
}

impl JsonSchemaInterceptor {
    pub fn new(config: JsonSchemaConfig) -> Self {
        Self {
            config,
            bindings: HashMap::new(),
            validators: DashMap::new(),
        }
    }

    pub fn bind<R: ResourceObject>(self, verb: Verb, schema: JsonSchema) -> Self {
        self.bind_type(TypeId::of::<R>(), verb, schema)
    }

    pub fn bind_type(mut self, resource_type: TypeId, verb: Verb, schema: JsonSchema) -> Self {
        self.bindings.insert((resource_type, verb), schema);
        self
    }

    pub fn config(&self) -> &JsonSchemaConfig {
        &self.config
    }

    /// Files bound to `resource_type`'s `verb` method, if any.
    pub fn schema_pair(&self, resource_type: TypeId, verb: Verb) -> Option<SchemaPair> {
        let binding = self.bindings.get(&(resource_type, verb))?;
        let (response, request) = match binding {
            JsonSchema::Files { schema, params } => (
                self.config.schema_dir.join(schema),
                params.as_ref().map(|p| self.config.validate_dir.join(p)),
            ),
            JsonSchema::Named(name) => {
                let file = format!("{}.json", name);
                let request = self.config.validate_dir.join(&file);
                (
                    self.config.schema_dir.join(&file),
                    request.is_file().then_some(request),
                )
            }
        };
        Some(SchemaPair {
            request,
            response,
            target_code: self.config.target_code,
        })
    }

    fn validator(&self, path: &Path) -> Result<Arc<Validator>, ResourceError> {
        if let Some(cached) = self.validators.get(path) {
            return Ok(Arc::clone(cached.value()));
        }
        let schema = load_bundled(path)?;
        let validator = Arc::new(compile(&schema, path)?);
        self.validators
            .insert(path.to_path_buf(), Arc::clone(&validator));
        Ok(validator)
    }

    fn check(
        &self,
        schema_path: &Path,
        payload: &Value,
        target: &Target<'_>,
    ) -> Result<(), ResourceError> {
        let validator = self.validator(schema_path)?;
        let errors = violations(&validator, payload);
        if errors.is_empty() {
            return Ok(());
        }
        warn!(
            uri = %target.uri,
            verb = %target.verb,
            schema = %schema_path.display(),
            errors = errors.len(),
            "json schema validation failed"
        );
        Err(ResourceError::JsonSchemaValidation {
            uri: target.uri.to_string(),
            errors,
        })
    }
}

impl Interceptor for JsonSchemaInterceptor {
    fn before(&self, target: &Target<'_>, args: &Query) -> Result<(), ResourceError> {
        let Some(pair) = self.schema_pair(target.resource_type, target.verb) else {
            return Ok(());
        };
        // A missing file is a deployment defect; report it before running anything.
        if !pair.response.is_file() {
            return Err(ResourceError::JsonSchemaNotFound {
                path: pair.response,
            });
        }
        match &pair.request {
            Some(request) => self.check(request, &Value::Object(args.clone()), target),
            None => Ok(()),
        }
    }

    fn after(&self, target: &Target<'_>, state: &ResourceState) -> Result<(), ResourceError> {
        let Some(pair) = self.schema_pair(target.resource_type, target.verb) else {
            return Ok(());
        };
        if state.code != pair.target_code {
            debug!(code = state.code, "response validation skipped");
            return Ok(());
        }
        let body = state.body.clone().unwrap_or(Value::Null);
        self.check(&pair.response, &body, target)?;
        debug!(uri = %target.uri, verb = %target.verb, "validated");
        Ok(())
    }
}

/// Compile a schema document.
///
/// # Errors
///
/// Returns `ResourceError::InvalidSchema` if the document is not a valid schema.
pub fn compile(schema: &Value, origin: &Path) -> Result<Validator, ResourceError> {
    jsonschema::validator_for(schema).map_err(|e| ResourceError::InvalidSchema {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })
}

/// All violations of `payload`, in reporting order.
pub fn violations(validator: &Validator, payload: &Value) -> Vec<SchemaError> {
    validator.iter_errors(payload).map(|e| schema_error(&e)).collect()
}

/// Validate `payload` against the schema file at `path`.
///
/// Returns the violations; an empty list means the payload is valid.
///
/// # Errors
///
/// Returns loading or compilation errors for the schema file.
pub fn validate_file(path: &Path, payload: &Value) -> Result<Vec<SchemaError>, ResourceError> {
    let schema = load_bundled(path)?;
    let validator = compile(&schema, path)?;
    Ok(violations(&validator, payload))
}

fn schema_error(error: &ValidationError<'_>) -> SchemaError {
    let mut property = dotted(&error.instance_path.to_string());
    let message = match &error.kind {
        ValidationErrorKind::Minimum { limit } => format!("Must have a minimum value of {}", limit),
        ValidationErrorKind::Maximum { limit } => format!("Must have a maximum value of {}", limit),
        ValidationErrorKind::MinLength { limit } => {
            format!("Must be at least {} characters long", limit)
        }
        ValidationErrorKind::MaxLength { limit } => {
            format!("Must be at most {} characters long", limit)
        }
        ValidationErrorKind::Enum { options } => {
            format!("Does not have a value in the enumeration {}", options)
        }
        ValidationErrorKind::Required { property: missing } => {
            let name = missing
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| missing.to_string());
            property = if property.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", property, name)
            };
            format!("The property {} is required", name)
        }
        _ => error.to_string(),
    };
    SchemaError { property, message }
}

/// `/name/firstName` becomes `name.firstName`.
fn dotted(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}
