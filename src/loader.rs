//! Schema file loading.
//!
//! Handles reading schema files and inlining the external `$ref`s between
//! them so a schema directory can be compiled one file at a time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::error::ResourceError;

/// Load a schema from a file path.
///
/// # Errors
///
/// Returns `ResourceError::JsonSchemaNotFound` if the file doesn't exist,
/// or `ResourceError::InvalidSchema` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, ResourceError> {
    if !path.is_file() {
        return Err(ResourceError::JsonSchemaNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ResourceError::ReadError {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })?;

    serde_json::from_str(&content).map_err(|e| ResourceError::InvalidSchema {
        path: path.to_path_buf(),
        message: format!("invalid JSON: {}", e),
    })
}

/// Load a schema file and inline its external `$ref`s.
///
/// # Errors
///
/// As [`load_schema`] and [`bundle_refs`].
pub fn load_bundled(path: &Path) -> Result<Value, ResourceError> {
    let mut schema = load_schema(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    bundle_refs(&mut schema, base_dir, path)?;
    Ok(schema)
}

/// Navigate a JSON Pointer fragment (e.g., "#/definitions/user").
///
/// The fragment should start with '#'.
pub fn navigate_fragment(schema: &Value, fragment: &str, origin: &Path) -> Result<Value, ResourceError> {
    let path = fragment.trim_start_matches('#').trim_start_matches('/');
    if path.is_empty() {
        return Ok(schema.clone());
    }

    let mut current = schema;
    for part in path.split('/') {
        // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
        let key = part.replace("~1", "/").replace("~0", "~");
        let next = match current {
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => current.get(&key),
        };
        current = next.ok_or_else(|| ResourceError::InvalidSchema {
            path: origin.to_path_buf(),
            message: format!("fragment not found: {}", fragment),
        })?;
    }
    Ok(current.clone())
}

/// Recursively resolve and inline external `$ref` pointers.
///
/// Refs to other files (`"user.json"`, `"user.json#/definitions/name"`) are
/// loaded relative to `base_dir` and inlined. Internal refs (`#/...`) in the
/// root schema are left for the validator; internal refs inside loaded files
/// are resolved against that file. `$ref: "#"` is left as-is.
///
/// # Errors
///
/// Returns `ResourceError::JsonSchemaNotFound` for a missing referenced file
/// and `ResourceError::InvalidSchema` for bad fragments or reference cycles.
pub fn bundle_refs(schema: &mut Value, base_dir: &Path, origin: &Path) -> Result<(), ResourceError> {
    bundle_refs_inner(schema, base_dir, None, origin, &mut HashSet::new())
}

fn bundle_refs_inner(
    schema: &mut Value,
    base_dir: &Path,
    file_root: Option<&Value>,
    origin: &Path,
    visited: &mut HashSet<String>,
) -> Result<(), ResourceError> {
    match schema {
        Value::Object(obj) => {
            if let Some(ref_val) = obj.get("$ref").and_then(|v| v.as_str()).map(str::to_string) {
                if ref_val.starts_with('#') {
                    // Only resolvable here when inside an external file
                    if let (false, Some(root)) = (ref_val == "#", file_root) {
                        let mut target = navigate_fragment(root, &ref_val, origin)?;
                        bundle_refs_inner(&mut target, base_dir, file_root, origin, visited)?;
                        inline(obj, target);
                        return Ok(());
                    }
                } else {
                    let (file_part, fragment) = match ref_val.find('#') {
                        Some(idx) => (&ref_val[..idx], Some(&ref_val[idx..])),
                        None => (ref_val.as_str(), None),
                    };

                    let ref_path = base_dir.join(file_part);
                    let canonical = ref_path.canonicalize().unwrap_or_else(|_| ref_path.clone());
                    let visit_key = format!("{}|{}", canonical.display(), fragment.unwrap_or(""));

                    if visited.contains(&visit_key) {
                        return Err(ResourceError::InvalidSchema {
                            path: origin.to_path_buf(),
                            message: format!("circular reference detected: {}", ref_val),
                        });
                    }

                    let loaded = load_schema(&ref_path)?;
                    let mut target = match fragment {
                        Some(frag) => navigate_fragment(&loaded, frag, &ref_path)?,
                        None => loaded.clone(),
                    };

                    visited.insert(visit_key.clone());
                    let ref_dir: PathBuf = ref_path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| base_dir.to_path_buf());
                    bundle_refs_inner(&mut target, &ref_dir, Some(&loaded), &ref_path, visited)?;
                    visited.remove(&visit_key);

                    inline(obj, target);
                    return Ok(());
                }
            }

            for value in obj.values_mut() {
                bundle_refs_inner(value, base_dir, file_root, origin, visited)?;
            }
        }
        Value::Array(arr) => {
            for item in arr {
                bundle_refs_inner(item, base_dir, file_root, origin, visited)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replace `$ref` with the target's keywords, keeping sibling keywords.
fn inline(obj: &mut serde_json::Map<String, Value>, target: Value) {
    obj.remove("$ref");
    if let Value::Object(ref_obj) = target {
        for (k, v) in ref_obj {
            obj.entry(k).or_insert(v);
        }
    }
}
