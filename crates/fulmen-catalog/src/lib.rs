//! Catalog loader (C3): named YAML reference documents (signals, metric
//! taxonomy, exit codes, redaction patterns) loaded once per process,
//! schema-validated against a registered schema id, and cached.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use fulmen_error::{Error, ErrorCode};
use fulmen_schema::Registry as SchemaRegistry;
use serde_json::Value;

/// Identifies one catalog: its YAML path and the schema id it must
/// validate against.
#[derive(Debug, Clone)]
pub struct CatalogDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub schema_id: String,
}

static CACHE: OnceLock<Mutex<HashMap<String, Arc<Value>>>> = OnceLock::new();

fn cache() -> &'static Mutex<HashMap<String, Arc<Value>>> {
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Test-only hook: clears the process-wide cache. Never called from
/// production code paths.
pub fn _reset() {
    cache().lock().expect("catalog cache mutex poisoned").clear();
}

/// Loads catalogs against a shared schema registry, caching parsed results
/// process-wide.
pub struct CatalogStore {
    schema_registry: SchemaRegistry,
}

impl CatalogStore {
    #[must_use]
    pub fn new(schema_registry: SchemaRegistry) -> Self {
        CatalogStore { schema_registry }
    }

    /// Load `descriptor`, returning the cached copy if this name was
    /// already loaded. The load (parse + schema validation) happens while
    /// holding the cache lock, so concurrent first-use of the same catalog
    /// coalesces into a single load rather than racing.
    pub fn load(&self, descriptor: &CatalogDescriptor) -> Result<Arc<Value>, Error> {
        let mut guard = cache().lock().expect("catalog cache mutex poisoned");
        if let Some(existing) = guard.get(&descriptor.name) {
            return Ok(Arc::clone(existing));
        }
        let parsed = self.load_uncached(descriptor)?;
        let arc = Arc::new(parsed);
        guard.insert(descriptor.name.clone(), Arc::clone(&arc));
        Ok(arc)
    }

    fn load_uncached(&self, descriptor: &CatalogDescriptor) -> Result<Value, Error> {
        if !descriptor.path.is_file() {
            return Err(Error::new(
                ErrorCode::CatalogMissing,
                format!("catalog '{}' not found at {}", descriptor.name, descriptor.path.display()),
            )
            .with_context("catalog", descriptor.name.clone()));
        }
        let content = std::fs::read_to_string(&descriptor.path).map_err(|e| {
            Error::new(
                ErrorCode::CatalogInvalidSchema,
                format!(
                    "failed to read catalog '{}' at {}: {e}",
                    descriptor.name,
                    descriptor.path.display()
                ),
            )
            .with_cause(e)
        })?;
        let value: Value = serde_yaml::from_str(&content).map_err(|e| {
            Error::new(
                ErrorCode::CatalogInvalidSchema,
                format!("catalog '{}' is not valid YAML: {e}", descriptor.name),
            )
            .with_cause(e)
        })?;

        let validator = fulmen_schema::compile_schema_by_id(&self.schema_registry, &descriptor.schema_id)
            .map_err(|e| {
                fulmen_error::wrap(e, [("catalog".to_string(), serde_json::json!(descriptor.name))])
            })?;
        let outcome = fulmen_schema::validate_data(&value, &validator);
        if !outcome.valid {
            let joined = fulmen_schema::format_diagnostics(&outcome.diagnostics);
            return Err(Error::new(
                ErrorCode::CatalogInvalidSchema,
                format!("catalog '{}' failed schema validation: {joined}", descriptor.name),
            )
            .with_context("catalog", descriptor.name.clone()));
        }
        Ok(value)
    }

    /// Look up one entry within a previously-described catalog, matching
    /// `identifier` against each entry's `id` or `name` field. Catalogs are
    /// expected to hold a top-level array of objects, or a top-level object
    /// whose values are such objects (either shape is searched).
    ///
    /// Returns a defensive copy (entries are cloned out of the cached,
    /// shared catalog document).
    pub fn get_entity(
        &self,
        descriptor: &CatalogDescriptor,
        identifier: &str,
    ) -> Result<Option<Value>, Error> {
        let catalog = self.load(descriptor)?;
        Ok(find_entity(&catalog, identifier))
    }
}

fn matches_identifier(entry: &Value, identifier: &str) -> bool {
    entry
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|s| s == identifier)
        || entry
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|s| s == identifier)
}

fn find_entity(catalog: &Value, identifier: &str) -> Option<Value> {
    match catalog {
        Value::Array(items) => items.iter().find(|e| matches_identifier(e, identifier)).cloned(),
        Value::Object(map) => map
            .values()
            .find(|e| matches_identifier(e, identifier))
            .cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup(dir: &std::path::Path) -> (SchemaRegistry, CatalogDescriptor) {
        fs::write(
            dir.join("signals.schema.json"),
            r#"{"type":"array","items":{"type":"object","required":["id"],"properties":{"id":{"type":"string"}}}}"#,
        )
        .unwrap();
        fs::write(dir.join("signals.yaml"), "- id: SIGINT\n  priority: 10\n- id: SIGHUP\n  priority: 5\n").unwrap();
        let schema_registry = SchemaRegistry::new(dir);
        let descriptor = CatalogDescriptor {
            name: "signals".to_string(),
            path: dir.join("signals.yaml"),
            schema_id: "signals".to_string(),
        };
        (schema_registry, descriptor)
    }

    #[test]
    fn loads_and_caches_a_valid_catalog() {
        _reset();
        let dir = tempfile::tempdir().unwrap();
        let (schema_registry, descriptor) = setup(dir.path());
        let store = CatalogStore::new(schema_registry);
        let first = store.load(&descriptor).unwrap();
        let second = store.load(&descriptor).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn get_entity_finds_by_id() {
        _reset();
        let dir = tempfile::tempdir().unwrap();
        let (schema_registry, descriptor) = setup(dir.path());
        let store = CatalogStore::new(schema_registry);
        let entry = store.get_entity(&descriptor, "SIGINT").unwrap().unwrap();
        assert_eq!(entry["priority"], 10);
    }

    #[test]
    fn missing_file_fails_with_catalog_missing() {
        _reset();
        let dir = tempfile::tempdir().unwrap();
        let schema_registry = SchemaRegistry::new(dir.path());
        let descriptor = CatalogDescriptor {
            name: "ghost".to_string(),
            path: dir.path().join("ghost.yaml"),
            schema_id: "ghost".to_string(),
        };
        let store = CatalogStore::new(schema_registry);
        let err = store.load(&descriptor).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CatalogMissing);
    }

    #[test]
    fn reset_clears_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (schema_registry, descriptor) = setup(dir.path());
        let store = CatalogStore::new(schema_registry);
        let first = store.load(&descriptor).unwrap();
        _reset();
        let second = store.load(&descriptor).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
