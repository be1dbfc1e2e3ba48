//! File-addressed schema registry: discovers `**/*.schema.{json,yaml}`
//! under a base directory and keys each schema by a stable id derived from
//! its path relative to that directory, minus extension.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fulmen_error::{Error, ErrorCode};
use globset::{Glob, GlobSetBuilder};

use crate::normalize::Format;

/// A discovered schema: its stable id, resolved path, and source format.
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    pub id: String,
    pub path: PathBuf,
    pub format: Format,
}

/// A file-addressed registry over a base directory, discovered once and
/// cached until [`Registry::refresh`] is called.
pub struct Registry {
    base_dir: PathBuf,
    entries: Mutex<Option<HashMap<String, SchemaEntry>>>,
}

impl Registry {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Registry {
            base_dir: base_dir.into(),
            entries: Mutex::new(None),
        }
    }

    /// Number of schemas currently cached (0 if not yet discovered).
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.entries
            .lock()
            .expect("registry mutex poisoned")
            .as_ref()
            .map_or(0, HashMap::len)
    }

    /// Force rediscovery on next access.
    pub fn refresh(&self) {
        *self.entries.lock().expect("registry mutex poisoned") = None;
    }

    fn ensure_discovered(&self) -> Result<(), Error> {
        let mut guard = self.entries.lock().expect("registry mutex poisoned");
        if guard.is_some() {
            return Ok(());
        }
        let mut set_builder = GlobSetBuilder::new();
        set_builder.add(Glob::new("**/*.schema.json").expect("static glob is valid"));
        set_builder.add(Glob::new("**/*.schema.yaml").expect("static glob is valid"));
        set_builder.add(Glob::new("**/*.schema.yml").expect("static glob is valid"));
        let set = set_builder.build().expect("static glob set is valid");

        let mut found = HashMap::new();
        walk(&self.base_dir, &mut |path| {
            let rel = path.strip_prefix(&self.base_dir).unwrap_or(path);
            if set.is_match(rel) {
                if let Some(entry) = entry_for(&self.base_dir, path) {
                    found.insert(entry.id.clone(), entry);
                }
            }
        })
        .map_err(|e| {
            Error::new(
                ErrorCode::FileNotFound,
                format!("failed to walk schema base dir {}: {e}", self.base_dir.display()),
            )
            .with_cause(e)
        })?;
        *guard = Some(found);
        Ok(())
    }

    /// List all schemas whose id starts with `prefix` (all schemas if
    /// `prefix` is `None`).
    pub fn list_schemas(&self, prefix: Option<&str>) -> Result<Vec<SchemaEntry>, Error> {
        self.ensure_discovered()?;
        let guard = self.entries.lock().expect("registry mutex poisoned");
        let entries = guard.as_ref().expect("just discovered");
        let mut out: Vec<SchemaEntry> = entries
            .values()
            .filter(|e| prefix.is_none_or(|p| e.id.starts_with(p)))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    /// Resolve `id` to its entry, failing with
    /// [`ErrorCode::SchemaNotFound`] if it isn't registered.
    pub fn get_schema(&self, id: &str) -> Result<SchemaEntry, Error> {
        self.ensure_discovered()?;
        let guard = self.entries.lock().expect("registry mutex poisoned");
        guard
            .as_ref()
            .expect("just discovered")
            .get(id)
            .cloned()
            .ok_or_else(|| {
                Error::new(ErrorCode::SchemaNotFound, format!("schema not found: {id}"))
                    .with_context("schema_id", id)
            })
    }
}

fn entry_for(base_dir: &Path, path: &Path) -> Option<SchemaEntry> {
    let rel = path.strip_prefix(base_dir).ok()?;
    let file_name = rel.file_name()?.to_str()?;
    let stem = file_name
        .strip_suffix(".schema.json")
        .or_else(|| file_name.strip_suffix(".schema.yaml"))
        .or_else(|| file_name.strip_suffix(".schema.yml"))?;
    let format = if file_name.ends_with(".json") {
        Format::Json
    } else {
        Format::Yaml
    };
    let parent = rel.parent().filter(|p| !p.as_os_str().is_empty());
    let id = match parent {
        Some(p) => format!("{}/{}", p.display(), stem).replace('\\', "/"),
        None => stem.to_string(),
    };
    Some(SchemaEntry {
        id,
        path: path.to_path_buf(),
        format,
    })
}

fn walk(dir: &Path, visit: &mut impl FnMut(&Path)) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, visit)?;
        } else {
            visit(&path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_schemas_and_derives_ids() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("signals")).unwrap();
        fs::write(
            dir.path().join("signals/register.schema.json"),
            "{}",
        )
        .unwrap();
        fs::write(dir.path().join("metrics.schema.yaml"), "{}").unwrap();

        let registry = Registry::new(dir.path());
        let all = registry.list_schemas(None).unwrap();
        let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.contains(&"signals/register"));
        assert!(ids.contains(&"metrics"));
        assert_eq!(registry.cache_size(), 2);
    }

    #[test]
    fn get_schema_fails_for_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        let err = registry.get_schema("nonexistent").unwrap_err();
        assert_eq!(err.code(), fulmen_error::ErrorCode::SchemaNotFound);
    }

    #[test]
    fn list_schemas_filters_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a/one.schema.json"), "{}").unwrap();
        fs::write(dir.path().join("b/two.schema.json"), "{}").unwrap();
        let registry = Registry::new(dir.path());
        let filtered = registry.list_schemas(Some("a/")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "a/one");
    }
}
