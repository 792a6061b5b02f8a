//! Include resolution shared by directive and runtime includes

use crate::cache::TemplateCache;
use crate::engine;
use crate::error::{Error, Result};
use crate::options::CompileOptions;
use crate::template::CompiledTemplate;
use log::debug;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BOM: char = '\u{feff}';

/// Resolve `name` against the directory of the including file, adding the
/// template extension when `name` has none
pub fn resolve_include(name: &str, parent: &Path, extension: &str) -> PathBuf {
    let base = parent.parent().unwrap_or_else(|| Path::new(""));
    let mut path = base.join(name);
    if Path::new(name).extension().is_none() {
        let mut file_name = path.as_os_str().to_os_string();
        file_name.push(".");
        file_name.push(extension);
        path = PathBuf::from(file_name);
    }
    path
}

/// Strip one pair of matching quotes around a directive include path
pub fn unquote(raw: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    raw
}

/// Read a template file, dropping a leading byte order mark
pub fn read_template(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read_to_string(path)?;
    Ok(match content.strip_prefix(BOM) {
        Some(stripped) => stripped.to_string(),
        None => content,
    })
}

/// Compile (or fetch from `cache`) the template a runtime `include` names
pub fn include_file(
    name: &str,
    options: &CompileOptions,
    cache: &Arc<dyn TemplateCache>,
) -> Result<Arc<CompiledTemplate>> {
    let parent = options
        .filename
        .as_deref()
        .ok_or(Error::MissingOption("`include` requires the 'filename' option."))?;

    let mut options = options.clone();
    let path = resolve_include(name, parent, &options.extension);
    debug!("Runtime include of {:?} from {:?}", path, parent);
    options.filename = Some(path);
    engine::compile_cached(cache, &options, None)
}

/// Shallow copy of `data` with the fields of `overrides` laid over it
pub fn merge_data(data: &Value, overrides: Option<&Value>) -> Value {
    let mut merged = match data {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let Some(Value::Object(extra)) = overrides {
        for (key, value) in extra {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_adds_default_extension() {
        let path = resolve_include("partial", Path::new("/views/pages/index.pjs"), "pjs");
        assert_eq!(path, PathBuf::from("/views/pages/partial.pjs"));
    }

    #[test]
    fn test_resolve_keeps_explicit_extension() {
        let path = resolve_include("../shared/nav.html", Path::new("/views/pages/index.pjs"), "pjs");
        assert_eq!(path, PathBuf::from("/views/pages/../shared/nav.html"));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"partial\""), "partial");
        assert_eq!(unquote("'partial'"), "partial");
        assert_eq!(unquote("partial"), "partial");
        assert_eq!(unquote("\"partial'"), "\"partial'");
    }

    #[test]
    fn test_read_template_strips_bom() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("bom.pjs");
        fs::write(&file, "\u{feff}Hello").unwrap();
        assert_eq!(read_template(&file).unwrap(), "Hello");
    }

    #[test]
    fn test_merge_data_overrides_shallowly() {
        let data = json!({"name": "Ann", "user": {"id": 1}});
        let merged = merge_data(&data, Some(&json!({"name": "Bo"})));
        assert_eq!(merged, json!({"name": "Bo", "user": {"id": 1}}));
        assert_eq!(merge_data(&data, None), data);
    }

    #[test]
    fn test_runtime_include_requires_filename() {
        let cache: Arc<dyn TemplateCache> = Arc::new(crate::cache::NoopTemplateCache);
        let err = include_file("partial", &CompileOptions::default(), &cache).unwrap_err();
        assert!(matches!(err, Error::MissingOption(_)));
    }
}
