use crate::escape::{default_escape, EscapeFn};
use crate::script::{NativeFn, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_DELIMITER: char = '%';
pub const DEFAULT_LOCALS_NAME: &str = "locals";
pub const DEFAULT_EXTENSION: &str = "pjs";

/// Options recognised by `compile` and the cached entry points
#[derive(Clone)]
pub struct CompileOptions {
    /// Character framing every tag marker
    pub delimiter: char,
    /// Applied to the output of `<%= %>` tags
    pub escape: EscapeFn,
    /// Interleave line markers so runtime failures can be located
    pub compile_debug: bool,
    /// Log the generated step listing
    pub debug: bool,
    /// Template path; required by directive includes and caching
    pub filename: Option<PathBuf>,
    /// Value bound to `this` while rendering
    pub context: Option<serde_json::Value>,
    /// Name under which the whole data context is reachable
    pub locals_name: String,
    /// Store and reuse compiled templates by `filename`
    pub cache: bool,
    /// Extension appended to include paths that have none
    pub extension: String,
    /// Host functions callable from template code
    pub functions: HashMap<String, NativeFn>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            escape: default_escape(),
            compile_debug: true,
            debug: false,
            filename: None,
            context: None,
            locals_name: DEFAULT_LOCALS_NAME.to_string(),
            cache: false,
            extension: DEFAULT_EXTENSION.to_string(),
            functions: HashMap::new(),
        }
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<&String> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("CompileOptions")
            .field("delimiter", &self.delimiter)
            .field("compile_debug", &self.compile_debug)
            .field("debug", &self.debug)
            .field("filename", &self.filename)
            .field("context", &self.context)
            .field("locals_name", &self.locals_name)
            .field("cache", &self.cache)
            .field("extension", &self.extension)
            .field("functions", &functions)
            .finish_non_exhaustive()
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_escape<F>(mut self, escape: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.escape = Arc::new(escape);
        self
    }

    pub fn with_compile_debug(mut self, enabled: bool) -> Self {
        self.compile_debug = enabled;
        self
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_locals_name(mut self, name: impl Into<String>) -> Self {
        self.locals_name = name.into();
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Register a host function callable by name from template code
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> crate::Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::default();
        assert_eq!(options.delimiter, '%');
        assert!(options.compile_debug);
        assert!(!options.cache);
        assert_eq!(options.locals_name, "locals");
        assert_eq!((options.escape)("<"), "&lt;");
    }

    #[test]
    fn test_builder() {
        let options = CompileOptions::new()
            .with_delimiter('?')
            .with_filename("views/index.pjs")
            .with_cache(true)
            .with_escape(|s| s.to_uppercase())
            .with_function("twice", |args| {
                Ok(Value::Number(args.first().map(Value::to_number).unwrap_or(0.0) * 2.0))
            });
        assert_eq!(options.delimiter, '?');
        assert_eq!(options.filename, Some(PathBuf::from("views/index.pjs")));
        assert_eq!((options.escape)("abc"), "ABC");
        assert!(options.functions.contains_key("twice"));
        assert!(format!("{:?}", options).contains("twice"));
    }
}
