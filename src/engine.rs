//! Compile and render entry points bound to an injected template cache

use crate::cache::{MemoryTemplateCache, NoopTemplateCache, TemplateCache};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::generator;
use crate::include;
use crate::options::CompileOptions;
use crate::template::CompiledTemplate;
use log::debug;
use std::path::Path;
use std::sync::Arc;

/// Compile `text` without touching any cache entry; `cache` is only handed
/// on to runtime includes
pub fn compile_with(
    text: &str,
    options: &CompileOptions,
    cache: Arc<dyn TemplateCache>,
) -> Result<CompiledTemplate> {
    if options.cache && options.filename.is_none() {
        return Err(Error::MissingOption("cache option requires a filename"));
    }

    debug!(
        "Compiling template {:?} ({} bytes)",
        options.filename, text.len()
    );
    let generated = generator::generate(text, options)?;
    CompiledTemplate::build(&generated, options.clone(), cache)
}

/// Return the cached template for `options.filename` when caching is
/// enabled, otherwise compile it (reading the file unless `text` is given)
/// and store the result
pub fn compile_cached(
    cache: &Arc<dyn TemplateCache>,
    options: &CompileOptions,
    text: Option<&str>,
) -> Result<Arc<CompiledTemplate>> {
    let filename = options
        .filename
        .as_deref()
        .ok_or(Error::MissingOption("cache option requires a filename"))?;

    if options.cache {
        if let Some(template) = cache.get(filename) {
            debug!("Template cache hit for {:?}", filename);
            return Ok(template);
        }
        debug!("Template cache miss for {:?}", filename);
    }

    let template = match text {
        Some(text) => compile_with(text, options, Arc::clone(cache))?,
        None => {
            let text = include::read_template(filename).map_err(|source| Error::Read {
                path: filename.to_path_buf(),
                source,
            })?;
            compile_with(&text, options, Arc::clone(cache))?
        }
    };
    let template = Arc::new(template);

    if options.cache {
        debug!("Storing compiled template for {:?}", filename);
        cache.set(filename, Arc::clone(&template));
    }
    Ok(template)
}

/// Compile `text` with a cache that stores nothing
pub fn compile(text: &str, options: &CompileOptions) -> Result<Arc<CompiledTemplate>> {
    let cache: Arc<dyn TemplateCache> = Arc::new(NoopTemplateCache);
    compile_with(text, options, cache).map(Arc::new)
}

/// Template engine: default compile options plus the cache every compile
/// and runtime include goes through
pub struct Engine {
    options: CompileOptions,
    cache: Arc<dyn TemplateCache>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with default options and an in-memory cache
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MemoryTemplateCache::new()))
    }

    pub fn with_cache(cache: Arc<dyn TemplateCache>) -> Self {
        Self {
            options: CompileOptions::default(),
            cache,
        }
    }

    /// Replace the default compile options
    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Engine seeded from a loaded configuration
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let options = config.compile_options()?;
        let cache: Arc<dyn TemplateCache> = if config.cache_enabled {
            Arc::new(MemoryTemplateCache::new())
        } else {
            Arc::new(NoopTemplateCache)
        };
        Ok(Self::with_cache(cache).with_options(options))
    }

    /// Default options used by `render` and `render_file`
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<dyn TemplateCache> {
        &self.cache
    }

    /// Compile `text`; stored in the cache when `options.cache` is set
    pub fn compile(&self, text: &str, options: &CompileOptions) -> Result<Arc<CompiledTemplate>> {
        if options.cache {
            self.compile_cached(options, Some(text))
        } else {
            compile_with(text, options, Arc::clone(&self.cache)).map(Arc::new)
        }
    }

    /// Compile the file named by `options.filename`, through the cache when
    /// `options.cache` is set
    pub fn compile_from_cache(&self, options: &CompileOptions) -> Result<Arc<CompiledTemplate>> {
        self.compile_cached(options, None)
    }

    pub fn compile_cached(
        &self,
        options: &CompileOptions,
        text: Option<&str>,
    ) -> Result<Arc<CompiledTemplate>> {
        compile_cached(&self.cache, options, text)
    }

    /// Compile `text` with the default options and render it
    pub fn render(&self, text: &str, data: &serde_json::Value) -> Result<String> {
        self.compile(text, &self.options)?.render(data)
    }

    /// Compile the template at `path` with the default options and render it
    pub fn render_file(&self, path: impl AsRef<Path>, data: &serde_json::Value) -> Result<String> {
        let options = self.options.clone().with_filename(path.as_ref());
        self.compile_from_cache(&options)?.render(data)
    }

    /// Drop every cached template
    pub fn clear_cache(&self) {
        self.cache.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cache_requires_filename() {
        let options = CompileOptions::default().with_cache(true);
        let err = compile("x", &options).unwrap_err();
        assert!(matches!(err, Error::MissingOption(_)));
        assert!(err.is_compile_error());
    }

    #[test]
    fn test_compile_cached_reads_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("page.pjs");
        fs::write(&file, "Hi <%= name %>").unwrap();

        let engine = Engine::new();
        let options = CompileOptions::default().with_filename(&file);
        let template = engine.compile_from_cache(&options).unwrap();
        assert_eq!(template.render(&json!({"name": "Ann"})).unwrap(), "Hi Ann");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let engine = Engine::new();
        let options = CompileOptions::default().with_filename("/nonexistent/page.pjs");
        let err = engine.compile_from_cache(&options).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert_eq!(err.error_code(), "E_IO");
    }

    #[test]
    fn test_explicit_text_is_cached_under_filename() {
        let engine = Engine::new();
        let options = CompileOptions::default()
            .with_filename("virtual/page.pjs")
            .with_cache(true);
        let first = engine.compile("one", &options).unwrap();
        let second = engine.compile("two", &options).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.render(&json!({})).unwrap(), "one");

        engine.clear_cache();
        let third = engine.compile("two", &options).unwrap();
        assert_eq!(third.render(&json!({})).unwrap(), "two");
    }

    #[test]
    fn test_render_with_default_options() {
        let engine = Engine::new().with_options(CompileOptions::default().with_delimiter('?'));
        assert_eq!(engine.render("<?= 1 + 1 ?>", &json!({})).unwrap(), "2");
    }
}
