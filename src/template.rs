//! Compiled templates and the render contract

use crate::cache::{NoopTemplateCache, TemplateCache};
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::generator::Generated;
use crate::include;
use crate::options::CompileOptions;
use crate::script::{self, Host, Interpreter, NativeFn, Program, Value};
use log::info;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};

/// Runtime includes that may be nested inside one render
pub const MAX_INCLUDE_DEPTH: usize = 20;

/// Immutable rendering unit produced by `compile`
///
/// Holds no per-render state, so one instance can be rendered any number of
/// times from any number of threads.
pub struct CompiledTemplate {
    program: Program,
    options: CompileOptions,
    /// Cache used by runtime includes (it may itself hold this template)
    cache: Weak<dyn TemplateCache>,
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("filename", &self.options.filename)
            .field("statements", &self.program.statements.len())
            .finish_non_exhaustive()
    }
}

impl CompiledTemplate {
    /// Realize generated steps into an executable template
    pub fn build(
        generated: &Generated,
        options: CompileOptions,
        cache: Arc<dyn TemplateCache>,
    ) -> Result<Self> {
        if options.debug {
            info!(
                "Generated steps for {}:\n{}",
                options
                    .filename
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "template".to_string()),
                generated
            );
        }

        let program = script::realize(generated)?;
        Ok(Self {
            program,
            options,
            cache: Arc::downgrade(&cache),
        })
    }

    pub fn filename(&self) -> Option<&Path> {
        self.options.filename.as_deref()
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Render with `data` as the data context
    ///
    /// With line mapping enabled, runtime failures come back as
    /// [`Error::Render`](crate::Error::Render) carrying the surrounding lines.
    pub fn render(&self, data: &serde_json::Value) -> Result<String> {
        self.render_nested(data, 0)
    }

    fn render_nested(&self, data: &serde_json::Value, depth: usize) -> Result<String> {
        let host = RenderHost {
            template: self,
            data,
            depth,
        };
        let this = self
            .options
            .context
            .as_ref()
            .map(Value::from_json)
            .unwrap_or_default();
        let mut interpreter = Interpreter::new(
            &host,
            &Value::from_json(data),
            &self.options.locals_name,
            this,
        );

        match interpreter.run(&self.program) {
            Ok(()) => Ok(interpreter.into_output()),
            Err(err) if self.options.compile_debug => {
                let at = interpreter.position();
                let (text, path) = match self.program.source(at.file) {
                    Some(source) => (source.text.as_str(), source.path.as_deref()),
                    None => ("", None),
                };
                Err(diagnostics::rethrow(err, text, path, at.line))
            }
            Err(err) => Err(err),
        }
    }

    /// Render and hand the outcome to `callback`
    ///
    /// With line mapping enabled the callback receives every outcome exactly
    /// once and `Ok(())` is returned. Without it a runtime failure is returned
    /// directly and the callback is never invoked.
    pub fn render_with<F>(&self, data: &serde_json::Value, callback: F) -> Result<()>
    where
        F: FnOnce(Result<String>),
    {
        match self.render(data) {
            Err(err) if !self.options.compile_debug => Err(err),
            outcome => {
                callback(outcome);
                Ok(())
            }
        }
    }
}

/// Per-render services backing `include`, escaping and host functions
struct RenderHost<'a> {
    template: &'a CompiledTemplate,
    data: &'a serde_json::Value,
    /// Runtime includes enclosing this render
    depth: usize,
}

impl Host for RenderHost<'_> {
    fn include(&self, path: &str, overrides: Option<&Value>) -> Result<String> {
        if self.depth >= MAX_INCLUDE_DEPTH {
            return Err(Error::IncludeDepth {
                path: path.to_string(),
                limit: MAX_INCLUDE_DEPTH,
            });
        }

        // Without a live cache, includes still compile, just uncached
        let cache: Arc<dyn TemplateCache> = match self.template.cache.upgrade() {
            Some(cache) => cache,
            None => Arc::new(NoopTemplateCache),
        };
        let included = include::include_file(path, &self.template.options, &cache)?;
        let overrides = overrides.map(Value::to_json);
        let data = include::merge_data(self.data, overrides.as_ref());
        included.render_nested(&data, self.depth + 1)
    }

    fn escape(&self, text: &str) -> String {
        (self.template.options.escape)(text)
    }

    fn native(&self, name: &str) -> Option<&NativeFn> {
        self.template.options.functions.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_render_is_repeatable() {
        let template = crate::compile("<%= n * 2 %>", &CompileOptions::default()).unwrap();
        assert_eq!(template.render(&json!({"n": 2})).unwrap(), "4");
        assert_eq!(template.render(&json!({"n": 5})).unwrap(), "10");
    }

    #[test]
    fn test_context_binds_this() {
        let options = CompileOptions::default().with_context(json!({"site": "pjs"}));
        let template = crate::compile("<%= this.site %>", &options).unwrap();
        assert_eq!(template.render(&json!({})).unwrap(), "pjs");
    }

    #[test]
    fn test_callback_receives_rewritten_error() {
        let template = crate::compile("a\n<%= missing %>", &CompileOptions::default()).unwrap();
        let calls = Cell::new(0);
        let result = template.render_with(&json!({}), |outcome| {
            calls.set(calls.get() + 1);
            let err = outcome.unwrap_err();
            assert!(matches!(err, Error::Render { line: 2, .. }));
            assert!(err.to_string().contains(" >> 2| <%= missing %>"));
        });
        assert!(result.is_ok());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_error_returned_without_line_mapping() {
        let options = CompileOptions::default().with_compile_debug(false);
        let template = crate::compile("<%= missing %>", &options).unwrap();
        let called = Cell::new(false);
        let result = template.render_with(&json!({}), |_| called.set(true));
        assert!(matches!(result, Err(Error::UnboundName(_))));
        assert!(!called.get());
    }

    #[test]
    fn test_custom_escape_and_locals_name() {
        let options = CompileOptions::default()
            .with_escape(|s| s.replace('<', "&lt;"))
            .with_locals_name("it");
        let template = crate::compile("<%= it.x %>", &options).unwrap();
        assert_eq!(template.render(&json!({"x": "<b>"})).unwrap(), "&lt;b>");
    }
}
