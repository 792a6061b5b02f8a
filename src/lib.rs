//! PJS - delimiter-tagged template compiler
//!
//! Templates mix literal text with tags (`<% code %>`, `<%= escaped %>`,
//! `<%- raw %>`, `<%# comment %>`) and compile into a [`CompiledTemplate`]
//! that renders a JSON data context to text:
//! - a delimiter-aware tokenizer and tag-mode state machine
//! - body and deferred-tail step generation (`done(...)`)
//! - directive (`<% include partial %>`) and runtime (`include(path, data)`) includes
//! - line-contextualized runtime errors
//! - an injectable compiled-template cache

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod escape;
pub mod generator;
pub mod include;
pub mod options;
pub mod script;
pub mod template;
pub mod tokenizer;

// Re-export main types for public API
pub use cache::{CacheStats, MemoryTemplateCache, NoopTemplateCache, TemplateCache};
pub use config::EngineConfig;
pub use engine::{compile, Engine};
pub use error::{Error, Result};
pub use escape::escape_xml;
pub use options::CompileOptions;
pub use script::Value;
pub use template::CompiledTemplate;
