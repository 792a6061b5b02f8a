use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PJS template compiler
///
/// Compile-time variants are raised synchronously by `compile` and friends;
/// runtime variants come out of executing a compiled template.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not find matching close tag for \"{0}\".")]
    UnmatchedTag(String),

    #[error("Cannot include '{path}' in '{parent}' template")]
    IncludeNotFound {
        path: String,
        parent: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Include cycle detected: '{0}' includes itself")]
    IncludeCycle(String),

    #[error("Maximum include depth of {limit} exceeded while including '{path}'")]
    IncludeDepth { path: String, limit: usize },

    #[error("{0}")]
    MissingOption(&'static str),

    #[error("Failed to read template {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SyntaxError: {message} in {filename} while compiling pjs")]
    Syntax { message: String, filename: String },

    #[error("ReferenceError: {0} is not defined")]
    UnboundName(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Runtime failure rewritten with the surrounding template lines
    #[error("{message}")]
    Render {
        message: String,
        path: Option<PathBuf>,
        line: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn syntax(message: impl Into<String>, filename: Option<&std::path::Path>) -> Self {
        Self::Syntax {
            message: message.into(),
            filename: filename
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "template".to_string()),
        }
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for failures surfaced while compiling, before any output exists
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Error::UnmatchedTag(_)
                | Error::IncludeNotFound { .. }
                | Error::IncludeCycle(_)
                | Error::MissingOption(_)
                | Error::Read { .. }
                | Error::Syntax { .. }
        )
    }

    /// Path of the template a render error was located in, if known
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::Render { path, .. } => path.as_deref(),
            Error::Read { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The underlying failure, skipping diagnostic wrapping
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Render { source, .. } = current {
            current = source;
        }
        current
    }

    /// Get error code for logs and error pages
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::UnmatchedTag(_) => "E_UNMATCHED_TAG",
            Error::IncludeNotFound { .. } => "E_INCLUDE",
            Error::IncludeCycle(_) => "E_INCLUDE_CYCLE",
            Error::IncludeDepth { .. } => "E_INCLUDE_DEPTH",
            Error::MissingOption(_) => "E_OPTION",
            Error::Read { .. } => "E_IO",
            Error::Syntax { .. } => "E_SYNTAX",
            Error::UnboundName(_) => "E_REFERENCE",
            Error::Type(_) => "E_TYPE",
            Error::Config(_) => "E_CONFIG",
            Error::Json(_) => "E_JSON",
            Error::Render { source, .. } => source.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_classification() {
        assert!(Error::UnmatchedTag("<%".into()).is_compile_error());
        assert!(Error::MissingOption("cache option requires a filename").is_compile_error());
        assert!(!Error::UnboundName("x".into()).is_compile_error());
    }

    #[test]
    fn test_render_error_unwraps_to_root() {
        let err = Error::Render {
            message: "ctx".into(),
            path: Some(PathBuf::from("a.pjs")),
            line: 3,
            source: Box::new(Error::UnboundName("x".into())),
        };
        assert_eq!(err.error_code(), "E_REFERENCE");
        assert!(matches!(err.root_cause(), Error::UnboundName(n) if n == "x"));
        assert_eq!(err.path(), Some(std::path::Path::new("a.pjs")));
    }

    #[test]
    fn test_unbound_message() {
        assert_eq!(
            Error::UnboundName("name".into()).to_string(),
            "ReferenceError: name is not defined"
        );
    }
}
