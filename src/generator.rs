//! Tag-mode state machine and step generation
//!
//! Walks the token sequence produced by [`Tokenizer`], validates tag pairing
//! and emits one [`Step`] per relevant token into a body buffer. Eval code
//! containing a `done(...)` call is split: the text after the call moves to
//! the tail buffer, which runs once after the whole body.

use crate::error::{Error, Result};
use crate::include;
use crate::options::CompileOptions;
use crate::tokenizer::{Marker, Token, Tokenizer};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;

/// First `done(...)` call in an eval chunk, with its optional `;`
static DONE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bdone\([^)]*\);?").expect("Generator: Invalid done() pattern regex")
});

static INCLUDE_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*include\s+(\S+)\s*$").expect("Generator: Invalid include pattern regex")
});

/// Position inside one of the sources that make up a compiled template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Origin {
    /// Index into the template's source file list
    pub file: usize,
    /// 1-based line number
    pub line: usize,
}

impl Origin {
    pub fn new(file: usize, line: usize) -> Self {
        Self { file, line }
    }
}

/// Template text a compiled template was generated from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: Option<PathBuf>,
    pub text: String,
}

/// Current interpretation of the text between an open and a close marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    None,
    Eval,
    Escaped,
    Raw,
    Comment,
    Literal,
}

/// One generated instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    EmitLiteral(String),
    EvalCode { code: String, at: Origin },
    EmitEscaped { expr: String, at: Origin },
    EmitRaw { expr: String, at: Origin },
    MarkLine(Origin),
}

impl Step {
    fn relocate(self, offset: usize) -> Self {
        let shift = |at: Origin| Origin::new(at.file + offset, at.line);
        match self {
            Step::EvalCode { code, at } => Step::EvalCode { code, at: shift(at) },
            Step::EmitEscaped { expr, at } => Step::EmitEscaped { expr, at: shift(at) },
            Step::EmitRaw { expr, at } => Step::EmitRaw { expr, at: shift(at) },
            Step::MarkLine(at) => Step::MarkLine(shift(at)),
            literal => literal,
        }
    }
}

/// Output of the generator: body and tail step buffers plus their sources
#[derive(Debug, Clone, Default)]
pub struct Generated {
    pub body: Vec<Step>,
    pub tail: Vec<Step>,
    pub files: Vec<SourceFile>,
    /// Number of `done(...)` splits, i.e. how deeply the tail is nested
    pub deferred: usize,
}

impl fmt::Display for Generated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_steps(f: &mut fmt::Formatter<'_>, steps: &[Step], indent: usize) -> fmt::Result {
            let pad = "  ".repeat(indent);
            for step in steps {
                match step {
                    Step::EmitLiteral(text) => writeln!(f, "{}; emit({:?})", pad, text)?,
                    Step::EvalCode { code, .. } => writeln!(f, "{}; {}", pad, code.trim())?,
                    Step::EmitEscaped { expr, .. } => writeln!(f, "{}; emit(escape({}))", pad, expr)?,
                    Step::EmitRaw { expr, .. } => writeln!(f, "{}; emit({})", pad, expr)?,
                    Step::MarkLine(at) => writeln!(f, "    ; line = {}:{}", at.file, at.line)?,
                }
            }
            Ok(())
        }

        write_steps(f, &self.body, 0)?;
        writeln!(f, "{}; finish()", "  ".repeat(self.deferred))?;
        write_steps(f, &self.tail, self.deferred)
    }
}

/// Normalize linebreaks and slurp horizontal whitespace around trim markers
pub fn preprocess(text: &str, delimiter: char) -> Result<String> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let d = regex::escape(&delimiter.to_string());

    let before_open = Regex::new(&format!("[ \\t]*<{}_", d))
        .map_err(|e| Error::config(format!("invalid delimiter {:?}: {}", delimiter, e)))?;
    let after_close = Regex::new(&format!("_{}>[ \\t]*", d))
        .map_err(|e| Error::config(format!("invalid delimiter {:?}: {}", delimiter, e)))?;

    let open = format!("<{}_", delimiter);
    let close = format!("_{}>", delimiter);
    let text = before_open.replace_all(&text, regex::NoExpand(&open));
    let text = after_close.replace_all(&text, regex::NoExpand(&close));
    Ok(text.into_owned())
}

/// Per-compile mutable state
pub struct Generator<'o> {
    options: &'o CompileOptions,
    tokenizer: Tokenizer,
    mode: Mode,
    truncate: bool,
    current_line: usize,
    generated: Generated,
    /// Files currently being expanded through directive includes
    chain: Vec<PathBuf>,
}

impl<'o> Generator<'o> {
    pub fn new(options: &'o CompileOptions) -> Result<Self> {
        let chain = options.filename.iter().cloned().collect();
        Self::with_chain(options, chain)
    }

    fn with_chain(options: &'o CompileOptions, chain: Vec<PathBuf>) -> Result<Self> {
        Ok(Self {
            options,
            tokenizer: Tokenizer::new(options.delimiter)?,
            mode: Mode::None,
            truncate: false,
            current_line: 1,
            generated: Generated::default(),
            chain,
        })
    }

    fn origin(&self) -> Origin {
        Origin::new(0, self.current_line)
    }

    /// Generate the step buffers for raw template `text`
    pub fn generate(mut self, text: &str) -> Result<Generated> {
        let text = preprocess(text, self.options.delimiter)?;
        let tokens = self.tokenizer.tokenize(&text);
        let d = self.tokenizer.delimiter();

        for (index, token) in tokens.iter().enumerate() {
            if let Token::Marker(marker) = token {
                if marker.is_open() && !Self::is_closed(&tokens, index) {
                    return Err(Error::UnmatchedTag(marker.text(d)));
                }
            }

            if let Token::Text(chunk) = token {
                let opened_by = index
                    .checked_sub(1)
                    .and_then(|i| tokens.get(i))
                    .and_then(Token::marker);
                if matches!(
                    opened_by,
                    Some(Marker::Eval | Marker::TrimEval | Marker::Raw)
                ) {
                    if let Some(caps) = INCLUDE_DIRECTIVE.captures(chunk) {
                        self.splice_include(&caps[1])?;
                        self.count_lines(token.newlines());
                        continue;
                    }
                }
            }

            self.scan(token, d);
        }

        let Generator {
            options,
            mut generated,
            ..
        } = self;
        generated.files.insert(
            0,
            SourceFile {
                path: options.filename.clone(),
                text,
            },
        );
        Ok(generated)
    }

    /// An opener must be followed by its closer, directly or after one chunk
    fn is_closed(tokens: &[Token<'_>], index: usize) -> bool {
        let is_close = |i: usize| {
            tokens
                .get(i)
                .and_then(Token::marker)
                .is_some_and(Marker::is_close)
        };
        is_close(index + 1) || is_close(index + 2)
    }

    fn count_lines(&mut self, newlines: usize) {
        if newlines == 0 {
            return;
        }
        self.current_line += newlines;
        if self.options.compile_debug {
            let at = self.origin();
            self.generated.body.push(Step::MarkLine(at));
        }
    }

    fn scan(&mut self, token: &Token<'_>, d: char) {
        match token {
            Token::Marker(Marker::Eval | Marker::TrimEval) => self.mode = Mode::Eval,
            Token::Marker(Marker::Escaped) => self.mode = Mode::Escaped,
            Token::Marker(Marker::Raw) => self.mode = Mode::Raw,
            Token::Marker(Marker::Comment) => self.mode = Mode::Comment,
            Token::Marker(Marker::Literal) => {
                self.mode = Mode::Literal;
                self.push_literal(format!("<{}", d));
            }
            Token::Marker(close) => {
                if self.mode == Mode::Literal {
                    self.add_output(&close.text(d));
                }
                self.mode = Mode::None;
                self.truncate = matches!(close, Marker::SlurpClose | Marker::TrimClose);
            }
            Token::Text(chunk) => match self.mode {
                Mode::Eval => self.add_code(chunk),
                Mode::Escaped => {
                    let at = self.origin();
                    self.generated.body.push(Step::EmitEscaped {
                        expr: strip_expression(chunk),
                        at,
                    });
                }
                Mode::Raw => {
                    let at = self.origin();
                    self.generated.body.push(Step::EmitRaw {
                        expr: strip_expression(chunk),
                        at,
                    });
                }
                Mode::Comment => {}
                Mode::Literal | Mode::None => self.add_output(chunk),
            },
        }

        self.count_lines(token.newlines());
    }

    fn add_output(&mut self, chunk: &str) {
        let mut chunk = chunk;
        if self.truncate {
            chunk = chunk.strip_prefix('\n').unwrap_or(chunk);
            self.truncate = false;
        }
        if chunk.is_empty() {
            return;
        }
        self.push_literal(chunk.to_string());
    }

    fn push_literal(&mut self, text: String) {
        if let Some(Step::EmitLiteral(previous)) = self.generated.body.last_mut() {
            previous.push_str(&text);
        } else {
            self.generated.body.push(Step::EmitLiteral(text));
        }
    }

    /// Eval code: split at the first `done(...)`, deferring the rest to the tail
    fn add_code(&mut self, code: &str) {
        let at = self.origin();

        let Some(call) = DONE_CALL.find(code) else {
            self.generated.body.push(Step::EvalCode {
                code: code.to_string(),
                at,
            });
            return;
        };

        let (prefix, suffix) = code.split_at(call.end());
        if DONE_CALL.is_match(suffix) {
            warn!(
                "Multiple done() calls in one code block at line {}; only the first one defers",
                at.line
            );
        }

        self.generated.body.push(Step::EvalCode {
            code: prefix.to_string(),
            at,
        });
        let suffix_at = Origin::new(at.file, at.line + prefix.matches('\n').count());
        self.generated.tail.insert(
            0,
            Step::EvalCode {
                code: suffix.to_string(),
                at: suffix_at,
            },
        );
        self.generated.deferred += 1;
    }

    /// Directive include: compile the target and splice its steps in place
    fn splice_include(&mut self, raw_path: &str) -> Result<()> {
        let parent = self
            .options
            .filename
            .clone()
            .ok_or(Error::MissingOption("`include` requires the 'filename' option."))?;
        let name = include::unquote(raw_path);
        let path = include::resolve_include(name, &parent, &self.options.extension);

        if self.chain.contains(&path) {
            return Err(Error::IncludeCycle(path.display().to_string()));
        }

        let text = include::read_template(&path).map_err(|source| Error::IncludeNotFound {
            path: name.to_string(),
            parent: parent.display().to_string(),
            source,
        })?;
        debug!("Inlining {:?} into {:?}", path, parent);

        let mut options = self.options.clone();
        options.filename = Some(path.clone());
        let mut chain = self.chain.clone();
        chain.push(path);
        let included = Generator::with_chain(&options, chain)?.generate(&text)?;

        let offset = self.generated.files.len() + 1;
        self.generated.files.extend(included.files);
        self.generated
            .body
            .extend(included.body.into_iter().map(|s| s.relocate(offset)));
        self.generated.tail.splice(
            0..0,
            included.tail.into_iter().map(|s| s.relocate(offset)),
        );
        self.generated.deferred += included.deferred;

        if self.options.compile_debug {
            let at = self.origin();
            self.generated.body.push(Step::MarkLine(at));
        }
        Ok(())
    }
}

/// Escaped/raw tag content: trailing `;` removed and trimmed
fn strip_expression(chunk: &str) -> String {
    let trimmed = chunk.trim_end();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim().to_string()
}

/// Run the generator over `text` with `options`
pub fn generate(text: &str, options: &CompileOptions) -> Result<Generated> {
    Generator::new(options)?.generate(text)
}
