use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;

/// Tag markers recognised by the tokenizer, independent of the delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `<%`
    Eval,
    /// `<%_`
    TrimEval,
    /// `<%=`
    Escaped,
    /// `<%-`
    Raw,
    /// `<%#`
    Comment,
    /// `<%%`
    Literal,
    /// `%>`
    Close,
    /// `-%>`
    SlurpClose,
    /// `_%>`
    TrimClose,
}

impl Marker {
    /// Openers that must be followed by a closing marker
    pub fn is_open(self) -> bool {
        matches!(
            self,
            Marker::Eval | Marker::TrimEval | Marker::Escaped | Marker::Raw | Marker::Comment
        )
    }

    pub fn is_close(self) -> bool {
        matches!(self, Marker::Close | Marker::SlurpClose | Marker::TrimClose)
    }

    /// Render the marker text for a given delimiter
    pub fn text(self, delimiter: char) -> String {
        match self {
            Marker::Eval => format!("<{}", delimiter),
            Marker::TrimEval => format!("<{}_", delimiter),
            Marker::Escaped => format!("<{}=", delimiter),
            Marker::Raw => format!("<{}-", delimiter),
            Marker::Comment => format!("<{}#", delimiter),
            Marker::Literal => format!("<{}{}", delimiter, delimiter),
            Marker::Close => format!("{}>", delimiter),
            Marker::SlurpClose => format!("-{}>", delimiter),
            Marker::TrimClose => format!("_{}>", delimiter),
        }
    }

    fn from_match(text: &str, delimiter: char) -> Option<Self> {
        let mut chars = text.chars();
        let first = chars.next()?;
        let rest: String = chars.collect();
        if first == '<' {
            let mut rest = rest.chars();
            if rest.next()? != delimiter {
                return None;
            }
            return match rest.next() {
                None => Some(Marker::Eval),
                Some('_') => Some(Marker::TrimEval),
                Some('=') => Some(Marker::Escaped),
                Some('-') => Some(Marker::Raw),
                Some('#') => Some(Marker::Comment),
                Some(c) if c == delimiter => Some(Marker::Literal),
                Some(_) => None,
            };
        }
        match first {
            '-' => Some(Marker::SlurpClose),
            '_' => Some(Marker::TrimClose),
            c if c == delimiter => Some(Marker::Close),
            _ => None,
        }
    }
}

/// A single entry in the tokenized template
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Text(&'a str),
    Marker(Marker),
}

impl<'a> Token<'a> {
    pub fn marker(&self) -> Option<Marker> {
        match self {
            Token::Marker(m) => Some(*m),
            Token::Text(_) => None,
        }
    }

    /// Number of linebreaks the token spans
    pub fn newlines(&self) -> usize {
        match self {
            Token::Text(text) => text.matches('\n').count(),
            Token::Marker(_) => 0,
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Text(text) => write!(f, "{:?}", text),
            Token::Marker(m) => write!(f, "{:?}", m),
        }
    }
}

/// Splits template text on the tag markers built from a delimiter
pub struct Tokenizer {
    delimiter: char,
    pattern: Regex,
}

impl Tokenizer {
    pub fn new(delimiter: char) -> Result<Self> {
        let d = regex::escape(&delimiter.to_string());
        // Longer openers first: the regex alternation is leftmost-first.
        let source = format!(
            "(<{d}{d}|<{d}=|<{d}-|<{d}_|<{d}#|<{d}|{d}>|-{d}>|_{d}>)",
            d = d
        );
        let pattern = Regex::new(&source)
            .map_err(|e| Error::config(format!("invalid delimiter {:?}: {}", delimiter, e)))?;
        Ok(Self { delimiter, pattern })
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Produce the flat ordered token sequence for `text`
    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<Token<'a>> {
        let mut tokens = Vec::new();
        let mut last = 0;

        for found in self.pattern.find_iter(text) {
            if found.start() > last {
                tokens.push(Token::Text(&text[last..found.start()]));
            }
            match Marker::from_match(found.as_str(), self.delimiter) {
                Some(marker) => tokens.push(Token::Marker(marker)),
                None => tokens.push(Token::Text(found.as_str())),
            }
            last = found.end();
        }

        if last < text.len() {
            tokens.push(Token::Text(&text[last..]));
        }

        tokens
    }
}
