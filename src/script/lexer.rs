use super::SyntaxError;
use std::fmt;

/// Token types for embedded template code
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    Str(String),
    Ident(String),

    // Keywords
    Var,
    Let,
    Const,
    If,
    Else,
    For,
    While,
    In,
    Break,
    Continue,
    True,
    False,
    Null,
    Undefined,
    This,
    Typeof,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Question,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PlusPlus,
    MinusMinus,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Self { kind, line }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Str(s) => write!(f, "{:?}", s),
            TokenKind::Ident(name) => write!(f, "{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Lexer for code found between template tags
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
    line: usize,
}

impl Lexer {
    /// `line` is the template line the code chunk starts on
    pub fn new(input: &str, line: usize) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
            line,
        }
    }

    fn advance(&mut self) {
        if self.current_char == Some('\n') {
            self.line += 1;
        }
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line)
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match (self.current_char, self.peek()) {
                (Some(ch), _) if ch.is_whitespace() => self.advance(),
                (Some('/'), Some('/')) => {
                    while let Some(ch) = self.current_char {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    self.advance();
                    self.advance();
                    loop {
                        match (self.current_char, self.peek()) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(_), _) => self.advance(),
                            (None, _) => return Err(self.error("Unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_number(&mut self) -> Result<TokenKind, SyntaxError> {
        let mut text = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() || ch == '.' || ch == '_' {
                if ch != '_' {
                    text.push(ch);
                }
                self.advance();
            } else if (ch == 'e' || ch == 'E') && !text.contains('e') {
                text.push('e');
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.current_char {
                    text.push(sign);
                    self.advance();
                }
            } else {
                break;
            }
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.error(format!("Invalid number literal '{}'", text)))
    }

    fn read_string(&mut self, quote: char) -> Result<TokenKind, SyntaxError> {
        self.advance(); // opening quote
        let mut result = String::new();

        loop {
            match self.current_char {
                None | Some('\n') => return Err(self.error("Invalid or unexpected token")),
                Some(ch) if ch == quote => {
                    self.advance();
                    return Ok(TokenKind::Str(result));
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current_char {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(other) => other,
                        None => return Err(self.error("Invalid or unexpected token")),
                    };
                    result.push(escaped);
                    self.advance();
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match word.as_str() {
            "var" => TokenKind::Var,
            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "while" => TokenKind::While,
            "in" => TokenKind::In,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "undefined" => TokenKind::Undefined,
            "this" => TokenKind::This,
            "typeof" => TokenKind::Typeof,
            _ => TokenKind::Ident(word),
        }
    }

    /// Consume `next` if it is the current char
    fn eat(&mut self, next: char) -> bool {
        if self.current_char == Some(next) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn read_operator(&mut self, ch: char) -> Result<TokenKind, SyntaxError> {
        self.advance();
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '%' => TokenKind::Percent,
            '?' => {
                if self.eat('?') {
                    TokenKind::Nullish
                } else {
                    TokenKind::Question
                }
            }
            '+' => {
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.eat('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::StrictEq
                    } else {
                        TokenKind::Eq
                    }
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::StrictNotEq
                    } else {
                        TokenKind::NotEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' if self.eat('&') => TokenKind::AndAnd,
            '|' if self.eat('|') => TokenKind::OrOr,
            other => return Err(self.error(format!("Invalid or unexpected token '{}'", other))),
        };
        Ok(kind)
    }

    /// Tokenize the whole chunk
    pub fn tokenize(&mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;
            let line = self.line;
            let Some(ch) = self.current_char else {
                break;
            };

            let kind = if ch.is_ascii_digit()
                || (ch == '.' && self.peek().is_some_and(|c| c.is_ascii_digit()))
            {
                self.read_number()?
            } else if ch == '"' || ch == '\'' {
                self.read_string(ch)?
            } else if ch.is_alphabetic() || ch == '_' || ch == '$' {
                self.read_word()
            } else {
                self.read_operator(ch)?
            };

            tokens.push(Token::new(kind, line));
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input, 1)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_declaration() {
        assert_eq!(
            kinds("var name = \"Ann\";"),
            vec![
                TokenKind::Var,
                TokenKind::Ident("name".into()),
                TokenKind::Assign,
                TokenKind::Str("Ann".into()),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a === b !== c && d || e ?? f"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::StrictEq,
                TokenKind::Ident("b".into()),
                TokenKind::StrictNotEq,
                TokenKind::Ident("c".into()),
                TokenKind::AndAnd,
                TokenKind::Ident("d".into()),
                TokenKind::OrOr,
                TokenKind::Ident("e".into()),
                TokenKind::Nullish,
                TokenKind::Ident("f".into()),
            ]
        );
        assert_eq!(
            kinds("i++ <= 3.5"),
            vec![
                TokenKind::Ident("i".into()),
                TokenKind::PlusPlus,
                TokenKind::Le,
                TokenKind::Number(3.5),
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = Lexer::new("a // trailing\n/* block\n */ b", 4).tokenize().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].line, 4);
        assert_eq!(tokens[1].line, 6);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#"'it\'s\n'"#), vec![TokenKind::Str("it's\n".into())]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"open", 2).tokenize().unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_unknown_character() {
        assert!(Lexer::new("a # b", 1).tokenize().is_err());
    }
}
