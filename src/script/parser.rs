use super::ast::{BinaryOperator, DeclKind, Expr, LogicalOperator, Program, Stmt, UnaryOperator};
use super::lexer::{Lexer, TokenKind};
use super::value::Value;
use super::SyntaxError;
use crate::error::{Error, Result};
use crate::generator::{Generated, Origin, Step};

/// One entry of the realized instruction stream
#[derive(Debug, Clone)]
enum Item {
    Code(TokenKind),
    Text(String),
    Output { expr: Expr, escape: bool },
    Line(Origin),
    Finish,
    Eof,
}

#[derive(Debug, Clone)]
struct Entry {
    item: Item,
    file: usize,
    line: usize,
}

/// Turn generated body and tail steps into one executable program
///
/// The body, a finish marker and the tail are parsed as a single statement
/// list, so a block opened before a `done(...)` split may close in the tail.
pub fn realize(generated: &Generated) -> Result<Program> {
    let mut entries = Vec::new();
    let mut last = Origin::new(0, 1);

    let to_error = |err: SyntaxError| {
        let path = generated
            .files
            .get(err.file)
            .and_then(|source| source.path.as_deref());
        Error::syntax(err.to_string(), path)
    };

    push_steps(&mut entries, &generated.body, &mut last).map_err(to_error)?;
    entries.push(Entry {
        item: Item::Finish,
        file: last.file,
        line: last.line,
    });
    push_steps(&mut entries, &generated.tail, &mut last).map_err(to_error)?;
    entries.push(Entry {
        item: Item::Eof,
        file: last.file,
        line: last.line,
    });

    let statements = Parser::new(entries).parse_program().map_err(to_error)?;
    Ok(Program {
        statements,
        files: generated.files.clone(),
    })
}

fn lex(code: &str, at: Origin) -> std::result::Result<Vec<Entry>, SyntaxError> {
    let tokens = Lexer::new(code, at.line)
        .tokenize()
        .map_err(|e| e.in_file(at.file))?;
    Ok(tokens
        .into_iter()
        .map(|token| Entry {
            item: Item::Code(token.kind),
            file: at.file,
            line: token.line,
        })
        .collect())
}

fn push_steps(
    entries: &mut Vec<Entry>,
    steps: &[Step],
    last: &mut Origin,
) -> std::result::Result<(), SyntaxError> {
    for step in steps {
        match step {
            Step::EmitLiteral(text) => entries.push(Entry {
                item: Item::Text(text.clone()),
                file: last.file,
                line: last.line,
            }),
            Step::EvalCode { code, at } => {
                *last = *at;
                entries.extend(lex(code, *at)?);
            }
            Step::EmitEscaped { expr, at } | Step::EmitRaw { expr, at } => {
                *last = *at;
                let escape = matches!(step, Step::EmitEscaped { .. });
                let mut tokens = lex(expr, *at)?;
                let expr = if tokens.is_empty() {
                    Expr::Literal(Value::Undefined)
                } else {
                    tokens.push(Entry {
                        item: Item::Eof,
                        file: at.file,
                        line: at.line,
                    });
                    Parser::new(tokens).parse_output_expression()?
                };
                entries.push(Entry {
                    item: Item::Output { expr, escape },
                    file: at.file,
                    line: at.line,
                });
            }
            Step::MarkLine(at) => {
                *last = *at;
                entries.push(Entry {
                    item: Item::Line(*at),
                    file: at.file,
                    line: at.line,
                });
            }
        }
    }
    Ok(())
}

type ParseResult<T> = std::result::Result<T, SyntaxError>;

/// Recursive-descent parser over the realized instruction stream
struct Parser {
    entries: Vec<Entry>,
    position: usize,
    /// Loops enclosing the statement being parsed
    loop_depth: usize,
}

impl Parser {
    fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            position: 0,
            loop_depth: 0,
        }
    }

    fn current(&self) -> &Entry {
        // The stream always ends with an Eof entry and position never passes it.
        &self.entries[self.position.min(self.entries.len() - 1)]
    }

    fn kind(&self) -> Option<&TokenKind> {
        self.kind_at(0)
    }

    fn kind_at(&self, offset: usize) -> Option<&TokenKind> {
        match self.entries.get(self.position + offset).map(|e| &e.item) {
            Some(Item::Code(kind)) => Some(kind),
            _ => None,
        }
    }

    fn advance(&mut self) {
        if self.position + 1 < self.entries.len() {
            self.position += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.kind() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let entry = self.current();
        SyntaxError::new(message, entry.line).in_file(entry.file)
    }

    fn unexpected(&self) -> SyntaxError {
        match &self.current().item {
            Item::Code(kind) => self.error(format!("Unexpected token '{}'", kind)),
            _ => self.error("Unexpected end of input"),
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.kind() {
            Some(TokenKind::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_program(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !matches!(self.current().item, Item::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    /// A lone expression filling an output tag
    fn parse_output_expression(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_expression()?;
        if !matches!(self.current().item, Item::Eof) {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let item = self.current().item.clone();
        let kind = match item {
            Item::Text(text) => {
                self.advance();
                return Ok(Stmt::Text(text));
            }
            Item::Output { expr, escape } => {
                self.advance();
                return Ok(Stmt::Output { expr, escape });
            }
            Item::Line(origin) => {
                self.advance();
                return Ok(Stmt::Line(origin));
            }
            Item::Finish => {
                self.advance();
                return Ok(Stmt::Finish);
            }
            Item::Eof => return Err(self.error("Unexpected end of input")),
            Item::Code(kind) => kind,
        };

        match kind {
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::Empty)
            }
            TokenKind::LBrace => self.parse_block(),
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let declaration = self.parse_declaration()?;
                self.eat(&TokenKind::Semicolon);
                Ok(declaration)
            }
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Break => {
                if self.loop_depth == 0 {
                    return Err(self.error("Illegal break statement"));
                }
                self.advance();
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::Break)
            }
            TokenKind::Continue => {
                if self.loop_depth == 0 {
                    return Err(self.error(
                        "Illegal continue statement: no surrounding iteration statement",
                    ));
                }
                self.advance();
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::Continue)
            }
            _ => {
                let expr = self.parse_expression()?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_block(&mut self) -> ParseResult<Stmt> {
        self.expect(&TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if matches!(self.current().item, Item::Eof) {
                return Err(self.error("Unexpected end of input"));
            }
            statements.push(self.parse_statement()?);
        }
        self.advance();
        Ok(Stmt::Block(statements))
    }

    fn decl_kind(&self) -> Option<DeclKind> {
        match self.kind() {
            Some(TokenKind::Var) => Some(DeclKind::Var),
            Some(TokenKind::Let) => Some(DeclKind::Let),
            Some(TokenKind::Const) => Some(DeclKind::Const),
            _ => None,
        }
    }

    fn parse_declaration(&mut self) -> ParseResult<Stmt> {
        let kind = self.decl_kind().ok_or_else(|| self.unexpected())?;
        self.advance();

        let mut bindings = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            bindings.push((name, init));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        Ok(Stmt::Declare { kind, bindings })
    }

    fn parse_condition(&mut self) -> ParseResult<Expr> {
        self.expect(&TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        Ok(condition)
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let condition = self.parse_condition()?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let condition = self.parse_condition()?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_loop_body(&mut self) -> ParseResult<Box<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body.map(Box::new)
    }

    fn is_of(kind: Option<&TokenKind>) -> bool {
        matches!(kind, Some(TokenKind::Ident(word)) if word == "of")
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        self.advance();
        self.expect(&TokenKind::LParen)?;

        // for ([var] x of items) / for ([var] k in object)
        let offset = usize::from(self.decl_kind().is_some());
        if let Some(TokenKind::Ident(_)) = self.kind_at(offset) {
            let next = self.kind_at(offset + 1);
            let is_of = Self::is_of(next);
            if is_of || next == Some(&TokenKind::In) {
                let kind = self.decl_kind();
                if kind.is_some() {
                    self.advance();
                }
                let binding = self.expect_ident()?;
                self.advance(); // of / in
                let subject = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_loop_body()?;
                return Ok(if is_of {
                    Stmt::ForOf {
                        kind,
                        binding,
                        iterable: subject,
                        body,
                    }
                } else {
                    Stmt::ForIn {
                        kind,
                        binding,
                        object: subject,
                        body,
                    }
                });
            }
        }

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if self.decl_kind().is_some() {
            Some(Box::new(self.parse_declaration()?))
        } else {
            Some(Box::new(Stmt::Expr(self.parse_expression()?)))
        };
        self.expect(&TokenKind::Semicolon)?;

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RParen)?;

        let body = self.parse_loop_body()?;
        Ok(Stmt::For {
            init,
            condition,
            update,
            body,
        })
    }

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let target = self.parse_ternary()?;

        let op = match self.kind() {
            Some(TokenKind::Assign) => None,
            Some(TokenKind::PlusAssign) => Some(BinaryOperator::Add),
            Some(TokenKind::MinusAssign) => Some(BinaryOperator::Subtract),
            Some(TokenKind::StarAssign) => Some(BinaryOperator::Multiply),
            Some(TokenKind::SlashAssign) => Some(BinaryOperator::Divide),
            _ => return Ok(target),
        };

        if !target.is_place() {
            return Err(self.error("Invalid left-hand side in assignment"));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            target: Box::new(target),
            op,
            value: Box::new(value),
        })
    }

    fn parse_ternary(&mut self) -> ParseResult<Expr> {
        let condition = self.parse_or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }
        let then_expr = self.parse_assignment()?;
        self.expect(&TokenKind::Colon)?;
        let else_expr = self.parse_assignment()?;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        loop {
            let op = match self.kind() {
                Some(TokenKind::OrOr) => LogicalOperator::Or,
                Some(TokenKind::Nullish) => LogicalOperator::Nullish,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Logical {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.parse_equality()?;
            left = Expr::Logical {
                left: Box::new(left),
                op: LogicalOperator::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Left-associative binary level driven by an operator table
    fn parse_binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOperator)],
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in operators {
                if self.check(token) {
                    self.advance();
                    let right = next(self)?;
                    left = Expr::Binary {
                        left: Box::new(left),
                        op: *op,
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Eq, BinaryOperator::Equal),
                (TokenKind::NotEq, BinaryOperator::NotEqual),
                (TokenKind::StrictEq, BinaryOperator::StrictEqual),
                (TokenKind::StrictNotEq, BinaryOperator::StrictNotEqual),
            ],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Lt, BinaryOperator::LessThan),
                (TokenKind::Le, BinaryOperator::LessThanOrEqual),
                (TokenKind::Gt, BinaryOperator::GreaterThan),
                (TokenKind::Ge, BinaryOperator::GreaterThanOrEqual),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Plus, BinaryOperator::Add),
                (TokenKind::Minus, BinaryOperator::Subtract),
            ],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Star, BinaryOperator::Multiply),
                (TokenKind::Slash, BinaryOperator::Divide),
                (TokenKind::Percent, BinaryOperator::Modulo),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.kind() {
            Some(TokenKind::Bang) => UnaryOperator::Not,
            Some(TokenKind::Minus) => UnaryOperator::Minus,
            Some(TokenKind::Plus) => UnaryOperator::Plus,
            Some(TokenKind::Typeof) => {
                self.advance();
                return Ok(Expr::Typeof(Box::new(self.parse_unary()?)));
            }
            Some(TokenKind::PlusPlus) | Some(TokenKind::MinusMinus) => {
                let increment = self.check(&TokenKind::PlusPlus);
                self.advance();
                let target = self.parse_unary()?;
                if !target.is_place() {
                    return Err(self.error("Invalid left-hand side expression in prefix operation"));
                }
                return Ok(Expr::Update {
                    target: Box::new(target),
                    increment,
                    prefix: true,
                });
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_call_member()?;
        let increment = match self.kind() {
            Some(TokenKind::PlusPlus) => true,
            Some(TokenKind::MinusMinus) => false,
            _ => return Ok(expr),
        };
        if !expr.is_place() {
            return Ok(expr);
        }
        self.advance();
        Ok(Expr::Update {
            target: Box::new(expr),
            increment,
            prefix: false,
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_assignment()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_call_member(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.kind() {
                Some(TokenKind::Dot) => {
                    self.advance();
                    let property = self
                        .kind()
                        .and_then(property_name)
                        .ok_or_else(|| self.unexpected())?;
                    self.advance();
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                    };
                }
                Some(TokenKind::LBracket) => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(TokenKind::LParen) => {
                    self.advance();
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let kind = self.kind().cloned().ok_or_else(|| self.unexpected())?;
        let expr = match kind {
            TokenKind::Number(n) => Expr::Literal(Value::Number(n)),
            TokenKind::Str(s) => Expr::Literal(Value::String(s)),
            TokenKind::True => Expr::Literal(Value::Bool(true)),
            TokenKind::False => Expr::Literal(Value::Bool(false)),
            TokenKind::Null => Expr::Literal(Value::Null),
            TokenKind::Undefined => Expr::Literal(Value::Undefined),
            TokenKind::This => Expr::This,
            TokenKind::Ident(name) => Expr::Ident(name),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => return self.parse_array(),
            TokenKind::LBrace => return self.parse_object(),
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_array(&mut self) -> ParseResult<Expr> {
        self.expect(&TokenKind::LBracket)?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            items.push(self.parse_assignment()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::Array(items))
    }

    fn parse_object(&mut self) -> ParseResult<Expr> {
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let kind = self.kind().cloned().ok_or_else(|| self.unexpected())?;
            let key = match &kind {
                TokenKind::Str(s) => s.clone(),
                TokenKind::Number(n) => super::value::format_number(*n),
                other => property_name(other).ok_or_else(|| self.unexpected())?,
            };
            self.advance();

            let value = if self.eat(&TokenKind::Colon) {
                self.parse_assignment()?
            } else if matches!(kind, TokenKind::Ident(_)) {
                Expr::Ident(key.clone())
            } else {
                return Err(self.unexpected());
            };
            fields.push((key, value));

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::Object(fields))
    }
}

/// Identifiers and keywords are both valid after `.` and as object keys
fn property_name(kind: &TokenKind) -> Option<String> {
    let name = match kind {
        TokenKind::Ident(name) => return Some(name.clone()),
        TokenKind::Var => "var",
        TokenKind::Let => "let",
        TokenKind::Const => "const",
        TokenKind::If => "if",
        TokenKind::Else => "else",
        TokenKind::For => "for",
        TokenKind::While => "while",
        TokenKind::In => "in",
        TokenKind::Break => "break",
        TokenKind::Continue => "continue",
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::Null => "null",
        TokenKind::Undefined => "undefined",
        TokenKind::This => "this",
        TokenKind::Typeof => "typeof",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use crate::options::CompileOptions;

    fn program(text: &str) -> Program {
        let options = CompileOptions::default().with_compile_debug(false);
        realize(&generate(text, &options).unwrap()).unwrap()
    }

    #[test]
    fn test_text_and_output() {
        let program = program("Hi <%= name %>!");
        assert_eq!(
            program.statements,
            vec![
                Stmt::Text("Hi ".into()),
                Stmt::Output {
                    expr: Expr::Ident("name".into()),
                    escape: true
                },
                Stmt::Text("!".into()),
                Stmt::Finish,
            ]
        );
    }

    #[test]
    fn test_block_spans_tags() {
        let program = program("<% if (a) { %>yes<% } else { %>no<% } %>");
        match &program.statements[0] {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                assert_eq!(**then_branch, Stmt::Block(vec![Stmt::Text("yes".into())]));
                assert!(else_branch.is_some());
            }
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_finish_lands_inside_deferred_block() {
        let program = program("<% if (ready) { done(); } %>A");
        match &program.statements[0] {
            Stmt::If { then_branch, .. } => match &**then_branch {
                Stmt::Block(statements) => {
                    assert!(statements.contains(&Stmt::Finish));
                }
                other => panic!("Expected block, got {:?}", other),
            },
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let program = program("<%= 1 + 2 * 3 > 6 && !done %>");
        match &program.statements[0] {
            Stmt::Output {
                expr: Expr::Logical { op, left, .. },
                ..
            } => {
                assert_eq!(*op, LogicalOperator::And);
                assert!(matches!(
                    **left,
                    Expr::Binary {
                        op: BinaryOperator::GreaterThan,
                        ..
                    }
                ));
            }
            other => panic!("Expected logical and, got {:?}", other),
        }
    }

    #[test]
    fn test_for_variants() {
        let program = program(
            "<% for (var i = 0; i < 3; i++) { } for (const x of xs) {} for (k in obj) {} %>",
        );
        assert!(matches!(program.statements[0], Stmt::For { .. }));
        assert!(matches!(
            program.statements[1],
            Stmt::ForOf {
                kind: Some(DeclKind::Const),
                ..
            }
        ));
        assert!(matches!(program.statements[2], Stmt::ForIn { kind: None, .. }));
    }

    #[test]
    fn test_object_literal_in_call() {
        let program = program("<%- include(\"partial\", {name: \"Bo\", age, 'x-y': 1}) %>");
        match &program.statements[0] {
            Stmt::Output {
                expr: Expr::Call { args, .. },
                escape: false,
            } => match &args[1] {
                Expr::Object(fields) => {
                    let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
                    assert_eq!(keys, vec!["name", "age", "x-y"]);
                }
                other => panic!("Expected object, got {:?}", other),
            },
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_block_is_syntax_error() {
        let options = CompileOptions::default().with_filename("views/broken.pjs");
        let generated = generate("<% if (a) { %>x", &options).unwrap();
        let err = realize(&generated).unwrap_err();
        match err {
            Error::Syntax { filename, message } => {
                assert_eq!(filename, "views/broken.pjs");
                assert!(message.contains("Unexpected end of input"));
            }
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let generated = generate("<% 1 = 2 %>", &CompileOptions::default()).unwrap();
        assert!(matches!(realize(&generated), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_break_outside_loop_is_syntax_error() {
        let generated = generate("a<% break %>b", &CompileOptions::default()).unwrap();
        match realize(&generated) {
            Err(Error::Syntax { message, .. }) => {
                assert!(message.contains("Illegal break statement"))
            }
            other => panic!("Expected syntax error, got {:?}", other),
        }

        let generated = generate("<% if (a) { continue; } %>", &CompileOptions::default()).unwrap();
        assert!(matches!(realize(&generated), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_break_inside_loop_spanning_tags() {
        let program = program("<% while (true) { %>x<% if (a) { break; } continue; } %>after");
        assert!(matches!(program.statements[0], Stmt::While { .. }));

        let generated = generate("<% for (;;) {} break; %>", &CompileOptions::default()).unwrap();
        assert!(realize(&generated).is_err());
    }

    #[test]
    fn test_trailing_tokens_in_output_tag() {
        let generated = generate("<%= a b %>", &CompileOptions::default()).unwrap();
        assert!(realize(&generated).is_err());
    }
}
