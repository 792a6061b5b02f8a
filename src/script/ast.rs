use super::value::Value;
use crate::generator::{Origin, SourceFile};

/// Expressions of the embedded template language
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    This,
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),

    /// `object.property`
    Member {
        object: Box<Expr>,
        property: String,
    },

    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },

    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },

    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Short-circuiting `&&`, `||` and `??`
    Logical {
        left: Box<Expr>,
        op: LogicalOperator,
        right: Box<Expr>,
    },

    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    /// `target = value`, or a compound form such as `+=` when `op` is set
    Assign {
        target: Box<Expr>,
        op: Option<BinaryOperator>,
        value: Box<Expr>,
    },

    /// `++x`, `x++`, `--x`, `x--`
    Update {
        target: Box<Expr>,
        increment: bool,
        prefix: bool,
    },

    Typeof(Box<Expr>),
}

impl Expr {
    /// Whether the expression can be assigned to
    pub fn is_place(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    // Comparison
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicalOperator {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

/// Statements, including the output steps produced from template text
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Empty,
    Expr(Expr),
    Declare {
        kind: DeclKind,
        bindings: Vec<(String, Option<Expr>)>,
    },
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    /// `for (x of items)`
    ForOf {
        kind: Option<DeclKind>,
        binding: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    /// `for (k in object)`
    ForIn {
        kind: Option<DeclKind>,
        binding: String,
        object: Expr,
        body: Box<Stmt>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,

    /// Literal template text
    Text(String),
    /// Expression output, passed through the escaping function when `escape`
    Output { expr: Expr, escape: bool },
    /// Current template position, for diagnostics
    Line(Origin),
    /// End of the body: the output is complete once this runs
    Finish,
}

/// A realized template: one statement list plus the sources it came from
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub files: Vec<SourceFile>,
}

impl Program {
    pub fn source(&self, file: usize) -> Option<&SourceFile> {
        self.files.get(file)
    }
}
