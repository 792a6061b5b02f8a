//! Tree-walking interpreter for realized template programs

use super::ast::{BinaryOperator, DeclKind, Expr, LogicalOperator, Program, Stmt, UnaryOperator};
use super::value::{format_number, Value};
use super::NativeFn;
use crate::error::{Error, Result};
use crate::generator::Origin;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;

static INT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+-]?\d+").expect("Interpreter: Invalid integer prefix regex"));

static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?")
        .expect("Interpreter: Invalid float prefix regex")
});

/// Functions every template can call without registering them
const BUILTINS: &[&str] = &[
    "include",
    "done",
    "String",
    "Number",
    "parseInt",
    "parseFloat",
    "isNaN",
];

const NAMESPACES: &[&str] = &["JSON", "Math"];

/// Holes an index assignment may open past the end of an array
const MAX_ARRAY_GROWTH: usize = 1 << 16;

/// Services the rendering side provides to running template code
pub trait Host {
    /// Render the template `path` (relative to the current file) with the
    /// current data overlaid by `overrides`
    fn include(&self, path: &str, overrides: Option<&Value>) -> Result<String>;

    /// Escape the stringified output of an escaped tag
    fn escape(&self, text: &str) -> String;

    /// Host-registered function by name
    fn native(&self, name: &str) -> Option<&NativeFn>;
}

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    constant: bool,
}

impl Binding {
    fn new(value: Value, constant: bool) -> Self {
        Self { value, constant }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Scope indices: 0 holds data fields and implicit globals, 1 is the render
/// (`var`) scope, everything above is a block scope.
const GLOBAL_SCOPE: usize = 0;
const RENDER_SCOPE: usize = 1;

pub struct Interpreter<'h> {
    host: &'h dyn Host,
    scopes: Vec<HashMap<String, Binding>>,
    locals_name: String,
    locals: Value,
    this: Value,
    output: String,
    finished: Option<String>,
    position: Origin,
}

impl<'h> Interpreter<'h> {
    pub fn new(host: &'h dyn Host, data: &Value, locals_name: &str, this: Value) -> Self {
        let mut globals = HashMap::new();
        if let Value::Object(fields) = data {
            for (name, value) in fields {
                globals.insert(name.clone(), Binding::new(value.clone(), false));
            }
        }

        Self {
            host,
            scopes: vec![globals, HashMap::new()],
            locals_name: locals_name.to_string(),
            locals: data.clone(),
            this,
            output: String::new(),
            finished: None,
            position: Origin::new(0, 1),
        }
    }

    /// Last template position recorded by a line marker
    pub fn position(&self) -> Origin {
        self.position
    }

    /// Execute every statement of `program`
    pub fn run(&mut self, program: &Program) -> Result<()> {
        self.exec_list(&program.statements)?;
        Ok(())
    }

    /// Output as of the first finish point, or all output when none was reached
    pub fn into_output(self) -> String {
        self.finished.unwrap_or(self.output)
    }

    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scopes.push(HashMap::new());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn exec_list(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for statement in statements {
            let flow = self.exec(statement)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, statement: &Stmt) -> Result<Flow> {
        match statement {
            Stmt::Empty => {}
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Declare { kind, bindings } => {
                for (name, init) in bindings {
                    let value = match init {
                        Some(expr) => Some(self.eval(expr)?),
                        None => None,
                    };
                    self.declare(*kind, name, value);
                }
            }
            Stmt::Block(statements) => {
                return self.scoped(|this| this.exec_list(statements));
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition)?.is_truthy() {
                    return self.exec(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.exec(else_branch);
                }
            }
            Stmt::For {
                init,
                condition,
                update,
                body,
            } => {
                self.scoped(|this| {
                    if let Some(init) = init {
                        this.exec(init)?;
                    }
                    loop {
                        if let Some(condition) = condition {
                            if !this.eval(condition)?.is_truthy() {
                                break;
                            }
                        }
                        if this.exec(body)? == Flow::Break {
                            break;
                        }
                        if let Some(update) = update {
                            this.eval(update)?;
                        }
                    }
                    Ok(())
                })?;
            }
            Stmt::ForOf {
                kind,
                binding,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable)? {
                    Value::Array(items) => items,
                    Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                    other => {
                        return Err(Error::type_error(format!(
                            "{} is not iterable",
                            describe(iterable, &other)
                        )))
                    }
                };
                self.iterate(*kind, binding, items, body)?;
            }
            Stmt::ForIn {
                kind,
                binding,
                object,
                body,
            } => {
                let keys = match self.eval(object)? {
                    Value::Object(map) => map.keys().cloned().map(Value::String).collect(),
                    Value::Array(items) => (0..items.len())
                        .map(|i| Value::String(i.to_string()))
                        .collect(),
                    Value::String(s) => (0..s.chars().count())
                        .map(|i| Value::String(i.to_string()))
                        .collect(),
                    _ => Vec::new(),
                };
                self.iterate(*kind, binding, keys, body)?;
            }
            Stmt::While { condition, body } => {
                while self.eval(condition)?.is_truthy() {
                    if self.exec(body)? == Flow::Break {
                        break;
                    }
                }
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Text(text) => self.output.push_str(text),
            Stmt::Output { expr, escape } => {
                let text = self.eval(expr)?.to_output();
                if *escape {
                    let escaped = self.host.escape(&text);
                    self.output.push_str(&escaped);
                } else {
                    self.output.push_str(&text);
                }
            }
            Stmt::Line(origin) => self.position = *origin,
            Stmt::Finish => {
                if self.finished.is_none() {
                    self.finished = Some(self.output.clone());
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn iterate(
        &mut self,
        kind: Option<DeclKind>,
        binding: &str,
        items: Vec<Value>,
        body: &Stmt,
    ) -> Result<()> {
        for item in items {
            let flow = self.scoped(|this| {
                match kind {
                    Some(kind) => this.declare(kind, binding, Some(item)),
                    None => *this.binding_mut(binding, true)? = item,
                }
                this.exec(body)
            })?;
            if flow == Flow::Break {
                break;
            }
        }
        Ok(())
    }

    fn declare(&mut self, kind: DeclKind, name: &str, value: Option<Value>) {
        match kind {
            DeclKind::Var => {
                let scope = &mut self.scopes[RENDER_SCOPE];
                if let Some(existing) = scope.get_mut(name) {
                    // Redeclaring without an initializer keeps the value
                    if let Some(value) = value {
                        existing.value = value;
                    }
                } else {
                    scope.insert(
                        name.to_string(),
                        Binding::new(value.unwrap_or_default(), false),
                    );
                }
            }
            DeclKind::Let | DeclKind::Const => {
                let constant = kind == DeclKind::Const;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(
                        name.to_string(),
                        Binding::new(value.unwrap_or_default(), constant),
                    );
                }
            }
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        name == self.locals_name || self.scopes.iter().any(|scope| scope.contains_key(name))
    }

    fn is_callable(&self, name: &str) -> bool {
        BUILTINS.contains(&name) || self.host.native(name).is_some()
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .map(|binding| &binding.value)
            .or_else(|| (name == self.locals_name).then_some(&self.locals))
    }

    /// Mutable slot for an assignable name. A direct assignment to an unbound
    /// name creates an implicit global.
    fn binding_mut(&mut self, name: &str, direct: bool) -> Result<&mut Value> {
        if let Some(depth) = self.scopes.iter().rposition(|scope| scope.contains_key(name)) {
            let binding = self.scopes[depth]
                .get_mut(name)
                .ok_or_else(|| Error::UnboundName(name.to_string()))?;
            if direct && binding.constant {
                return Err(Error::type_error("Assignment to constant variable."));
            }
            return Ok(&mut binding.value);
        }
        if name == self.locals_name {
            return Ok(&mut self.locals);
        }
        if !direct {
            return Err(Error::UnboundName(name.to_string()));
        }
        Ok(&mut self.scopes[GLOBAL_SCOPE]
            .entry(name.to_string())
            .or_insert_with(|| Binding::new(Value::Undefined, false))
            .value)
    }

    fn place_mut(&mut self, target: &Expr, direct: bool) -> Result<&mut Value> {
        match target {
            Expr::Ident(name) => self.binding_mut(name, direct),
            Expr::This => Ok(&mut self.this),
            Expr::Member { object, property } => {
                let key = Value::String(property.clone());
                let container = self.place_mut(object, false)?;
                slot_mut(container, &key)
            }
            Expr::Index { object, index } => {
                let key = self.eval(index)?;
                let container = self.place_mut(object, false)?;
                slot_mut(container, &key)
            }
            _ => Err(Error::type_error("Invalid assignment target")),
        }
    }

    /// Borrow the value a plain access path names without cloning containers
    fn peek(&self, expr: &Expr) -> Option<&Value> {
        match expr {
            Expr::Ident(name) => self.lookup(name),
            Expr::This => Some(&self.this),
            Expr::Member { object, property } => match self.peek(object)? {
                Value::Object(map) => map.get(property),
                _ => None,
            },
            Expr::Index { object, index } => {
                let key = match &**index {
                    Expr::Literal(key) => key,
                    other => self.peek(other)?,
                };
                match (self.peek(object)?, key) {
                    (Value::Array(items), key) => as_index(key).and_then(|i| items.get(i)),
                    (Value::Object(map), key) => map.get(&property_key(key)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| Error::UnboundName(name.clone())),
            Expr::This => Ok(self.this.clone()),
            Expr::Array(items) => Ok(Value::Array(self.eval_args(items)?)),
            Expr::Object(fields) => {
                let mut map = IndexMap::new();
                for (key, value) in fields {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Member { object, property } => {
                if let Some(value) = self.peek(expr) {
                    return Ok(value.clone());
                }
                let target = self.eval(object)?;
                get_property(&target, &Value::String(property.clone()), object)
            }
            Expr::Index { object, index } => {
                if let Some(value) = self.peek(expr) {
                    return Ok(value.clone());
                }
                let target = self.eval(object)?;
                let key = self.eval(index)?;
                get_property(&target, &key, object)
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOperator::Not => Value::Bool(!value.is_truthy()),
                    UnaryOperator::Minus => Value::Number(-value.to_number()),
                    UnaryOperator::Plus => Value::Number(value.to_number()),
                })
            }
            Expr::Binary { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary_op(&left, *op, &right))
            }
            Expr::Logical { left, op, right } => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOperator::And => !left.is_truthy(),
                    LogicalOperator::Or => left.is_truthy(),
                    LogicalOperator::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then_expr)
                } else {
                    self.eval(else_expr)
                }
            }
            Expr::Assign { target, op, value } => {
                let value = match op {
                    Some(op) => {
                        let current = self.eval(target)?;
                        let operand = self.eval(value)?;
                        binary_op(&current, *op, &operand)
                    }
                    None => self.eval(value)?,
                };
                *self.place_mut(target, true)? = value.clone();
                Ok(value)
            }
            Expr::Update {
                target,
                increment,
                prefix,
            } => {
                let old = self.eval(target)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                *self.place_mut(target, true)? = Value::Number(new);
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Typeof(inner) => {
                if let Expr::Ident(name) = &**inner {
                    if !self.is_bound(name) {
                        let kind = if self.is_callable(name) {
                            "function"
                        } else if NAMESPACES.contains(&name.as_str()) {
                            "object"
                        } else {
                            "undefined"
                        };
                        return Ok(Value::String(kind.to_string()));
                    }
                }
                Ok(Value::String(self.eval(inner)?.type_name().to_string()))
            }
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value> {
        match callee {
            Expr::Ident(name) if !self.is_bound(name) => {
                let args = self.eval_args(args)?;
                self.call_function(name, &args)
            }
            Expr::Member { object, property } => {
                if let Expr::Ident(namespace) = &**object {
                    if NAMESPACES.contains(&namespace.as_str()) && !self.is_bound(namespace) {
                        let args = self.eval_args(args)?;
                        return call_namespace(namespace, property, &args);
                    }
                }

                if matches!(property.as_str(), "push" | "pop") && object.is_place() {
                    let args = self.eval_args(args)?;
                    let target = self.place_mut(object, false)?;
                    if let Value::Array(items) = target {
                        return Ok(mutate_array(items, property, args));
                    }
                    let receiver = target.clone();
                    return call_method(receiver, property, &args, object);
                }

                let receiver = self.eval(object)?;
                let args = self.eval_args(args)?;
                call_method(receiver, property, &args, object)
            }
            other => Err(Error::type_error(format!(
                "{} is not a function",
                expr_text(other)
            ))),
        }
    }

    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        if let Some(native) = self.host.native(name) {
            return native(args);
        }

        let first = args.first().cloned().unwrap_or_default();
        match name {
            "include" => {
                let path = first.to_string();
                let rendered = self.host.include(&path, args.get(1))?;
                Ok(Value::String(rendered))
            }
            "done" => Ok(Value::Undefined),
            "String" => Ok(Value::String(first.to_string())),
            "Number" => Ok(Value::Number(first.to_number())),
            "parseInt" => Ok(Value::Number(parse_prefix(&INT_PREFIX, &first, true))),
            "parseFloat" => Ok(Value::Number(parse_prefix(&FLOAT_PREFIX, &first, false))),
            "isNaN" => Ok(Value::Bool(first.to_number().is_nan())),
            _ => Err(Error::UnboundName(name.to_string())),
        }
    }
}

fn parse_prefix(pattern: &Regex, value: &Value, integer: bool) -> f64 {
    if let Value::Number(n) = value {
        return if integer { n.trunc() } else { *n };
    }
    pattern
        .find(&value.to_string())
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn call_namespace(namespace: &str, name: &str, args: &[Value]) -> Result<Value> {
    let first = args.first().cloned().unwrap_or_default();
    let number = first.to_number();
    let value = match (namespace, name) {
        ("JSON", "stringify") => {
            if first == Value::Undefined {
                Value::Undefined
            } else {
                Value::String(serde_json::to_string(&first.to_json())?)
            }
        }
        ("JSON", "parse") => {
            let json: serde_json::Value = serde_json::from_str(&first.to_string())?;
            Value::from_json(&json)
        }
        ("Math", "floor") => Value::Number(number.floor()),
        ("Math", "ceil") => Value::Number(number.ceil()),
        ("Math", "round") => Value::Number((number + 0.5).floor()),
        ("Math", "abs") => Value::Number(number.abs()),
        ("Math", "min") => Value::Number(fold_numbers(args, f64::INFINITY, f64::min)),
        ("Math", "max") => Value::Number(fold_numbers(args, f64::NEG_INFINITY, f64::max)),
        _ => {
            return Err(Error::type_error(format!(
                "{}.{} is not a function",
                namespace, name
            )))
        }
    };
    Ok(value)
}

fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for arg in args {
        let n = arg.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = f(acc, n);
    }
    acc
}

fn mutate_array(items: &mut Vec<Value>, method: &str, args: Vec<Value>) -> Value {
    if method == "pop" {
        return items.pop().unwrap_or_default();
    }
    items.extend(args);
    Value::Number(items.len() as f64)
}

fn call_method(receiver: Value, method: &str, args: &[Value], object: &Expr) -> Result<Value> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

    let result = match (&receiver, method) {
        (Value::Undefined | Value::Null, _) => {
            return Err(Error::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                receiver.type_name_or_null(),
                method
            )))
        }
        (Value::String(s), _) => string_method(s, method, args),
        (Value::Number(n), "toFixed") => {
            let digits = arg(0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Some(Value::String(format!("{:.*}", digits, n)))
        }
        (Value::Array(items), _) => array_method(items, method, args),
        (Value::Object(map), "hasOwnProperty") => {
            Some(Value::Bool(map.contains_key(&arg(0).to_string())))
        }
        (_, "toString") => Some(Value::String(receiver.to_string())),
        _ => None,
    };

    result.ok_or_else(|| {
        Error::type_error(format!(
            "{}.{} is not a function",
            expr_text(object),
            method
        ))
    })
}

/// Resolve a possibly negative relative index against `len`
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if *value == Value::Undefined {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Option<Value> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
    let chars: Vec<char> = s.chars().collect();
    let char_index = |byte: usize| s[..byte].chars().count() as f64;

    let value = match method {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "toString" => Value::String(s.to_string()),
        "indexOf" => Value::Number(
            s.find(&arg(0).to_string())
                .map(char_index)
                .unwrap_or(-1.0),
        ),
        "includes" => Value::Bool(s.contains(&arg(0).to_string())),
        "startsWith" => Value::Bool(s.starts_with(&arg(0).to_string())),
        "endsWith" => Value::Bool(s.ends_with(&arg(0).to_string())),
        "replace" => Value::String(s.replacen(&arg(0).to_string(), &arg(1).to_string(), 1)),
        "split" => {
            let parts: Vec<Value> = match arg(0) {
                Value::Undefined => vec![Value::String(s.to_string())],
                separator => {
                    let separator = separator.to_string();
                    if separator.is_empty() {
                        chars.iter().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str())
                            .map(|part| Value::String(part.to_string()))
                            .collect()
                    }
                }
            };
            Value::Array(parts)
        }
        "slice" => {
            let start = relative_index(&arg(0), chars.len(), 0);
            let end = relative_index(&arg(1), chars.len(), chars.len());
            Value::String(if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            })
        }
        "substring" => {
            let clamp = |v: Value, default: usize| match v {
                Value::Undefined => default,
                other => {
                    let n = other.to_number();
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        n.min(chars.len() as f64) as usize
                    }
                }
            };
            let a = clamp(arg(0), 0);
            let b = clamp(arg(1), chars.len());
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Value::String(chars[start..end].iter().collect())
        }
        "charAt" => {
            let index = arg(0).to_number();
            let index = if index.is_nan() { 0.0 } else { index.trunc() };
            Value::String(
                (index >= 0.0)
                    .then(|| chars.get(index as usize))
                    .flatten()
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
            )
        }
        _ => return None,
    };
    Some(value)
}

fn array_method(items: &[Value], method: &str, args: &[Value]) -> Option<Value> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

    let value = match method {
        "join" => {
            let separator = match arg(0) {
                Value::Undefined => ",".to_string(),
                other => other.to_string(),
            };
            let parts: Vec<String> = items.iter().map(Value::to_output).collect();
            Value::String(parts.join(&separator))
        }
        "indexOf" => {
            let needle = arg(0);
            Value::Number(
                items
                    .iter()
                    .position(|item| item.strict_eq(&needle))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            )
        }
        "includes" => {
            let needle = arg(0);
            Value::Bool(items.iter().any(|item| item.strict_eq(&needle)))
        }
        "slice" => {
            let start = relative_index(&arg(0), items.len(), 0);
            let end = relative_index(&arg(1), items.len(), items.len());
            Value::Array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            })
        }
        "concat" => {
            let mut joined = items.to_vec();
            for arg in args {
                match arg {
                    Value::Array(more) => joined.extend(more.iter().cloned()),
                    other => joined.push(other.clone()),
                }
            }
            Value::Array(joined)
        }
        "push" | "pop" => {
            let mut copy = items.to_vec();
            mutate_array(&mut copy, method, args.to_vec())
        }
        "toString" => Value::String(Value::Array(items.to_vec()).to_string()),
        _ => return None,
    };
    Some(value)
}

/// Non-negative integral array index
fn as_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn property_key(key: &Value) -> String {
    match key {
        Value::Number(n) => format_number(*n),
        other => other.to_string(),
    }
}

fn get_property(target: &Value, key: &Value, object: &Expr) -> Result<Value> {
    let name = property_key(key);
    let value = match target {
        Value::Undefined | Value::Null => {
            return Err(Error::type_error(format!(
                "Cannot read properties of {} (reading '{}') in {}",
                target.type_name_or_null(),
                name,
                expr_text(object)
            )))
        }
        Value::Object(map) => map.get(&name).cloned().unwrap_or_default(),
        Value::Array(items) if name == "length" => Value::Number(items.len() as f64),
        Value::Array(items) => as_index(key)
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or_default(),
        Value::String(s) if name == "length" => Value::Number(s.chars().count() as f64),
        Value::String(s) => as_index(key)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default(),
        _ => Value::Undefined,
    };
    Ok(value)
}

fn slot_mut<'v>(container: &'v mut Value, key: &Value) -> Result<&'v mut Value> {
    match container {
        Value::Object(map) => Ok(map.entry(property_key(key)).or_default()),
        Value::Array(items) => {
            let index = as_index(key).ok_or_else(|| {
                Error::type_error(format!(
                    "Cannot set property '{}' of an array",
                    property_key(key)
                ))
            })?;
            if index >= items.len() {
                let length = index
                    .checked_add(1)
                    .filter(|length| *length <= items.len() + MAX_ARRAY_GROWTH)
                    .ok_or_else(|| Error::type_error("Invalid array length"))?;
                items.resize(length, Value::Undefined);
            }
            Ok(&mut items[index])
        }
        other => Err(Error::type_error(format!(
            "Cannot set properties of {} (setting '{}')",
            other.type_name_or_null(),
            property_key(key)
        ))),
    }
}

pub(crate) fn binary_op(left: &Value, op: BinaryOperator, right: &Value) -> Value {
    use BinaryOperator::*;

    let numeric = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
    let compare = |f: fn(Ordering) -> bool| match (left, right) {
        (Value::String(a), Value::String(b)) => Value::Bool(f(a.cmp(b))),
        _ => Value::Bool(
            left.to_number()
                .partial_cmp(&right.to_number())
                .is_some_and(f),
        ),
    };

    match op {
        Add => {
            let concat = |v: &Value| {
                matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_))
            };
            if concat(left) || concat(right) {
                Value::String(format!("{}{}", left, right))
            } else {
                numeric(|a: f64, b: f64| a + b)
            }
        }
        Subtract => numeric(|a: f64, b: f64| a - b),
        Multiply => numeric(|a: f64, b: f64| a * b),
        Divide => numeric(|a: f64, b: f64| a / b),
        Modulo => numeric(|a: f64, b: f64| a % b),
        Equal => Value::Bool(left.loose_eq(right)),
        NotEqual => Value::Bool(!left.loose_eq(right)),
        StrictEqual => Value::Bool(left.strict_eq(right)),
        StrictNotEqual => Value::Bool(!left.strict_eq(right)),
        LessThan => compare(Ordering::is_lt),
        LessThanOrEqual => compare(Ordering::is_le),
        GreaterThan => compare(Ordering::is_gt),
        GreaterThanOrEqual => compare(Ordering::is_ge),
    }
}

/// Source-like rendering of an expression for error messages
fn expr_text(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::This => "this".to_string(),
        Expr::Member { object, property } => format!("{}.{}", expr_text(object), property),
        Expr::Index { object, .. } => format!("{}[...]", expr_text(object)),
        Expr::Call { callee, .. } => format!("{}(...)", expr_text(callee)),
        Expr::Literal(value) => value.to_string(),
        _ => "expression".to_string(),
    }
}

fn describe(expr: &Expr, value: &Value) -> String {
    match value {
        Value::Undefined | Value::Null => value.type_name_or_null().to_string(),
        _ => expr_text(expr),
    }
}
