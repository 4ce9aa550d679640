//! The language-neutral AST the inference engine walks (§4.7, §4.8).
//!
//! The concrete grammar (tree-sitter-elixir) is converted into this shape
//! by `parsing::tree_sitter_parser`; everything from `walker` onward is
//! independent of the concrete syntax.

use crate::error::Span;

pub type Arity = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(String),
    Bool(bool),
    String(String),
    Atom(String),
}

/// A pattern appearing in a function head, a `case` clause, or a
/// let-binding's left-hand side.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wildcard,
    Var(String),
    Literal(Literal),
    Tuple(Vec<Pattern>),
    List(Vec<Pattern>),
    /// A struct/map pattern binding named fields.
    Struct { module: Option<String>, fields: Vec<(String, Pattern)> },
}

impl Pattern {
    /// Variable names bound by this pattern, in left-to-right order.
    pub fn bound_vars(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Pattern::Var(name) => out.push(name),
            Pattern::Tuple(ps) | Pattern::List(ps) => {
                for p in ps {
                    p.collect_vars(out);
                }
            }
            Pattern::Struct { fields, .. } => {
                for (_, p) in fields {
                    p.collect_vars(out);
                }
            }
            Pattern::Wildcard | Pattern::Literal(_) => {}
        }
    }
}

/// One `pattern -> body` arm of a `case`/pattern-match expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub pattern: Pattern,
    pub body: Expr,
}

/// A single segment of a binary/bitstring construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BinarySegment {
    pub expr: Expr,
}

/// The language-neutral expression tree. One variant per synthesis rule
/// in §4.8.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal, Span),
    /// A compile-time module alias used as a bare name (e.g. `Enum`).
    ModuleAlias(String, Span),
    Var(String, Span),
    /// `M.f(args)` — a qualified call to a named module's function.
    QualifiedCall { module: String, function: String, args: Vec<Expr>, span: Span },
    /// `f(args)` — an unqualified call resolved against the Kernel
    /// registry first, then treated as an unknown local.
    LocalCall { function: String, args: Vec<Expr>, span: Span },
    /// `g(args)` where `g` is itself an expression (a bound variable, a
    /// captured function, the result of another call).
    Apply { callee: Box<Expr>, args: Vec<Expr>, span: Span },
    /// `fn params -> body end`.
    Lambda { params: Vec<Pattern>, body: Box<Expr>, span: Span },
    /// `&M.f/n`.
    Capture { module: String, function: String, arity: Arity, span: Span },
    /// `x = rhs; rest`.
    Let { pattern: Pattern, value: Box<Expr>, rest: Box<Expr>, span: Span },
    If { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr>, span: Span },
    Match { scrutinee: Box<Expr>, clauses: Vec<Clause>, span: Span },
    Tuple(Vec<Expr>, Span),
    List(Vec<Expr>, Span),
    Map(Vec<(Expr, Expr)>, Span),
    Binary(Vec<BinarySegment>, Span),
    /// A sequence of expressions threaded through a shared, mutable
    /// binding context; the block's type/effect come from its last
    /// expression and the combination of every expression's effect.
    Block(Vec<Expr>, Span),
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::Literal(_, s)
            | Expr::ModuleAlias(_, s)
            | Expr::Var(_, s)
            | Expr::QualifiedCall { span: s, .. }
            | Expr::LocalCall { span: s, .. }
            | Expr::Apply { span: s, .. }
            | Expr::Lambda { span: s, .. }
            | Expr::Capture { span: s, .. }
            | Expr::Let { span: s, .. }
            | Expr::If { span: s, .. }
            | Expr::Match { span: s, .. }
            | Expr::Tuple(_, s)
            | Expr::List(_, s)
            | Expr::Map(_, s)
            | Expr::Binary(_, s)
            | Expr::Block(_, s) => s,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Literal(..) => "literal",
            Expr::ModuleAlias(..) => "module_alias",
            Expr::Var(..) => "variable",
            Expr::QualifiedCall { .. } => "qualified_call",
            Expr::LocalCall { .. } => "local_call",
            Expr::Apply { .. } => "apply",
            Expr::Lambda { .. } => "lambda",
            Expr::Capture { .. } => "capture",
            Expr::Let { .. } => "let",
            Expr::If { .. } => "if",
            Expr::Match { .. } => "match",
            Expr::Tuple(..) => "tuple",
            Expr::List(..) => "list",
            Expr::Map(..) => "map",
            Expr::Binary(..) => "binary",
            Expr::Block(..) => "block",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// A single `def`/`defp` clause as extracted by the AST walker, before
/// effect inference runs (§4.7's `FunctionShell`).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub arity: Arity,
    pub params: Vec<Pattern>,
    pub body: Expr,
    pub visibility: Visibility,
    pub line: u32,
}

/// One parsed source module: its name and the functions it defines.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub functions: Vec<FunctionDef>,
}
