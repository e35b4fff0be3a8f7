// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement and expression AST
//!
//! ASTs are produced once by the parser and walked read-only by the
//! executor. Patterns reference variables by name, never by AST edge, so
//! no cycles arise.

use crate::catalog::{ConstraintKind, ScalarType};
use crate::storage::EntityKind;

/// A parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Query(Query),
    CreateIndex {
        name: Option<String>,
        entity: EntityKind,
        label_or_type: String,
        property: String,
        unique: bool,
        if_not_exists: bool,
    },
    DropIndex {
        name: String,
        if_exists: bool,
    },
    CreateConstraint {
        name: Option<String>,
        kind: ConstraintKind,
        entity: EntityKind,
        label_or_type: String,
        property: String,
        value_type: Option<ScalarType>,
        if_not_exists: bool,
    },
    DropConstraint {
        name: String,
        if_exists: bool,
    },
    ShowIndexes,
    ShowConstraints,
}

/// A clause pipeline, optionally combined with further queries by UNION
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
    pub union: Option<Box<UnionPart>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionPart {
    pub all: bool,
    pub query: Query,
}

/// One clause of the execution pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match {
        optional: bool,
        patterns: Vec<Pattern>,
        where_clause: Option<Expr>,
    },
    Create {
        patterns: Vec<Pattern>,
    },
    Merge {
        pattern: Pattern,
        on_create: Vec<SetItem>,
        on_match: Vec<SetItem>,
    },
    Set {
        items: Vec<SetItem>,
    },
    Remove {
        items: Vec<RemoveItem>,
    },
    Delete {
        detach: bool,
        exprs: Vec<Expr>,
    },
    With {
        projection: Projection,
        where_clause: Option<Expr>,
    },
    Unwind {
        expr: Expr,
        alias: String,
    },
    Return {
        projection: Projection,
    },
    Call {
        procedure: String,
        args: Vec<Expr>,
        yield_items: Option<Vec<YieldItem>>,
        where_clause: Option<Expr>,
    },
}

/// SET target forms
#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    /// `n.prop = expr`
    Property {
        variable: String,
        property: String,
        value: Expr,
    },
    /// `n = expr` replaces, `n += expr` merges a map
    Variable {
        variable: String,
        value: Expr,
        merge: bool,
    },
    /// `n:Label1:Label2`
    Labels {
        variable: String,
        labels: Vec<String>,
    },
}

/// REMOVE target forms
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveItem {
    Property { variable: String, property: String },
    Labels { variable: String, labels: Vec<String> },
}

/// Projection shared by WITH and RETURN
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub distinct: bool,
    /// `RETURN *`
    pub star: bool,
    pub items: Vec<ProjectionItem>,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl ProjectionItem {
    /// Output column name: the alias, or the expression's source text
    pub fn column_name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.expr.display_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YieldItem {
    pub column: String,
    pub alias: Option<String>,
}

/// Path-function heads recognized in MATCH patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortestKind {
    Shortest,
    AllShortest,
}

/// A linear pattern: start node plus (relationship, node) hops
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    /// `p = (a)-[…]->(b)` binds the whole path
    pub path_variable: Option<String>,
    pub shortest: Option<ShortestKind>,
    pub start: NodePattern,
    pub segments: Vec<(RelPattern, NodePattern)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternDirection {
    /// `-[]->`
    Outgoing,
    /// `<-[]-`
    Incoming,
    /// `-[]-`
    Undirected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub variable: Option<String>,
    pub types: Vec<String>,
    pub properties: Vec<(String, Expr)>,
    pub direction: PatternDirection,
    /// `None` = single hop; `Some((min, max))` = variable length with
    /// optional bounds
    pub length: Option<(Option<usize>, Option<usize>)>,
}

/// Binary operators in precedence-climbing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    Xor,
    And,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    StartsWith,
    EndsWith,
    Contains,
    RegexMatch,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    Parameter(String),
    Variable(String),
    /// `expr.prop` (broadcasts over lists)
    Property(Box<Expr>, String),
    /// `expr[index]`
    Index(Box<Expr>, Box<Expr>),
    /// `expr[from..to]`, half-open, either bound optional
    Slice(Box<Expr>, Option<Box<Expr>>, Option<Box<Expr>>),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `expr IS NULL` / `expr IS NOT NULL`
    IsNull(Box<Expr>, bool),
    FunctionCall {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// `count(*)`
    CountStar,
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_expr: Option<Box<Expr>>,
    },
    /// `[x IN list WHERE pred | map]`
    ListComprehension {
        variable: String,
        list: Box<Expr>,
        filter: Option<Box<Expr>>,
        map: Option<Box<Expr>>,
    },
    /// `[(a)-[:R]->(b) WHERE pred | expr]`
    PatternComprehension {
        pattern: Box<Pattern>,
        filter: Option<Box<Expr>>,
        map: Box<Expr>,
    },
    /// A bare pattern used as a predicate
    PatternPredicate(Box<Pattern>),
    /// `EXISTS { (a)-[:R]->(b) }` / `exists((a)-->(b))`
    Exists(Box<Pattern>),
}

impl Expr {
    /// Column-name rendering of an expression, matching the query text
    /// closely enough for result headers.
    pub fn display_name(&self) -> String {
        match self {
            Expr::Null => "null".to_string(),
            Expr::Bool(b) => b.to_string(),
            Expr::Integer(i) => i.to_string(),
            Expr::Float(f) => f.to_string(),
            Expr::Str(s) => format!("'{s}'"),
            Expr::Parameter(name) => format!("${name}"),
            Expr::Variable(name) => name.clone(),
            Expr::Property(base, prop) => format!("{}.{prop}", base.display_name()),
            Expr::Index(base, index) => {
                format!("{}[{}]", base.display_name(), index.display_name())
            }
            Expr::Slice(base, from, to) => format!(
                "{}[{}..{}]",
                base.display_name(),
                from.as_ref().map(|e| e.display_name()).unwrap_or_default(),
                to.as_ref().map(|e| e.display_name()).unwrap_or_default(),
            ),
            Expr::FunctionCall { name, args, .. } => {
                let inner: Vec<String> = args.iter().map(Expr::display_name).collect();
                format!("{name}({})", inner.join(", "))
            }
            Expr::CountStar => "count(*)".to_string(),
            Expr::Binary(op, lhs, rhs) => {
                format!("{} {} {}", lhs.display_name(), op.symbol(), rhs.display_name())
            }
            Expr::Unary(UnaryOp::Minus, inner) => format!("-{}", inner.display_name()),
            Expr::Unary(UnaryOp::Plus, inner) => format!("+{}", inner.display_name()),
            Expr::Unary(UnaryOp::Not, inner) => format!("NOT {}", inner.display_name()),
            _ => "expression".to_string(),
        }
    }

    /// Whether this expression contains an aggregate call at any depth
    /// outside a nested comprehension.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::CountStar => true,
            Expr::FunctionCall { name, args, .. } => {
                is_aggregate_name(name) || args.iter().any(Expr::contains_aggregate)
            }
            Expr::Property(base, _) => base.contains_aggregate(),
            Expr::Index(a, b) => a.contains_aggregate() || b.contains_aggregate(),
            Expr::Slice(base, from, to) => {
                base.contains_aggregate()
                    || from.as_ref().is_some_and(|e| e.contains_aggregate())
                    || to.as_ref().is_some_and(|e| e.contains_aggregate())
            }
            Expr::List(items) => items.iter().any(Expr::contains_aggregate),
            Expr::Map(entries) => entries.iter().any(|(_, e)| e.contains_aggregate()),
            Expr::Unary(_, inner) => inner.contains_aggregate(),
            Expr::Binary(_, lhs, rhs) => lhs.contains_aggregate() || rhs.contains_aggregate(),
            Expr::IsNull(inner, _) => inner.contains_aggregate(),
            Expr::Case {
                operand,
                branches,
                else_expr,
            } => {
                operand.as_ref().is_some_and(|e| e.contains_aggregate())
                    || branches
                        .iter()
                        .any(|(w, t)| w.contains_aggregate() || t.contains_aggregate())
                    || else_expr.as_ref().is_some_and(|e| e.contains_aggregate())
            }
            _ => false,
        }
    }
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "OR",
            BinaryOp::Xor => "XOR",
            BinaryOp::And => "AND",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::In => "IN",
            BinaryOp::StartsWith => "STARTS WITH",
            BinaryOp::EndsWith => "ENDS WITH",
            BinaryOp::Contains => "CONTAINS",
            BinaryOp::RegexMatch => "=~",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
        }
    }
}

/// Aggregate function names recognized by the evaluator
pub fn is_aggregate_name(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "count"
            | "sum"
            | "avg"
            | "min"
            | "max"
            | "collect"
            | "stdev"
            | "stddev"
            | "stdevp"
            | "stddevp"
            | "percentilecont"
            | "percentiledisc"
    )
}
