use crate::core::Value;

/// Parsed form of a template test/bind/collection expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),

    /// Dotted property path resolved against the evaluation scope.
    Property(String),

    /// Zero-argument method call on a property (`ids.size()`).
    Method { target: String, method: Method },

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    Not(Box<Expr>),

    Negate(Box<Expr>),

    IsNull { expr: Box<Expr>, negated: bool },

    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Size,
    Length,
    IsEmpty,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "size" => Some(Self::Size),
            "length" => Some(Self::Length),
            "isEmpty" | "isempty" | "is_empty" => Some(Self::IsEmpty),
            _ => None,
        }
    }
}
