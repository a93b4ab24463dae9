// ============================================================================
// Expression Converter
// ============================================================================
//
// Test expressions are tokenized and parsed by `sqlparser` and then lowered
// into our own `Expr` through a registry of conversion plugins.
//
// ============================================================================

use super::ast::{BinaryOp, Expr, Method};
use crate::core::{MapperError, Result, Value};
use sqlparser::ast as sql_ast;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

/// Lowers one family of `sqlparser` expressions into [`Expr`].
pub trait ConversionPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool;

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr>;
}

pub struct ConversionPluginRegistry {
    plugins: Vec<Box<dyn ConversionPlugin>>,
}

impl ConversionPluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn ConversionPlugin>) {
        log::trace!("Registered expression conversion plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn with_default_plugins() -> Self {
        let mut registry = Self::new();

        // Nested first so parentheses unwrap before anything else looks at them
        registry.register(Box::new(NestedPlugin));
        registry.register(Box::new(UnaryPlugin));
        registry.register(Box::new(BinaryPlugin));
        registry.register(Box::new(IsNullPlugin));
        registry.register(Box::new(InListPlugin));
        registry.register(Box::new(MethodCallPlugin));

        registry
    }

    fn find_plugin(&self, expr: &sql_ast::Expr) -> Option<&dyn ConversionPlugin> {
        self.plugins
            .iter()
            .find(|plugin| plugin.can_handle(expr))
            .map(|boxed| &**boxed)
    }
}

impl Default for ConversionPluginRegistry {
    fn default() -> Self {
        Self::with_default_plugins()
    }
}

pub struct ExpressionConverter {
    registry: ConversionPluginRegistry,
}

impl ExpressionConverter {
    pub fn new() -> Self {
        Self {
            registry: ConversionPluginRegistry::with_default_plugins(),
        }
    }

    /// Parse expression source text into an [`Expr`].
    pub fn parse(&self, source: &str) -> Result<Expr> {
        let normalized = quote_paths(&normalize_operators(source));
        if normalized.trim().is_empty() {
            return Err(MapperError::TemplateError(format!(
                "Empty expression '{}'",
                source
            )));
        }

        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(&normalized)
            .map_err(|e| malformed(source, e))?;
        let parsed = parser.parse_expr().map_err(|e| malformed(source, e))?;

        let trailing = parser.peek_token();
        if trailing.token != Token::EOF {
            return Err(MapperError::TemplateError(format!(
                "Malformed expression '{}': unexpected '{}'",
                source, trailing.token
            )));
        }

        self.convert(parsed)
            .map_err(|e| match e {
                MapperError::TemplateError(msg) => MapperError::TemplateError(format!(
                    "Malformed expression '{}': {}",
                    source, msg
                )),
                other => other,
            })
    }

    pub fn convert(&self, expr: sql_ast::Expr) -> Result<Expr> {
        match &expr {
            sql_ast::Expr::Identifier(ident) => {
                // OGNL-style "text" literals arrive as quoted identifiers
                if ident.quote_style == Some('"') {
                    return Ok(Expr::Literal(Value::Text(ident.value.clone())));
                }
                return Ok(Expr::Property(ident.value.clone()));
            }
            sql_ast::Expr::CompoundIdentifier(idents) => {
                let parts: Vec<String> = idents.iter().map(|i| i.value.clone()).collect();
                return Ok(Expr::Property(parts.join(".")));
            }
            sql_ast::Expr::Value(val) => {
                return Ok(Expr::Literal(self.convert_value(&val.value)?));
            }
            _ => {}
        }

        if let Some(plugin) = self.registry.find_plugin(&expr) {
            return plugin.convert(expr, self);
        }

        Err(MapperError::TemplateError(format!(
            "Unsupported expression: {}",
            expr
        )))
    }

    pub fn convert_value(&self, val: &sql_ast::Value) -> Result<Value> {
        match val {
            sql_ast::Value::Number(n, _) => {
                if let Ok(i) = n.parse::<i64>() {
                    Ok(Value::Integer(i))
                } else if let Ok(f) = n.parse::<f64>() {
                    Ok(Value::Float(f))
                } else {
                    Err(MapperError::TemplateError(format!("Invalid number: {}", n)))
                }
            }
            sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
                Ok(Value::Text(s.clone()))
            }
            sql_ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
            sql_ast::Value::Null => Ok(Value::Null),
            _ => Err(MapperError::TemplateError(format!(
                "Unsupported literal: {}",
                val
            ))),
        }
    }

    pub fn convert_binary_op(&self, op: &sql_ast::BinaryOperator) -> Result<BinaryOp> {
        use sql_ast::BinaryOperator as SqlOp;

        match op {
            SqlOp::Plus => Ok(BinaryOp::Add),
            SqlOp::Minus => Ok(BinaryOp::Subtract),
            SqlOp::Multiply => Ok(BinaryOp::Multiply),
            SqlOp::Divide => Ok(BinaryOp::Divide),
            SqlOp::Modulo => Ok(BinaryOp::Modulo),

            SqlOp::Eq => Ok(BinaryOp::Eq),
            SqlOp::NotEq => Ok(BinaryOp::NotEq),
            SqlOp::Lt => Ok(BinaryOp::Lt),
            SqlOp::LtEq => Ok(BinaryOp::LtEq),
            SqlOp::Gt => Ok(BinaryOp::Gt),
            SqlOp::GtEq => Ok(BinaryOp::GtEq),

            SqlOp::And => Ok(BinaryOp::And),
            SqlOp::Or => Ok(BinaryOp::Or),

            _ => Err(MapperError::TemplateError(format!(
                "Unsupported binary operator: {}",
                op
            ))),
        }
    }
}

impl Default for ExpressionConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn malformed(source: &str, err: sqlparser::parser::ParserError) -> MapperError {
    MapperError::TemplateError(format!("Malformed expression '{}': {}", source, err))
}

/// Rewrite OGNL-style operators (`&&`, `||`, `==`, `!`) into their SQL
/// spelling. Quoted text is copied untouched.
fn normalize_operators(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 8);
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match (c, next) {
            ('\'', _) | ('"', _) => {
                quote = Some(c);
                out.push(c);
            }
            ('&', Some('&')) => {
                out.push_str(" AND ");
                i += 1;
            }
            ('|', Some('|')) => {
                out.push_str(" OR ");
                i += 1;
            }
            ('=', Some('=')) => {
                out.push_str(" = ");
                i += 1;
            }
            ('!', Some('=')) => {
                out.push_str("!=");
                i += 1;
            }
            ('!', _) => out.push_str(" NOT "),
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

/// Words of the expression grammar itself; everything else is a path.
const GRAMMAR_KEYWORDS: [&str; 8] = ["and", "or", "not", "is", "null", "in", "true", "false"];

/// Backtick-quote every property path segment so names such as `user`,
/// `interval` or `trim` are read as identifiers rather than SQL keywords.
/// Grammar keywords standing alone and method names before `(` stay bare.
fn quote_paths(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 16);
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        if matches!(c, '\'' | '"' | '`') {
            quote = Some(c);
            out.push(c);
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let after_dot = out.ends_with('.');
            let before_dot = chars.get(i) == Some(&'.');
            let is_call = after_dot && chars[i..].iter().find(|c| !c.is_whitespace()) == Some(&'(');
            let is_keyword = !after_dot
                && !before_dot
                && GRAMMAR_KEYWORDS.contains(&word.to_ascii_lowercase().as_str());

            if is_call || is_keyword {
                out.push_str(&word);
            } else {
                out.push('`');
                out.push_str(&word);
                out.push('`');
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

// ============================================================================
// Conversion plugins
// ============================================================================

struct NestedPlugin;

impl ConversionPlugin for NestedPlugin {
    fn name(&self) -> &'static str {
        "NESTED"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::Nested(_))
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        match expr {
            sql_ast::Expr::Nested(inner) => converter.convert(*inner),
            _ => unreachable!("NestedPlugin called with non-nested expression"),
        }
    }
}

struct UnaryPlugin;

impl ConversionPlugin for UnaryPlugin {
    fn name(&self) -> &'static str {
        "UNARY"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::UnaryOp { .. })
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        let sql_ast::Expr::UnaryOp { op, expr } = expr else {
            unreachable!("UnaryPlugin called with non-unary expression");
        };
        let operand = Box::new(converter.convert(*expr)?);
        match op {
            sql_ast::UnaryOperator::Not => Ok(Expr::Not(operand)),
            sql_ast::UnaryOperator::Minus => Ok(Expr::Negate(operand)),
            sql_ast::UnaryOperator::Plus => Ok(*operand),
            other => Err(MapperError::TemplateError(format!(
                "Unsupported unary operator: {}",
                other
            ))),
        }
    }
}

struct BinaryPlugin;

impl ConversionPlugin for BinaryPlugin {
    fn name(&self) -> &'static str {
        "BINARY"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::BinaryOp { .. })
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        match expr {
            sql_ast::Expr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
                left: Box::new(converter.convert(*left)?),
                op: converter.convert_binary_op(&op)?,
                right: Box::new(converter.convert(*right)?),
            }),
            _ => unreachable!("BinaryPlugin called with non-binary expression"),
        }
    }
}

struct IsNullPlugin;

impl ConversionPlugin for IsNullPlugin {
    fn name(&self) -> &'static str {
        "IS_NULL"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(
            expr,
            sql_ast::Expr::IsNull(_) | sql_ast::Expr::IsNotNull(_)
        )
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        match expr {
            sql_ast::Expr::IsNull(inner) => Ok(Expr::IsNull {
                expr: Box::new(converter.convert(*inner)?),
                negated: false,
            }),
            sql_ast::Expr::IsNotNull(inner) => Ok(Expr::IsNull {
                expr: Box::new(converter.convert(*inner)?),
                negated: true,
            }),
            _ => unreachable!("IsNullPlugin called with non-null-check expression"),
        }
    }
}

struct InListPlugin;

impl ConversionPlugin for InListPlugin {
    fn name(&self) -> &'static str {
        "IN_LIST"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::InList { .. })
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        let sql_ast::Expr::InList { expr, list, negated } = expr else {
            unreachable!("InListPlugin called with non-IN expression");
        };
        Ok(Expr::InList {
            expr: Box::new(converter.convert(*expr)?),
            list: list
                .into_iter()
                .map(|item| converter.convert(item))
                .collect::<Result<Vec<_>>>()?,
            negated,
        })
    }
}

/// `ids.size()`, `name.length()`, `list.isEmpty()`; a bare zero-argument
/// call such as `user` (parsed as a niladic SQL function) is a property.
struct MethodCallPlugin;

impl ConversionPlugin for MethodCallPlugin {
    fn name(&self) -> &'static str {
        "METHOD_CALL"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::Function(_))
    }

    fn convert(&self, expr: sql_ast::Expr, _converter: &ExpressionConverter) -> Result<Expr> {
        let sql_ast::Expr::Function(func) = expr else {
            unreachable!("MethodCallPlugin called with non-function expression");
        };

        let no_args = match &func.args {
            sql_ast::FunctionArguments::None => true,
            sql_ast::FunctionArguments::List(list) => list.args.is_empty(),
            _ => false,
        };
        let name = func
            .name
            .0
            .iter()
            .map(|part| match part.as_ident() {
                Some(ident) => ident.value.clone(),
                None => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".");
        if !no_args {
            return Err(MapperError::TemplateError(format!(
                "Method '{}' does not take arguments",
                name
            )));
        }

        match name.rsplit_once('.') {
            Some((target, method)) => {
                let method = Method::from_name(method).ok_or_else(|| {
                    MapperError::TemplateError(format!("Unknown method '{}'", method))
                })?;
                Ok(Expr::Method {
                    target: target.to_string(),
                    method,
                })
            }
            None => Ok(Expr::Property(name)),
        }
    }
}
