// ============================================================================
// SQL Node Tree
// ============================================================================
//
// Immutable tree produced by the template compiler. Applying a node writes
// SQL text into a `DynamicContext`; variables live in the `ExpressionScope`
// threaded through the walk.
//
// ============================================================================

use super::context::DynamicContext;
use super::scope::ExpressionScope;
use super::token::PARAMETER_TOKENS;
use crate::core::{MapperError, Result, Value};
use crate::expression::Expression;

/// Prefix overrides of `<where>`: a leading AND/OR followed by whitespace.
pub const WHERE_PREFIX_OVERRIDES: [&str; 8] = [
    "AND ", "OR ", "AND\n", "OR\n", "AND\r", "OR\r", "AND\t", "OR\t",
];

const ITEM_PREFIX: &str = "__frch_";

#[derive(Debug, Clone, PartialEq)]
pub enum SqlNode {
    /// Literal text without placeholders of any kind.
    Static(String),

    /// Literal text holding `#{}` placeholders, resolved by the binding pass.
    Parameterized(String),

    /// Text with `${}` substitutions, resolved while the tree is walked.
    Text(TextNode),

    If(IfNode),

    Choose(ChooseNode),

    Trim(TrimNode),

    Where(TrimNode),

    Set(TrimNode),

    ForEach(ForEachNode),

    Bind(BindNode),

    Mixed(Vec<SqlNode>),
}

impl SqlNode {
    /// Apply the node; returns whether it contributed (used by `<choose>`).
    pub fn apply(&self, ctx: &mut DynamicContext, scope: &mut ExpressionScope<'_>) -> Result<bool> {
        match self {
            SqlNode::Static(text) | SqlNode::Parameterized(text) => {
                ctx.append_sql(text);
                Ok(true)
            }
            SqlNode::Text(node) => node.apply(ctx, scope),
            SqlNode::If(node) => node.apply(ctx, scope),
            SqlNode::Choose(node) => node.apply(ctx, scope),
            SqlNode::Trim(node) | SqlNode::Where(node) | SqlNode::Set(node) => node.apply(ctx, scope),
            SqlNode::ForEach(node) => node.apply(ctx, scope),
            SqlNode::Bind(node) => node.apply(ctx, scope),
            SqlNode::Mixed(children) => {
                for child in children {
                    child.apply(ctx, scope)?;
                }
                Ok(true)
            }
        }
    }

    /// Whether applying the node can depend on the parameter object.
    pub fn is_dynamic(&self) -> bool {
        match self {
            SqlNode::Static(_) | SqlNode::Parameterized(_) => false,
            SqlNode::Mixed(children) => children.iter().any(SqlNode::is_dynamic),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextPart {
    Literal(String),
    Substitution(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub parts: Vec<TextPart>,
}

impl TextNode {
    fn apply(&self, ctx: &mut DynamicContext, scope: &mut ExpressionScope<'_>) -> Result<bool> {
        let mut text = String::new();
        for part in &self.parts {
            match part {
                TextPart::Literal(literal) => text.push_str(literal),
                TextPart::Substitution(expr) => match expr.evaluate(scope)? {
                    Value::Null => {}
                    value => text.push_str(&value.to_string()),
                },
            }
        }
        ctx.append_sql(&text);
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub test: Expression,
    pub contents: Box<SqlNode>,
}

impl IfNode {
    fn apply(&self, ctx: &mut DynamicContext, scope: &mut ExpressionScope<'_>) -> Result<bool> {
        if self.test.evaluate_boolean(scope)? {
            self.contents.apply(ctx, scope)?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChooseNode {
    pub branches: Vec<IfNode>,
    pub otherwise: Option<Box<SqlNode>>,
}

impl ChooseNode {
    fn apply(&self, ctx: &mut DynamicContext, scope: &mut ExpressionScope<'_>) -> Result<bool> {
        for branch in &self.branches {
            if branch.apply(ctx, scope)? {
                return Ok(true);
            }
        }
        match &self.otherwise {
            Some(default) => {
                default.apply(ctx, scope)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrimNode {
    pub contents: Box<SqlNode>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Upper-cased, checked in order.
    pub prefix_overrides: Vec<String>,
    pub suffix_overrides: Vec<String>,
}

impl TrimNode {
    pub fn new(
        contents: SqlNode,
        prefix: Option<String>,
        prefix_overrides: Option<&str>,
        suffix: Option<String>,
        suffix_overrides: Option<&str>,
    ) -> Self {
        Self {
            contents: Box::new(contents),
            prefix,
            suffix,
            prefix_overrides: parse_overrides(prefix_overrides),
            suffix_overrides: parse_overrides(suffix_overrides),
        }
    }

    pub fn where_clause(contents: SqlNode) -> Self {
        Self {
            contents: Box::new(contents),
            prefix: Some("WHERE".into()),
            suffix: None,
            prefix_overrides: WHERE_PREFIX_OVERRIDES.iter().map(|s| s.to_string()).collect(),
            suffix_overrides: Vec::new(),
        }
    }

    pub fn set_clause(contents: SqlNode) -> Self {
        Self {
            contents: Box::new(contents),
            prefix: Some("SET".into()),
            suffix: None,
            prefix_overrides: vec![",".into()],
            suffix_overrides: vec![",".into()],
        }
    }

    fn apply(&self, ctx: &mut DynamicContext, scope: &mut ExpressionScope<'_>) -> Result<bool> {
        let (result, body) = ctx.capture(|inner| self.contents.apply(inner, scope));
        let applied = result?;
        let trimmed = body.trim();
        if !trimmed.is_empty() {
            ctx.append_sql(&self.decorate(trimmed));
        }
        Ok(applied)
    }

    /// Strip at most one override at each end, then add prefix and suffix.
    pub fn decorate(&self, trimmed: &str) -> String {
        let mut sql = trimmed;

        let upper = sql.to_ascii_uppercase();
        if let Some(matched) = self
            .prefix_overrides
            .iter()
            .find(|o| upper.starts_with(o.as_str()))
        {
            sql = sql.get(matched.trim().len()..).unwrap_or("").trim_start();
        }

        let upper = sql.to_ascii_uppercase();
        if let Some(matched) = self
            .suffix_overrides
            .iter()
            .find(|o| upper.ends_with(o.as_str()) || ends_with_word(&upper, o.trim()))
        {
            let cut = sql.len().saturating_sub(matched.trim().len());
            sql = sql.get(..cut).unwrap_or("").trim_end();
        }

        let mut out = String::with_capacity(sql.len() + 16);
        if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            out.push_str(prefix);
            out.push(' ');
        }
        out.push_str(sql);
        if let Some(suffix) = self.suffix.as_deref().filter(|s| !s.is_empty()) {
            out.push(' ');
            out.push_str(suffix);
        }
        out
    }
}

/// `text` ends with `word`, and a keyword-like `word` is not the tail of a
/// longer identifier.
fn ends_with_word(text: &str, word: &str) -> bool {
    if word.is_empty() || !text.ends_with(word) {
        return false;
    }
    let keyword = word.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    !keyword
        || text[..text.len() - word.len()]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_')
}

/// Pipe-separated override list, upper-cased. Whitespace inside entries
/// is significant (`"AND |OR "`).
pub fn parse_overrides(overrides: Option<&str>) -> Vec<String> {
    overrides
        .map(|list| {
            list.split('|')
                .filter(|entry| !entry.is_empty())
                .map(|entry| entry.to_ascii_uppercase())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForEachNode {
    pub contents: Box<SqlNode>,
    pub collection: Expression,
    pub item: Option<String>,
    pub index: Option<String>,
    pub open: String,
    pub close: String,
    pub separator: String,
    pub nullable: bool,
}

impl ForEachNode {
    fn apply(&self, ctx: &mut DynamicContext, scope: &mut ExpressionScope<'_>) -> Result<bool> {
        let entries = match self.collection.evaluate(scope)? {
            Value::Null if self.nullable => return Ok(true),
            Value::Null => {
                return Err(MapperError::EvaluationError(format!(
                    "The expression '{}' evaluated to a null value.",
                    self.collection.source()
                )));
            }
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::Integer(i as i64), item))
                .collect::<Vec<_>>(),
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| (Value::Text(key), item))
                .collect(),
            other => {
                return Err(MapperError::EvaluationError(format!(
                    "The expression '{}' returned a {} which is not iterable.",
                    self.collection.source(),
                    other.type_name()
                )));
            }
        };

        if entries.is_empty() {
            return Ok(true);
        }

        let mut out = String::from(self.open.as_str());
        let mut first = true;
        for (index, item) in entries {
            let unique = ctx.next_unique_number();
            let mut local = scope.child();

            if let Some(name) = &self.item {
                ctx.bind(itemized_name(name, unique), item.clone());
                local.set(name.clone(), item);
            }
            if let Some(name) = &self.index {
                ctx.bind(itemized_name(name, unique), index.clone());
                local.set(name.clone(), index);
            }

            let (result, body) = ctx.capture(|inner| self.contents.apply(inner, &mut local));
            result?;
            let body = self.itemize_placeholders(&body, unique);

            if body.trim().is_empty() {
                continue;
            }
            if !first {
                out.push_str(&self.separator);
            }
            out.push_str(&body);
            first = false;
        }
        out.push_str(&self.close);

        ctx.append_sql(&out);
        Ok(true)
    }

    /// Point `#{item...}` / `#{index...}` at this iteration's bindings.
    fn itemize_placeholders(&self, body: &str, unique: usize) -> String {
        PARAMETER_TOKENS.rewrite(body, |content| {
            let content = match &self.item {
                Some(name) => itemize(content, name, unique).unwrap_or_else(|| content.to_string()),
                None => content.to_string(),
            };
            match &self.index {
                Some(name) => itemize(&content, name, unique).unwrap_or(content),
                None => content,
            }
        })
    }
}

fn itemized_name(name: &str, unique: usize) -> String {
    format!("{}{}_{}", ITEM_PREFIX, name, unique)
}

/// Rename a placeholder whose property path starts with `name`, keeping
/// the remainder (`.field`, `,jdbcType=...`).
fn itemize(content: &str, name: &str, unique: usize) -> Option<String> {
    let rest = content.trim_start().strip_prefix(name)?;
    match rest.chars().next() {
        None => {}
        Some(c) if c == '.' || c == ',' || c == ':' || c.is_whitespace() => {}
        Some(_) => return None,
    }
    Some(format!("{}{}", itemized_name(name, unique), rest))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindNode {
    pub name: String,
    pub expression: Expression,
}

impl BindNode {
    fn apply(&self, ctx: &mut DynamicContext, scope: &mut ExpressionScope<'_>) -> Result<bool> {
        let value = self.expression.evaluate(scope)?;
        scope.set(self.name.clone(), value.clone());
        ctx.bind(self.name.clone(), value);
        Ok(true)
    }
}
