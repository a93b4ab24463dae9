// ============================================================================
// Template Compiler
// ============================================================================
//
// Turns template markup into an immutable `SqlNode` tree. Each known tag has
// a handler; anything else is rejected at compile time.
//
// ============================================================================

use super::markup::{self, Element, Markup};
use super::node::{BindNode, ChooseNode, ForEachNode, IfNode, SqlNode, TextNode, TextPart, TrimNode};
use super::source::SqlSource;
use super::token::{PARAMETER_TOKENS, SUBSTITUTION_TOKENS, Segment};
use crate::core::{MapperError, Result};
use crate::expression::Expression;

/// Wrapper element accepted around a whole template.
const SCRIPT_TAG: &str = "script";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    pub shrink_whitespace: bool,
    /// `nullable` of a `<foreach>` that does not set it.
    pub nullable_on_for_each: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptCompiler {
    options: CompileOptions,
}

impl ScriptCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Compile a template into a [`SqlSource`].
    pub fn compile(&self, template: &str) -> Result<SqlSource> {
        let root = self.compile_nodes(template)?;
        SqlSource::new(root, self.options.shrink_whitespace)
    }

    /// Compile a template into its node tree.
    pub fn compile_nodes(&self, template: &str) -> Result<SqlNode> {
        let nodes = markup::parse(template)?;
        let nodes = unwrap_script(nodes);
        Ok(SqlNode::Mixed(self.compile_children(&nodes)?))
    }

    fn compile_children(&self, children: &[Markup]) -> Result<Vec<SqlNode>> {
        children
            .iter()
            .map(|child| match child {
                Markup::Text(text) => self.compile_text(text),
                Markup::Element(element) => self.compile_element(element),
            })
            .collect()
    }

    fn compile_mixed(&self, element: &Element) -> Result<SqlNode> {
        Ok(SqlNode::Mixed(self.compile_children(&element.children)?))
    }

    fn compile_text(&self, text: &str) -> Result<SqlNode> {
        let segments = SUBSTITUTION_TOKENS.segments(text);

        if segments.iter().any(|s| matches!(s, Segment::Token(_))) {
            let parts = segments
                .into_iter()
                .map(|segment| match segment {
                    Segment::Literal(literal) => Ok(TextPart::Literal(literal)),
                    Segment::Token(expr) => Ok(TextPart::Substitution(Expression::parse(&expr)?)),
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(SqlNode::Text(TextNode { parts }));
        }

        // No substitutions; escapes are already resolved
        let literal: String = segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Literal(literal) | Segment::Token(literal) => literal,
            })
            .collect();
        if PARAMETER_TOKENS.has_tokens(&literal) {
            Ok(SqlNode::Parameterized(literal))
        } else {
            Ok(SqlNode::Static(literal))
        }
    }

    fn compile_element(&self, element: &Element) -> Result<SqlNode> {
        match element.name.as_str() {
            "if" => Ok(SqlNode::If(self.compile_if(element)?)),
            "choose" => self.compile_choose(element),
            "trim" => {
                let contents = self.compile_mixed(element)?;
                Ok(SqlNode::Trim(TrimNode::new(
                    contents,
                    element.attribute("prefix").map(str::to_string),
                    element.attribute("prefixOverrides"),
                    element.attribute("suffix").map(str::to_string),
                    element.attribute("suffixOverrides"),
                )))
            }
            "where" => Ok(SqlNode::Where(TrimNode::where_clause(self.compile_mixed(element)?))),
            "set" => Ok(SqlNode::Set(TrimNode::set_clause(self.compile_mixed(element)?))),
            "foreach" => self.compile_foreach(element),
            "bind" => Ok(SqlNode::Bind(BindNode {
                name: required(element, "name")?.to_string(),
                expression: Expression::parse(required(element, "value")?)?,
            })),
            other => Err(MapperError::TemplateError(format!(
                "Unknown element <{}> in SQL statement.",
                other
            ))),
        }
    }

    fn compile_if(&self, element: &Element) -> Result<IfNode> {
        Ok(IfNode {
            test: Expression::parse(required(element, "test")?)?,
            contents: Box::new(self.compile_mixed(element)?),
        })
    }

    fn compile_choose(&self, element: &Element) -> Result<SqlNode> {
        let mut branches = Vec::new();
        let mut defaults = Vec::new();

        for child in &element.children {
            // Text between branches carries no meaning
            let Markup::Element(child) = child else {
                continue;
            };
            match child.name.as_str() {
                "when" | "if" => branches.push(self.compile_if(child)?),
                "otherwise" => defaults.push(self.compile_mixed(child)?),
                other => {
                    return Err(MapperError::TemplateError(format!(
                        "Unknown element <{}> in <choose>.",
                        other
                    )));
                }
            }
        }

        if defaults.len() > 1 {
            return Err(MapperError::TemplateError(
                "Too many default (otherwise) elements in choose statement.".into(),
            ));
        }

        Ok(SqlNode::Choose(ChooseNode {
            branches,
            otherwise: defaults.pop().map(Box::new),
        }))
    }

    fn compile_foreach(&self, element: &Element) -> Result<SqlNode> {
        let nullable = match element.attribute("nullable") {
            Some(flag) => parse_bool(flag).ok_or_else(|| {
                MapperError::TemplateError(format!(
                    "<foreach> attribute nullable must be true or false, found '{}'",
                    flag
                ))
            })?,
            None => self.options.nullable_on_for_each,
        };
        let text = |name: &str| element.attribute(name).unwrap_or("").to_string();

        Ok(SqlNode::ForEach(ForEachNode {
            contents: Box::new(self.compile_mixed(element)?),
            collection: Expression::parse(required(element, "collection")?)?,
            item: element.attribute("item").map(str::to_string),
            index: element.attribute("index").map(str::to_string),
            open: text("open"),
            close: text("close"),
            separator: text("separator"),
            nullable,
        }))
    }
}

fn required<'e>(element: &'e Element, name: &str) -> Result<&'e str> {
    element.attribute(name).ok_or_else(|| {
        MapperError::TemplateError(format!(
            "<{}> requires attribute '{}'",
            element.name, name
        ))
    })
}

fn parse_bool(flag: &str) -> Option<bool> {
    match flag.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// `<script>...</script>` around the whole template is dropped.
fn unwrap_script(nodes: Vec<Markup>) -> Vec<Markup> {
    let significant: Vec<&Markup> = nodes
        .iter()
        .filter(|node| !matches!(node, Markup::Text(t) if t.trim().is_empty()))
        .collect();
    if let [Markup::Element(script)] = significant.as_slice() {
        if script.name == SCRIPT_TAG {
            return script.children.clone();
        }
    }
    nodes
}
