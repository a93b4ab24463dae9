// ============================================================================
// Template Markup Reader
// ============================================================================
//
// Reads the mixed text/tag content of a statement template into a small
// element tree. Only what templates use is supported: elements with quoted
// attributes, self-closing tags, CDATA sections, comments and the five
// predefined entities plus numeric character references.
//
// A `<` that cannot start a tag (`a < b`, `a <> b`, `x<=1`) is kept as text.
//
// ============================================================================

use crate::core::{MapperError, Result};
use regex::Regex;

lazy_static::lazy_static! {
    static ref OPEN_TAG: Regex =
        Regex::new(r#"^<([A-Za-z_][\w.:-]*)((?:\s+[A-Za-z_][\w.:-]*\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)>"#)
            .expect("valid open tag pattern");
    static ref CLOSE_TAG: Regex =
        Regex::new(r"^</([A-Za-z_][\w.:-]*)\s*>").expect("valid close tag pattern");
    static ref ATTRIBUTE: Regex =
        Regex::new(r#"([A-Za-z_][\w.:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("valid attribute pattern");
    static ref ENTITY: Regex =
        Regex::new(r"&(lt|gt|amp|quot|apos|#[0-9]+|#x[0-9A-Fa-f]+);").expect("valid entity pattern");
}

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";
const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

#[derive(Debug, Clone, PartialEq)]
pub enum Markup {
    /// Character data, entities already decoded. CDATA sections land here too.
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Markup>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parse template content into a list of top-level markup nodes.
pub fn parse(source: &str) -> Result<Vec<Markup>> {
    let mut reader = MarkupReader { source, pos: 0 };
    let (children, closing) = reader.read_children()?;
    if let Some(name) = closing {
        return Err(MapperError::TemplateError(format!(
            "Unexpected closing tag </{}>",
            name
        )));
    }
    Ok(children)
}

struct MarkupReader<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> MarkupReader<'a> {
    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    /// Read nodes until end of input or a closing tag, whose name is returned.
    fn read_children(&mut self) -> Result<(Vec<Markup>, Option<String>)> {
        let mut children = Vec::new();
        let mut text = String::new();

        while self.pos < self.source.len() {
            let rest = self.rest();
            let Some(lt) = rest.find('<') else {
                text.push_str(&decode_entities(rest));
                self.pos = self.source.len();
                break;
            };
            text.push_str(&decode_entities(&rest[..lt]));
            self.pos += lt;
            let rest = self.rest();

            if rest.starts_with(CDATA_OPEN) {
                let body = &rest[CDATA_OPEN.len()..];
                let end = body.find(CDATA_CLOSE).ok_or_else(|| {
                    MapperError::TemplateError("Unterminated CDATA section".into())
                })?;
                text.push_str(&body[..end]);
                self.pos += CDATA_OPEN.len() + end + CDATA_CLOSE.len();
            } else if rest.starts_with(COMMENT_OPEN) {
                let end = rest.find(COMMENT_CLOSE).ok_or_else(|| {
                    MapperError::TemplateError("Unterminated comment".into())
                })?;
                self.pos += end + COMMENT_CLOSE.len();
            } else if let Some(caps) = CLOSE_TAG.captures(rest) {
                self.pos += caps[0].len();
                flush_text(&mut text, &mut children);
                return Ok((children, Some(caps[1].to_string())));
            } else if let Some(caps) = OPEN_TAG.captures(rest) {
                self.pos += caps[0].len();
                flush_text(&mut text, &mut children);
                let name = caps[1].to_string();
                let attributes = parse_attributes(&caps[2])?;
                let self_closing = !caps[3].is_empty();
                let element_children = if self_closing {
                    Vec::new()
                } else {
                    self.read_element_body(&name)?
                };
                children.push(Markup::Element(Element {
                    name,
                    attributes,
                    children: element_children,
                }));
            } else if looks_like_tag(rest) {
                let snippet: String = rest.chars().take(32).collect();
                return Err(MapperError::TemplateError(format!(
                    "Malformed tag near '{}'",
                    snippet
                )));
            } else {
                text.push('<');
                self.pos += 1;
            }
        }

        flush_text(&mut text, &mut children);
        Ok((children, None))
    }

    fn read_element_body(&mut self, name: &str) -> Result<Vec<Markup>> {
        let (children, closing) = self.read_children()?;
        match closing {
            Some(closing) if closing == name => Ok(children),
            Some(closing) => Err(MapperError::TemplateError(format!(
                "Mismatched closing tag: expected </{}>, found </{}>",
                name, closing
            ))),
            None => Err(MapperError::TemplateError(format!(
                "Element <{}> is not closed",
                name
            ))),
        }
    }
}

fn flush_text(text: &mut String, children: &mut Vec<Markup>) {
    if text.is_empty() {
        return;
    }
    // CDATA next to plain text reads as one run of character data
    if let Some(Markup::Text(previous)) = children.last_mut() {
        previous.push_str(text);
        text.clear();
    } else {
        children.push(Markup::Text(std::mem::take(text)));
    }
}

/// `<` followed by a name start or `/` was meant to be markup.
fn looks_like_tag(rest: &str) -> bool {
    let mut chars = rest.chars().skip(1);
    match chars.next() {
        Some('/') => true,
        Some(c) => c.is_ascii_alphabetic() || c == '_' || c == '!',
        None => false,
    }
}

fn parse_attributes(raw: &str) -> Result<Vec<(String, String)>> {
    let mut attributes: Vec<(String, String)> = Vec::new();
    for caps in ATTRIBUTE.captures_iter(raw) {
        let name = caps[1].to_string();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map_or("", |m| m.as_str());
        if attributes.iter().any(|(existing, _)| *existing == name) {
            return Err(MapperError::TemplateError(format!(
                "Duplicate attribute '{}'",
                name
            )));
        }
        attributes.push((name, decode_entities(value)));
    }
    Ok(attributes)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            match entity {
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "amp" => "&".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => {
                    let code = match entity.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                        .map_or_else(|| caps[0].to_string(), |c| c.to_string())
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &Markup) -> &Element {
        match node {
            Markup::Element(e) => e,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_elements() {
        let nodes =
            parse(r#"SELECT * FROM t <where><if test="id != null">id = #{id}</if></where>"#)
                .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0], Markup::Text("SELECT * FROM t ".into()));
        let where_el = element(&nodes[1]);
        assert_eq!(where_el.name, "where");
        let if_el = element(&where_el.children[0]);
        assert_eq!(if_el.attribute("test"), Some("id != null"));
        assert_eq!(if_el.children, vec![Markup::Text("id = #{id}".into())]);
    }

    #[test]
    fn test_entities_cdata_and_comments() {
        let nodes = parse(
            r#"a &lt; 1 <!-- note --><![CDATA[ AND b < 2 ]]><if test="x &gt; 1">y</if>"#,
        )
        .unwrap();
        assert_eq!(nodes[0], Markup::Text("a < 1  AND b < 2 ".into()));
        assert_eq!(element(&nodes[1]).attribute("test"), Some("x > 1"));
    }

    #[test]
    fn test_bare_less_than_is_text() {
        let nodes = parse("a < b AND c <> d AND e<=1").unwrap();
        assert_eq!(nodes, vec![Markup::Text("a < b AND c <> d AND e<=1".into())]);
    }

    #[test]
    fn test_self_closing() {
        let nodes = parse(r#"<bind name="p" value="'%' + q"/>x"#).unwrap();
        let bind = element(&nodes[0]);
        assert!(bind.children.is_empty());
        assert_eq!(bind.attribute("value"), Some("'%' + q"));
    }

    #[test]
    fn test_structure_errors() {
        assert!(parse("<if test='a'>x").is_err());
        assert!(parse("<if test='a'>x</where>").is_err());
        assert!(parse("x</if>").is_err());
        assert!(parse("<if test=a>x</if>").is_err());
    }
}
