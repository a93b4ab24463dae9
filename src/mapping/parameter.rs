use crate::core::{MapperError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
}

impl ParameterMode {
    /// Whether a value is sent to the driver for this parameter.
    pub fn is_input(&self) -> bool {
        !matches!(self, Self::Out)
    }
}

impl FromStr for ParameterMode {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            "INOUT" => Ok(Self::InOut),
            other => Err(MapperError::TemplateError(format!(
                "Unknown parameter mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ParameterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::Out => write!(f, "OUT"),
            Self::InOut => write!(f, "INOUT"),
        }
    }
}

/// One `#{...}` placeholder after the binding pass: where its value comes
/// from and the inline hints written next to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ParameterMapping {
    pub property: String,
    pub mode: ParameterMode,
    pub java_type: Option<String>,
    pub jdbc_type: Option<String>,
    pub jdbc_type_name: Option<String>,
    pub numeric_scale: Option<u32>,
    pub type_handler: Option<String>,
    pub result_map: Option<String>,
}

const VALID_OPTIONS: &str = "javaType, jdbcType, jdbcTypeName, mode, numericScale, resultMap, typeHandler";

impl ParameterMapping {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            ..Self::default()
        }
    }

    pub fn mode(mut self, mode: ParameterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn jdbc_type(mut self, jdbc_type: &str) -> Self {
        self.jdbc_type = Some(jdbc_type.to_string());
        self
    }

    /// Parse placeholder content: `property[:JDBCTYPE][, option=value]*`.
    pub fn parse(content: &str) -> Result<Self> {
        let mut options = content.split(',');
        let head = options.next().unwrap_or("").trim();

        let (property, old_style_type) = match head.split_once(':') {
            Some((property, jdbc_type)) => (property.trim(), Some(jdbc_type.trim())),
            None => (head, None),
        };
        if property.is_empty() {
            return Err(MapperError::TemplateError(format!(
                "Parameter mapping '#{{{}}}' names no property",
                content
            )));
        }

        let mut mapping = Self::new(property);
        if let Some(jdbc_type) = old_style_type.filter(|t| !t.is_empty()) {
            mapping.jdbc_type = Some(jdbc_type.to_string());
        }

        for option in options {
            let (name, value) = option.split_once('=').ok_or_else(|| {
                MapperError::TemplateError(format!(
                    "Parsing error in #{{{}}}: expected name=value, found '{}'",
                    content,
                    option.trim()
                ))
            })?;
            let (name, value) = (name.trim(), value.trim().to_string());
            match name {
                "javaType" => mapping.java_type = Some(value),
                "jdbcType" => mapping.jdbc_type = Some(value),
                "jdbcTypeName" => mapping.jdbc_type_name = Some(value),
                "mode" => mapping.mode = value.parse()?,
                "numericScale" => {
                    mapping.numeric_scale = Some(value.parse().map_err(|_| {
                        MapperError::TemplateError(format!(
                            "numericScale must be a non-negative integer in #{{{}}}",
                            content
                        ))
                    })?)
                }
                "typeHandler" => mapping.type_handler = Some(value),
                "resultMap" => mapping.result_map = Some(value),
                other => {
                    return Err(MapperError::TemplateError(format!(
                        "An invalid property '{}' was found in mapping #{{{}}}. Valid properties are {}",
                        other, content, VALID_OPTIONS
                    )));
                }
            }
        }

        Ok(mapping)
    }
}
