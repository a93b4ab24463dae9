use super::parameter::ParameterMapping;
use crate::core::{MapperError, Result, Value};
use crate::scripting::{PARAMETER_OBJECT_KEY, Parameter};
use std::collections::HashMap;

/// Logical paging window applied to query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowBounds {
    pub offset: usize,
    pub limit: usize,
}

impl RowBounds {
    pub const NO_ROW_OFFSET: usize = 0;
    pub const NO_ROW_LIMIT: usize = usize::MAX;

    pub const DEFAULT: RowBounds = RowBounds {
        offset: Self::NO_ROW_OFFSET,
        limit: Self::NO_ROW_LIMIT,
    };

    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Final SQL with positional `?` markers and everything needed to bind it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCommand {
    pub sql: String,
    pub parameter_mappings: Vec<ParameterMapping>,
    /// One value per mapping, in marker order. OUT-only slots hold null.
    pub values: Vec<Value>,
    /// Values produced during evaluation (`<bind>`, loop items).
    pub additional_bindings: HashMap<String, Value>,
    pub parameter: Parameter,
}

impl BoundCommand {
    /// Resolve every mapping against the additional bindings first and the
    /// parameter object second. A property path that exists nowhere is a
    /// `BindingError`.
    pub fn new(
        sql: String,
        parameter_mappings: Vec<ParameterMapping>,
        parameter: Parameter,
        additional_bindings: HashMap<String, Value>,
    ) -> Result<Self> {
        let values = parameter_mappings
            .iter()
            .map(|mapping| resolve_value(mapping, &parameter, &additional_bindings))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            sql,
            parameter_mappings,
            values,
            additional_bindings,
            parameter,
        })
    }

    /// Values actually sent to the driver as inputs, paired with their
    /// mappings.
    pub fn input_values(&self) -> impl Iterator<Item = (&ParameterMapping, &Value)> {
        self.parameter_mappings
            .iter()
            .zip(self.values.iter())
            .filter(|(mapping, _)| mapping.mode.is_input())
    }

    pub fn has_additional_binding(&self, property: &str) -> bool {
        let head = property.split('.').next().unwrap_or(property);
        self.additional_bindings.contains_key(head)
    }
}

fn resolve_value(
    mapping: &ParameterMapping,
    parameter: &Parameter,
    additional: &HashMap<String, Value>,
) -> Result<Value> {
    if !mapping.mode.is_input() {
        return Ok(Value::Null);
    }

    let property = mapping.property.as_str();
    let (head, rest) = match property.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (property, None),
    };

    let found = if let Some(bound) = additional.get(head) {
        match rest {
            Some(rest) => bound.get_path(rest).cloned(),
            None => Some(bound.clone()),
        }
    } else if head == PARAMETER_OBJECT_KEY {
        let whole = parameter.to_value();
        match rest {
            Some(rest) => whole.get_path(rest).cloned(),
            None => Some(whole),
        }
    } else if parameter.is_none() {
        Some(Value::Null)
    } else if parameter.is_scalar() {
        // A lone scalar answers to any name
        Some(parameter.to_value())
    } else {
        parameter.lookup(property)
    };

    found.ok_or_else(|| {
        MapperError::BindingError(format!(
            "There is no property named '{}' in the parameter object",
            property
        ))
    })
}
