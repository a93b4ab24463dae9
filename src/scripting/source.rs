use super::binding::bind_placeholders;
use super::context::DynamicContext;
use super::node::SqlNode;
use super::scope::{DATABASE_ID_KEY, ExpressionScope, PARAMETER_OBJECT_KEY, Parameter};
use crate::core::{Result, Value};
use crate::mapping::{BoundCommand, ParameterMapping};
use std::collections::HashMap;

/// Compiled statement text, ready to produce a [`BoundCommand`] per call.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlSource {
    /// Fully static template: SQL and mappings were computed once when the
    /// template was compiled. Only values are resolved per call.
    Raw {
        sql: String,
        parameter_mappings: Vec<ParameterMapping>,
    },
    /// Template with directives or `${}` substitutions, evaluated per call.
    Dynamic {
        root: SqlNode,
        shrink_whitespace: bool,
    },
}

impl SqlSource {
    pub fn new(root: SqlNode, shrink_whitespace: bool) -> Result<Self> {
        if root.is_dynamic() {
            return Ok(Self::Dynamic {
                root,
                shrink_whitespace,
            });
        }

        let parameter = Parameter::none();
        let mut scope = ExpressionScope::root(&parameter, None);
        let mut ctx = DynamicContext::new();
        root.apply(&mut ctx, &mut scope)?;
        let (text, _) = ctx.finish();
        let (sql, parameter_mappings) = bind_placeholders(&text, shrink_whitespace)?;
        Ok(Self::Raw {
            sql,
            parameter_mappings,
        })
    }

    /// Plain SQL with `#{}` placeholders and no directives.
    pub fn raw(sql: &str) -> Result<Self> {
        Self::new(SqlNode::Static(sql.to_string()), false)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    pub fn bound_command(&self, parameter: &Parameter, database_id: Option<&str>) -> Result<BoundCommand> {
        match self {
            Self::Raw {
                sql,
                parameter_mappings,
            } => BoundCommand::new(
                sql.clone(),
                parameter_mappings.clone(),
                parameter.clone(),
                HashMap::new(),
            ),
            Self::Dynamic {
                root,
                shrink_whitespace,
            } => {
                let mut scope = ExpressionScope::root(parameter, database_id);
                let mut ctx = DynamicContext::new();
                ctx.bind(PARAMETER_OBJECT_KEY, parameter.to_value());
                ctx.bind(DATABASE_ID_KEY, Value::from(database_id.map(str::to_string)));

                root.apply(&mut ctx, &mut scope)?;

                let (text, bindings) = ctx.finish();
                let (sql, mappings) = bind_placeholders(&text, *shrink_whitespace)?;
                BoundCommand::new(sql, mappings, parameter.clone(), bindings)
            }
        }
    }
}
