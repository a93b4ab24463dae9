use super::token::PARAMETER_TOKENS;
use crate::core::Result;
use crate::mapping::ParameterMapping;

/// Replace every `#{...}` with a positional `?` and collect the mappings in
/// marker order.
pub fn bind_placeholders(sql: &str, shrink_whitespace: bool) -> Result<(String, Vec<ParameterMapping>)> {
    let mut mappings = Vec::new();
    let replaced = PARAMETER_TOKENS.replace(sql, |content| {
        mappings.push(ParameterMapping::parse(content)?);
        Ok("?".to_string())
    })?;

    let sql = if shrink_whitespace {
        shrink_whitespaces(&replaced)
    } else {
        replaced
    };
    Ok((sql, mappings))
}

/// Collapse every run of whitespace into one space.
pub fn shrink_whitespaces(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
