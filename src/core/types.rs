use super::Value;

/// One result row as produced by the driver.
pub type Row = Vec<Value>;
