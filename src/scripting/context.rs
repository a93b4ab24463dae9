use crate::core::Value;
use std::collections::HashMap;

/// Output of one template evaluation in progress: the SQL buffer, values
/// produced by `<bind>` and `<foreach>` for the binding pass, and the
/// counter that keeps loop placeholder names unique.
#[derive(Debug, Default)]
pub struct DynamicContext {
    sql: String,
    bindings: HashMap<String, Value>,
    unique_number: usize,
}

impl DynamicContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. A single space is inserted when neither side of
    /// the join already carries whitespace, so adjacent fragments never
    /// fuse into one word.
    pub fn append_sql(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        let needs_space = self
            .sql
            .chars()
            .next_back()
            .is_some_and(|last| !last.is_whitespace())
            && fragment.chars().next().is_some_and(|first| !first.is_whitespace());
        if needs_space {
            self.sql.push(' ');
        }
        self.sql.push_str(fragment);
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Run `f` against an empty buffer and return what it appended. Bindings
    /// and the unique counter stay shared with the enclosing buffer.
    pub fn capture<T, F>(&mut self, f: F) -> (T, String)
    where
        F: FnOnce(&mut Self) -> T,
    {
        let outer = std::mem::take(&mut self.sql);
        let result = f(self);
        let captured = std::mem::replace(&mut self.sql, outer);
        (result, captured)
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn bindings(&self) -> &HashMap<String, Value> {
        &self.bindings
    }

    pub fn next_unique_number(&mut self) -> usize {
        let n = self.unique_number;
        self.unique_number += 1;
        n
    }

    /// Final SQL (trimmed) and the additional bindings.
    pub fn finish(self) -> (String, HashMap<String, Value>) {
        (self.sql.trim().to_string(), self.bindings)
    }
}
