use crate::core::Value;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

const DEFAULT_MULTIPLIER: i64 = 37;
const DEFAULT_HASHCODE: i64 = 17;

/// Order-sensitive composite key of a query execution.
///
/// Parts are folded into a running hash as they are added; equality
/// compares the running hash, checksum and count first and only then the
/// parts themselves.
#[derive(Debug, Clone)]
pub struct CacheKey {
    multiplier: i64,
    hashcode: i64,
    checksum: i64,
    count: i64,
    parts: Vec<Value>,
}

impl CacheKey {
    pub fn new() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            hashcode: DEFAULT_HASHCODE,
            checksum: 0,
            count: 0,
            parts: Vec::new(),
        }
    }

    pub fn update(&mut self, part: impl Into<Value>) {
        let part = part.into();
        let mut base = if part.is_null() { 1 } else { base_hash(&part) };

        self.count += 1;
        self.checksum = self.checksum.wrapping_add(base);
        base = base.wrapping_mul(self.count);
        self.hashcode = self.multiplier.wrapping_mul(self.hashcode).wrapping_add(base);

        self.parts.push(part);
    }

    pub fn update_all<I, V>(&mut self, parts: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for part in parts {
            self.update(part);
        }
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

fn base_hash(value: &Value) -> i64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish() as i64
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hashcode == other.hashcode
            && self.checksum == other.checksum
            && self.count == other.count
            && self.parts == other.parts
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i64(self.hashcode);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hashcode, self.checksum)?;
        for part in &self.parts {
            write!(f, ":{}", part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[Value]) -> CacheKey {
        let mut key = CacheKey::new();
        key.update_all(parts.iter().cloned());
        key
    }

    #[test]
    fn test_equal_parts_equal_keys() {
        let a = key(&[Value::from("users.find"), Value::Integer(0), Value::from("SELECT ?"), Value::Integer(5)]);
        let b = key(&[Value::from("users.find"), Value::Integer(0), Value::from("SELECT ?"), Value::Integer(5)]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_order_and_values_matter() {
        let a = key(&[Value::Integer(1), Value::Integer(2)]);
        let b = key(&[Value::Integer(2), Value::Integer(1)]);
        let c = key(&[Value::Integer(1), Value::Integer(3)]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(key(&[Value::Null]), key(&[]));
    }
}
