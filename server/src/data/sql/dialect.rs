//! SQL dialect trait

use crate::data::filters::PLACEHOLDER;

/// SQL dialect trait for generating database-specific SQL
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Generate a parameter placeholder for the given index (1-based)
    fn placeholder(&self, index: usize) -> String;

    /// Replace every `%s` placeholder, left to right, with the dialect form
    fn render(&self, sql: &str) -> String {
        let mut out = String::with_capacity(sql.len() + 8);
        let mut index = 0;
        let mut parts = sql.split(PLACEHOLDER);
        if let Some(first) = parts.next() {
            out.push_str(first);
        }
        for part in parts {
            index += 1;
            out.push_str(&self.placeholder(index));
            out.push_str(part);
        }
        out
    }
}
