//! PostgreSQL SQL dialect implementation

use super::SqlDialect;

/// PostgreSQL SQL dialect
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder() {
        let dialect = PostgresDialect;
        assert_eq!(dialect.placeholder(1), "$1");
        assert_eq!(dialect.placeholder(5), "$5");
    }

    #[test]
    fn test_render_is_positional() {
        let dialect = PostgresDialect;
        assert_eq!(
            dialect.render("SELECT * FROM t where (a = %s or b = %s) and metadata @> %s limit %s"),
            "SELECT * FROM t where (a = $1 or b = $2) and metadata @> $3 limit $4"
        );
    }

    #[test]
    fn test_render_without_placeholders() {
        assert_eq!(PostgresDialect.render("SELECT 1"), "SELECT 1");
        assert_eq!(PostgresDialect.render(""), "");
    }
}
