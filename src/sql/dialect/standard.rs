//! Standard dialect: `@name` placeholders, `LIMIT` / `OFFSET` paging

use super::{SqlDialect, page_offset};

/// Dialect for backends that page with `LIMIT <rows> OFFSET <n>`
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDialect;

impl SqlDialect for StandardDialect {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn parameter_prefix(&self) -> char {
        '@'
    }

    fn one_row_suffix(&self) -> String {
        " LIMIT 1".to_string()
    }

    fn page_suffix(&self, page: u32, rows: u32) -> String {
        format!(" LIMIT {} OFFSET {}", rows, page_offset(page, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_one_appends_limit() {
        let sql = StandardDialect.format_query_sql("*", "\"users\"", " WHERE \"id\" = @id", "", true);
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE \"id\" = @id LIMIT 1");
    }

    #[test]
    fn test_query_page() {
        let sql = StandardDialect.format_query_page_sql(
            2,
            10,
            "*",
            "\"users\"",
            "",
            " ORDER BY \"id\" ASC",
        );
        assert_eq!(sql, "SELECT * FROM \"users\" ORDER BY \"id\" ASC LIMIT 10 OFFSET 10");
    }

    #[test]
    fn test_raw_page() {
        assert_eq!(
            StandardDialect.format_page_sql(1, 25, "SELECT id FROM t"),
            "SELECT id FROM t LIMIT 25 OFFSET 0"
        );
    }
}
