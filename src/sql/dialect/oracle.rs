//! Oracle-style dialect: `:name` placeholders, `OFFSET … FETCH NEXT` paging

use super::{SqlDialect, page_offset};

#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl SqlDialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn parameter_prefix(&self) -> char {
        ':'
    }

    fn one_row_suffix(&self) -> String {
        " FETCH NEXT 1 ROWS ONLY".to_string()
    }

    fn page_suffix(&self, page: u32, rows: u32) -> String {
        format!(
            " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            page_offset(page, rows),
            rows
        )
    }
}
