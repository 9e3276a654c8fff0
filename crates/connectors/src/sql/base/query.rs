use model::records::range::KeyRange;

/// Renders the statements run against a data source. The source query is
/// wrapped in a CTE so any SELECT can be sliced without rewriting it.
pub struct QueryGenerator;

impl QueryGenerator {
    pub fn range(sql: &str, key_column: &str, range: &KeyRange) -> String {
        format!(
            "WITH cte AS ( {} ) SELECT * FROM cte WHERE {key_column} BETWEEN {} AND {} ORDER BY {key_column} ASC",
            trim_statement(sql),
            range.start,
            range.end,
        )
    }

    pub fn probe(sql: &str) -> String {
        format!(
            "WITH cte AS ( {} ) SELECT * FROM cte LIMIT 0",
            trim_statement(sql)
        )
    }

    pub fn ping() -> &'static str {
        "SELECT 1"
    }
}

fn trim_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;

    #[test]
    fn probe_strips_trailing_terminator() {
        assert_eq!(
            QueryGenerator::probe("SELECT * FROM t; "),
            "WITH cte AS ( SELECT * FROM t ) SELECT * FROM cte LIMIT 0"
        );
    }

    #[test]
    fn range_bounds_are_rendered_as_literals() {
        let range = KeyRange::new(Value::Int(1), Value::Int(500));
        assert_eq!(
            QueryGenerator::range("SELECT id FROM t", "id", &range),
            "WITH cte AS ( SELECT id FROM t ) SELECT * FROM cte WHERE id BETWEEN 1 AND 500 ORDER BY id ASC"
        );
    }
}
