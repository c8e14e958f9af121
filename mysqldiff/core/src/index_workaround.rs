//! The conditional index procedure.
//!
//! Several passes may independently decide to create or drop the same-named
//! index (auto-column backing, FK-collision covers, explicit diffs). MySQL
//! has no `CREATE INDEX IF NOT EXISTS`, so every ADD/DROP INDEX in the plan
//! is routed through a stored procedure that consults
//! `INFORMATION_SCHEMA.STATISTICS` and only then PREPAREs and EXECUTEs the
//! statement. Each step becomes idempotent without a global per-index
//! registry.

use crate::names::workaround_procedure_name;

#[derive(Debug)]
pub(crate) struct IndexWorkaround {
    name: String,
    used: bool,
}

impl IndexWorkaround {
    pub(crate) fn new(source_summary: &str, target_summary: &str) -> Self {
        IndexWorkaround {
            name: workaround_procedure_name(source_summary, target_summary),
            used: false,
        }
    }

    /// Whether any index operation went through the procedure. Decides if
    /// the CREATE/DROP PROCEDURE bracket is emitted at all.
    pub(crate) fn used(&self) -> bool {
        self.used
    }

    pub(crate) fn wrap_create(&mut self, table: &str, index: &str, statement: &str) -> String {
        self.wrap(table, index, statement, "create")
    }

    pub(crate) fn wrap_drop(&mut self, table: &str, index: &str, statement: &str) -> String {
        self.wrap(table, index, statement, "drop")
    }

    fn wrap(&mut self, table: &str, index: &str, statement: &str, action: &str) -> String {
        self.used = true;
        format!(
            "CALL {proc}('{table}','{index}','{statement}','{action}');",
            proc = self.name,
            statement = statement.replace('\'', "''"),
        )
    }

    pub(crate) fn create_statement(&self) -> String {
        format!(
            "DELIMITER ;;\n\
             CREATE PROCEDURE {name}(given_table VARCHAR(64), given_index VARCHAR(64), index_stmt TEXT, index_action VARCHAR(10))\n\
             BEGIN\n\
             \x20   DECLARE index_count INT;\n\
             \x20   SELECT COUNT(1) INTO index_count\n\
             \x20   FROM INFORMATION_SCHEMA.STATISTICS\n\
             \x20   WHERE table_schema = DATABASE()\n\
             \x20     AND table_name = given_table\n\
             \x20     AND index_name = given_index;\n\
             \x20   IF (index_action = 'create' AND index_count = 0)\n\
             \x20      OR (index_action = 'drop' AND index_count > 0) THEN\n\
             \x20       SET @index_stmt = index_stmt;\n\
             \x20       PREPARE stmt FROM @index_stmt;\n\
             \x20       EXECUTE stmt;\n\
             \x20       DEALLOCATE PREPARE stmt;\n\
             \x20   END IF;\n\
             END;;\n\
             DELIMITER ;",
            name = self.name,
        )
    }

    pub(crate) fn drop_statement(&self) -> String {
        format!("DROP PROCEDURE {};", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_marks_the_procedure_used_and_escapes_quotes() {
        let mut workaround = IndexWorkaround::new("a", "b");
        assert!(!workaround.used());

        let call = workaround.wrap_create("t", "ix", "ALTER TABLE t ADD INDEX ix (a);");
        assert!(workaround.used());
        assert!(call.starts_with("CALL workaround_"));
        assert!(call.ends_with("('t','ix','ALTER TABLE t ADD INDEX ix (a);','create');"));

        let call = workaround.wrap_drop("t", "ix", "ALTER TABLE t DROP INDEX ix;");
        assert!(call.contains("','drop');"));
    }

    #[test]
    fn procedure_bracket_is_well_formed() {
        let workaround = IndexWorkaround::new("a", "b");
        let create = workaround.create_statement();

        assert!(create.contains("INFORMATION_SCHEMA.STATISTICS"));
        assert!(create.contains("PREPARE stmt FROM @index_stmt"));
        assert!(create.starts_with("DELIMITER ;;"));
        assert!(workaround.drop_statement().starts_with("DROP PROCEDURE workaround_"));
    }
}
