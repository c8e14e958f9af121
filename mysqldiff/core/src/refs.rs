//! The reference-closure driver: lists the selected tables and,
//! transitively, every table they depend on through foreign keys.
//!
//! This is a listing, not a diff, and the two drivers stay separate: only
//! this one de-duplicates through a visited set.

use crate::{change::ChangeRecord, options::DiffOptions, plan, schema_differ::change_header};
use sql_schema_model::{SqlSchema, Table};
use std::collections::BTreeSet;

/// Emits the definitions of every table matching the filter, plus the
/// transitive closure of their FK-referenced tables, each exactly once.
pub fn reference_closure(schema: &SqlSchema, options: &DiffOptions) -> String {
    let mut used_tables: BTreeSet<&str> = BTreeSet::new();
    let mut changes: Vec<ChangeRecord> = Vec::new();

    for (name, table) in &schema.tables {
        if !options.table_matches(name) {
            continue;
        }
        add_ref_table(schema, table, options, &mut used_tables, &mut changes);
    }

    plan::join_statements(&changes)
}

fn add_ref_table<'a>(
    schema: &'a SqlSchema,
    table: &'a Table,
    options: &DiffOptions,
    used_tables: &mut BTreeSet<&'a str>,
    changes: &mut Vec<ChangeRecord>,
) {
    if !used_tables.insert(table.name()) {
        return;
    }

    let referenced: Vec<&str> = table.fk_tables().into_iter().collect();
    let sql = format!(
        "{}{}",
        change_header(options, table.name(), "add_table", &referenced),
        table.def(),
    );
    changes.push(ChangeRecord::new(sql, 6));

    for reference in referenced {
        match schema.table(reference) {
            Some(referenced_table) => add_ref_table(schema, referenced_table, options, used_tables, changes),
            None => tracing::debug!(table = %reference, "foreign key references an unknown table"),
        }
    }
}
