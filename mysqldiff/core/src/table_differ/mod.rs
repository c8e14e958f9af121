//! Pair-level diffing: five passes over a (source, target) table pair.
//!
//! The passes run in a fixed order — fields, indexes, primary key, foreign
//! keys, options — and coordinate through [`DifferContext`]: the index pass
//! observes the field pass's auto-increment decisions, the primary-key pass
//! picks up the pending fused CHANGE COLUMN, the options pass drops the
//! accumulated scaffolding indexes.

mod context;
mod fields;
mod foreign_keys;
mod indexes;
mod primary_key;
mod table_options;

use crate::{change::ChangeRecord, compare, index_workaround::IndexWorkaround, names, options::DiffOptions};
use context::DifferContext;
use sql_schema_model::Table;

pub(crate) struct TableDiffer<'a> {
    source: &'a Table,
    target: &'a Table,
    options: &'a DiffOptions,
    ctx: DifferContext,
}

impl<'a> TableDiffer<'a> {
    pub(crate) fn diff(
        source: &'a Table,
        target: &'a Table,
        options: &'a DiffOptions,
        workaround: &mut IndexWorkaround,
    ) -> Vec<ChangeRecord> {
        let _span = tracing::debug_span!("diff_table", table = %source.name()).entered();

        let mut differ = TableDiffer {
            source,
            target,
            options,
            ctx: DifferContext::default(),
        };
        let mut changes = Vec::new();

        differ.diff_fields(&mut changes);
        differ.diff_indices(&mut changes, workaround);
        differ.diff_primary_key(&mut changes, workaround);
        differ.diff_foreign_keys(&mut changes);
        differ.diff_table_options(&mut changes, workaround);

        changes
    }

    fn old_def_comment(&self, old: &str) -> String {
        if self.options.no_old_defs {
            String::new()
        } else {
            format!(" # was {old}")
        }
    }

    /// Whether `column` carries a timestamp default, either recorded by the
    /// fields pass or present on the target side.
    fn is_timestamp_part(&self, column: &str) -> bool {
        self.ctx.timestamps.contains(column)
            || self
                .target
                .field(column)
                .map(compare::has_timestamp_default)
                .unwrap_or(false)
    }

    /// Emits the backing index that keeps an auto-increment column indexed
    /// across transitional steps. Idempotent per column.
    fn index_auto_col(
        &mut self,
        column: &str,
        priority: u8,
        workaround: &mut IndexWorkaround,
        changes: &mut Vec<ChangeRecord>,
    ) {
        let table = self.source.name();
        let index = names::auto_index_name(table, column);
        if self.ctx.temporary_indexes.contains_key(&index) {
            return;
        }

        let statement = format!("ALTER TABLE {table} ADD INDEX {index} ({column});");
        changes.push(ChangeRecord::new(
            workaround.wrap_create(table, &index, &statement),
            priority,
        ));
        self.ctx.temporary_indexes.insert(index, column.to_owned());
    }

    /// Adds `temp_<hash>` cover indexes for every listed column that is
    /// FK-referenced on either side and still exists on the target, so the
    /// constraint keeps a backing index while other index work is in flight.
    fn cover_fk_parts(
        &mut self,
        parts: &[&str],
        priority: u8,
        workaround: &mut IndexWorkaround,
        changes: &mut Vec<ChangeRecord>,
    ) {
        let source = self.source;
        let target = self.target;
        let table = source.name();

        for part in parts {
            let referenced =
                !source.foreign_keys_by_col(part).is_empty() || !target.foreign_keys_by_col(part).is_empty();
            if !referenced || target.field(part).is_none() {
                continue;
            }

            let cover = names::temp_index_name(part);
            if self.ctx.temporary_indexes.contains_key(&cover) {
                continue;
            }

            let statement = format!("ALTER TABLE {table} ADD INDEX {cover} ({part});");
            changes.push(ChangeRecord::new(
                workaround.wrap_create(table, &cover, &statement),
                priority,
            ));
            self.ctx.temporary_indexes.insert(cover, (*part).to_owned());
        }
    }
}
