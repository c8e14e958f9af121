//! The options-and-partitions pass, and the scaffolding cleanup.
//!
//! Partitioning cannot be altered in place together with other options:
//! existing partitioning is removed first (early), the plain options are
//! applied, and the partitioned options are re-applied at the very end so
//! partitioning lands on the final table shape.

use super::TableDiffer;
use crate::{change::ChangeRecord, compare, index_workaround::IndexWorkaround};

impl TableDiffer<'_> {
    pub(super) fn diff_table_options(&mut self, changes: &mut Vec<ChangeRecord>, workaround: &mut IndexWorkaround) {
        let source = self.source;
        let target = self.target;
        let table = source.name();

        // Scaffolding cleanup: every temporary index still standing goes
        // last. One whose column was dropped is already gone; one that backs
        // a live foreign key stays.
        let temporary: Vec<(String, String)> = self
            .ctx
            .temporary_indexes
            .iter()
            .map(|(index, column)| (index.clone(), column.clone()))
            .collect();
        for (index, column) in temporary {
            if self.ctx.dropped_columns.contains(&column) || self.ctx.preserved_indexes.contains(&index) {
                continue;
            }
            let statement = format!("ALTER TABLE {table} DROP INDEX {index};");
            changes.push(ChangeRecord::new(workaround.wrap_drop(table, &index, &statement), 0));
        }

        if compare::options_equal(source.options(), target.options(), self.options.tolerant) {
            return;
        }

        let (target_base, target_partition) = compare::split_partition(target.options());
        let (_, source_partition) = compare::split_partition(source.options());
        let target_base = compare::with_comment_reset(target_base, source.options());

        if source_partition.is_some() && source_partition != target_partition {
            changes.push(ChangeRecord::new(format!("ALTER TABLE {table} REMOVE PARTITIONING;"), 8));
        }

        if !target_base.is_empty() {
            let mut sql = format!("ALTER TABLE {table} {target_base};");
            sql.push_str(&self.old_def_comment(source.options()));
            changes.push(ChangeRecord::new(sql, 8));
        }

        if let Some(partition) = target_partition {
            let full = if target_base.is_empty() {
                partition.to_owned()
            } else {
                format!("{target_base} {partition}")
            };
            changes.push(ChangeRecord::new(format!("ALTER TABLE {table} {full};"), 0));
        }
    }
}
