//! The indexes pass: rebuilds, drops and additions, FK-name collisions, and
//! the backing indexes that keep auto-increment columns covered.
//!
//! All ADD/DROP INDEX statements are wrapped by the conditional index
//! procedure: several passes may decide to create or drop the same-named
//! index, and the wrapper makes each step idempotent.

use super::TableDiffer;
use crate::{change::ChangeRecord, compare, index_workaround::IndexWorkaround, names};
use itertools::Itertools;
use sql_schema_model::IndexDef;

impl TableDiffer<'_> {
    pub(super) fn diff_indices(&mut self, changes: &mut Vec<ChangeRecord>, workaround: &mut IndexWorkaround) {
        let source = self.source;
        let target = self.target;
        let table = source.name();

        for (index_name, src_def) in source.indices() {
            let source_fk = source.foreign_key(index_name);
            let target_fk = target.foreign_key(index_name);

            // An index named like an FK constraint is managed implicitly by
            // MySQL as the constraint comes and goes. When the constraint
            // changes, cover the columns and drop the index explicitly; the
            // FK recreate re-establishes it.
            let fk_coupled = match (source_fk, target_fk) {
                (Some(a), Some(b)) => a != b,
                (Some(_), None) | (None, Some(_)) => true,
                (None, None) => false,
            };

            if fk_coupled {
                let suffix = match (source_fk, target_fk) {
                    (Some(_), Some(_)) => "change",
                    (Some(_), None) => "drop",
                    _ => "add",
                };

                let parts = src_def.parts();
                let priority = if parts.iter().any(|p| self.ctx.added_pk_col.as_deref() == Some(*p)) {
                    1
                } else if self.ctx.added_for_fk.contains_key(index_name) {
                    5
                } else {
                    6
                };

                let surviving = target.index(index_name);

                if !parts.is_empty() {
                    let cover = names::fk_cover_index_name(&parts.iter().join(","), suffix);
                    if !self.ctx.temporary_indexes.contains_key(&cover) {
                        let statement =
                            format!("ALTER TABLE {table} ADD INDEX {cover} ({});", parts.iter().join(", "));
                        changes.push(ChangeRecord::new(
                            workaround.wrap_create(table, &cover, &statement),
                            priority,
                        ));
                        // With no named index of its own in the target, the
                        // new constraint ends up backed by the cover, which
                        // then has to outlive the cleanup.
                        if suffix == "add" && surviving.is_none() {
                            self.ctx.preserved_indexes.insert(cover.clone());
                        }
                        self.ctx.temporary_indexes.insert(cover, parts[0].to_owned());
                    }
                }

                let statement = format!("ALTER TABLE {table} DROP INDEX {index_name};");
                changes.push(ChangeRecord::new(
                    workaround.wrap_drop(table, index_name, &statement),
                    priority,
                ));

                // The target still declares an index under this name:
                // restore its definition once the constraint work is done,
                // so the cover can be retired without stranding the column.
                if let Some(tgt_def) = surviving {
                    let statement = render_add_index(table, index_name, tgt_def);
                    changes.push(ChangeRecord::new(
                        workaround.wrap_create(table, index_name, &statement),
                        3,
                    ));
                }
                continue;
            }

            let tgt_def = target.index(index_name);
            if tgt_def.map(|t| t == src_def).unwrap_or(false) {
                continue;
            }

            let parts = src_def.parts();
            let priority = self.index_op_priority(&parts, 3);

            // Keep auto-increment parts indexed through the rebuild.
            for part in &parts {
                if source.field(part).map(compare::has_auto_increment).unwrap_or(false) {
                    self.index_auto_col(part, priority, workaround, changes);
                }
            }
            self.cover_fk_parts(&parts, priority, workaround, changes);

            let all_dropped = !parts.is_empty() && parts.iter().all(|p| self.ctx.dropped_columns.contains(*p));

            match tgt_def {
                Some(tgt_def) => {
                    let mut sql = String::new();
                    if !all_dropped {
                        let statement = format!("ALTER TABLE {table} DROP INDEX {index_name};");
                        sql.push_str(&workaround.wrap_drop(table, index_name, &statement));
                        sql.push('\n');
                    }
                    let statement = render_add_index(table, index_name, tgt_def);
                    sql.push_str(&workaround.wrap_create(table, index_name, &statement));
                    changes.push(ChangeRecord::new(sql, priority));
                }
                None => {
                    if !all_dropped {
                        let statement = format!("ALTER TABLE {table} DROP INDEX {index_name};");
                        changes.push(ChangeRecord::new(
                            workaround.wrap_drop(table, index_name, &statement),
                            priority,
                        ));
                    }
                }
            }
        }

        for (index_name, tgt_def) in target.indices() {
            if source.index(index_name).is_some() {
                continue;
            }

            // When the constraint exists unchanged on both sides, MySQL's
            // implicit index creation suffices.
            if let (Some(a), Some(b)) = (source.foreign_key(index_name), target.foreign_key(index_name)) {
                if a == b {
                    continue;
                }
            }

            let parts = tgt_def.parts();
            let mut priority = self.index_op_priority(&parts, 3);
            if parts.iter().any(|p| target.is_primary(p)) {
                priority = 1;
            }

            self.cover_fk_parts(&parts, priority, workaround, changes);

            let statement = render_add_index(table, index_name, tgt_def);
            changes.push(ChangeRecord::new(
                workaround.wrap_create(table, index_name, &statement),
                priority,
            ));
        }

        // The backing index owed to the fields pass: an auto-increment
        // column that is not otherwise indexed yet.
        if let Some(added) = self.ctx.added_index.take() {
            let index = names::auto_index_name(table, &added.field);
            let restore = added.is_new.then(|| {
                format!(
                    "ALTER TABLE {table} CHANGE COLUMN {field} {field} {definition};",
                    field = added.field,
                    definition = added.definition,
                )
            });

            if self.ctx.temporary_indexes.contains_key(&index) {
                if let Some(restore) = restore {
                    changes.push(ChangeRecord::new(restore, 5));
                }
            } else {
                let statement = format!("ALTER TABLE {table} ADD INDEX {index} ({});", added.field);
                let mut sql = workaround.wrap_create(table, &index, &statement);
                if let Some(restore) = restore {
                    sql.push('\n');
                    sql.push_str(&restore);
                }
                changes.push(ChangeRecord::new(sql, 6));
                self.ctx.temporary_indexes.insert(index, added.field);
            }
        }
    }

    /// Base priority for an index operation: timestamp parts sink it to the
    /// bottom, a CHAR(0) conversion chains it behind the column change.
    fn index_op_priority(&self, parts: &[&str], base: u8) -> u8 {
        if let Some(empty_char) = &self.ctx.changed_to_empty_char_col {
            if parts.contains(&empty_char.field.as_str()) {
                return empty_char.weight;
            }
        }
        if parts.iter().any(|p| self.is_timestamp_part(p)) {
            return 1;
        }
        base
    }
}

fn render_add_index(table: &str, index_name: &str, def: &IndexDef) -> String {
    let options = if def.options.is_empty() {
        String::new()
    } else {
        format!(" {}", def.options)
    };

    format!(
        "ALTER TABLE {table} ADD {kind} {index_name} {columns}{options};",
        kind = def.kind(),
        columns = def.columns,
    )
}
