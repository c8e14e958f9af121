//! The fields pass: CHANGE, DROP and ADD COLUMN, plus the cross-cutting
//! decisions the later passes build on.
//!
//! Columns are processed with auto-increment columns last, so that when a
//! composite primary key is attached to the final participating column the
//! server sees the complete key and the auto-increment column in one
//! statement.

use super::context::{AddedIndex, EmptyCharChange};
use super::TableDiffer;
use crate::{change::ChangeRecord, compare};

impl TableDiffer<'_> {
    pub(super) fn diff_fields(&mut self, changes: &mut Vec<ChangeRecord>) {
        let source = self.source;
        let target = self.target;
        let table = source.name();
        let tolerant = self.options.tolerant;

        let pk_changed = source.primary_key() != target.primary_key();

        // New-key columns that only exist on the target side. When there are
        // any, the ADD COLUMN of the last one carries the ADD PRIMARY KEY;
        // otherwise the last changed key column does.
        let new_pk_fields: Vec<&str> = target
            .primary_parts()
            .into_iter()
            .filter(|part| source.field(part).is_none())
            .collect();

        let mut source_columns: Vec<&str> = source.fields().keys().map(String::as_str).collect();
        source_columns.sort_by_key(|column| target.field(column).map(compare::has_auto_increment).unwrap_or(false));

        let last_changed_pk_col: Option<&str> = source_columns
            .iter()
            .copied()
            .filter(|column| match (source.field(column), target.field(column)) {
                (Some(f1), Some(f2)) => {
                    !compare::fields_equal(f1, f2, tolerant)
                        && target.is_primary(column)
                        && !source.is_primary(column)
                }
                _ => false,
            })
            .last();

        for column in source_columns {
            let f1 = source.field(column).expect("column from the source field list");

            let Some(f2) = target.field(column) else {
                let mut sql = format!("ALTER TABLE {table} DROP COLUMN {column};");
                sql.push_str(&self.old_def_comment(f1));
                changes.push(ChangeRecord::new(sql, 2));
                self.ctx.dropped_columns.insert(column.to_owned());
                continue;
            };

            if compare::fields_equal(f1, f2, tolerant) {
                continue;
            }

            let source_pk = source.is_primary(column);
            let target_pk = target.is_primary(column);

            let mut pk_clause = String::new();
            if target_pk && !source_pk {
                if target.primary_parts().len() == 1 {
                    pk_clause = " PRIMARY KEY".to_owned();
                } else if new_pk_fields.is_empty() && last_changed_pk_col == Some(column) {
                    pk_clause = format!(
                        ", ADD PRIMARY KEY {}",
                        target.primary_key().expect("primary parts imply a primary key")
                    );
                }
                if !pk_clause.is_empty() {
                    self.ctx.added_pk = true;
                }
            }

            let mut weight = 5;

            // An old key column going nullable has to wait for the key drop.
            if source_pk && f2.to_ascii_uppercase().contains("DEFAULT NULL") {
                weight = 3;
            }

            // The change of an auto-increment key column rides inside the
            // DROP PRIMARY KEY statement instead.
            if source_pk && pk_changed && compare::has_auto_increment(f1) {
                self.ctx.changed_pk_auto_col = Some(format!("CHANGE COLUMN {column} {column} {f2}"));
                continue;
            }

            // A plain column turning auto-increment needs a backing index
            // first; the index pass owes us one.
            if compare::has_auto_increment(f2) && !source_pk && pk_clause != " PRIMARY KEY" {
                self.ctx.added_index = Some(AddedIndex {
                    field: column.to_owned(),
                    is_new: false,
                    definition: f2.to_owned(),
                });
            }

            if compare::has_timestamp_default(f2) {
                weight = 1;
                self.ctx.timestamps.insert(column.to_owned());
            }

            if compare::is_empty_char(f2) {
                self.ctx.changed_to_empty_char_col = Some(EmptyCharChange {
                    field: column.to_owned(),
                    weight,
                });
            }

            let mut sql = format!("ALTER TABLE {table} CHANGE COLUMN {column} {column} {f2}{pk_clause};");
            sql.push_str(&self.old_def_comment(f1));
            changes.push(ChangeRecord::new(sql, weight));
        }

        self.add_columns(changes);
    }

    fn add_columns(&mut self, changes: &mut Vec<ChangeRecord>) {
        let source = self.source;
        let target = self.target;
        let table = source.name();

        let mut added_columns: Vec<&str> = target
            .fields()
            .keys()
            .map(String::as_str)
            .filter(|column| source.field(column).is_none())
            .collect();
        added_columns.sort_by_key(|column| {
            compare::has_auto_increment(target.field(column).expect("column from the target field list"))
        });

        let last_added_pk_col: Option<&str> = added_columns
            .iter()
            .copied()
            .filter(|column| target.is_primary(column))
            .last();

        let mut reorder_from: Vec<(String, u8)> = Vec::new();

        for column in added_columns {
            let f2 = target.field(column).expect("column from the target field list");
            let is_pk = target.is_primary(column);

            let (prev, _) = target.field_links(column);
            let mut needs_reorder = false;
            let position = match prev {
                None => " FIRST".to_owned(),
                Some(prev) if source.field(prev).is_some() || self.ctx.added_cols.contains(prev) => {
                    format!(" AFTER {prev}")
                }
                Some(_) => {
                    // The anchor column does not exist yet; append now and
                    // fix the order afterwards.
                    needs_reorder = true;
                    String::new()
                }
            };

            let mut weight = 6;
            let mut inline_pk = "";
            let mut append_pk = String::new();

            if is_pk && last_added_pk_col == Some(column) {
                if target.primary_parts().len() == 1 {
                    inline_pk = " PRIMARY KEY";
                } else {
                    append_pk = format!(
                        ", ADD PRIMARY KEY {}",
                        target.primary_key().expect("primary parts imply a primary key")
                    );
                }
                self.ctx.added_pk = true;
                self.ctx.added_pk_col = Some(column.to_owned());
                weight = 1;
            }

            let mut definition = f2.to_owned();
            if compare::has_auto_increment(f2) && !is_pk {
                // Added without AUTO_INCREMENT; the index pass creates the
                // backing index and restores the clause.
                definition = compare::strip_auto_increment(f2);
                self.ctx.added_index = Some(AddedIndex {
                    field: column.to_owned(),
                    is_new: true,
                    definition: f2.to_owned(),
                });
            }

            if compare::has_timestamp_default(f2) {
                weight = 1;
                self.ctx.timestamps.insert(column.to_owned());
                needs_reorder = true;
            }

            for fk_name in target.foreign_keys_by_col(column).keys() {
                self.ctx.added_for_fk.insert((*fk_name).to_owned(), weight);
            }

            let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}{inline_pk}{position}{append_pk};");
            changes.push(ChangeRecord::new(sql, weight));
            self.ctx.added_cols.insert(column.to_owned());

            if needs_reorder {
                reorder_from.push((column.to_owned(), weight));
            }
        }

        for (from, weight) in reorder_from {
            self.reorder_trailing_columns(&from, weight, changes);
        }
    }

    /// Re-issues CHANGE COLUMN with a position hint for every column added
    /// after `from` in target declaration order, so the final order matches
    /// the target even when the adds could not anchor themselves.
    fn reorder_trailing_columns(&self, from: &str, weight: u8, changes: &mut Vec<ChangeRecord>) {
        let target = self.target;
        let table = self.source.name();
        let mut cursor = from.to_owned();

        loop {
            let (_, next) = target.field_links(&cursor);
            let Some(next) = next else { break };
            let next = next.to_owned();

            if self.ctx.added_cols.contains(&next) {
                let stripped_auto = self
                    .ctx
                    .added_index
                    .as_ref()
                    .map(|added| added.is_new && added.field == next)
                    .unwrap_or(false);
                let definition = target.field(&next).expect("column from the target field list");
                let definition = if stripped_auto {
                    compare::strip_auto_increment(definition)
                } else {
                    definition.to_owned()
                };
                let (prev, _) = target.field_links(&next);
                let position = prev.map(|p| format!(" AFTER {p}")).unwrap_or_default();

                changes.push(ChangeRecord::new(
                    format!("ALTER TABLE {table} CHANGE COLUMN {next} {next} {definition}{position};"),
                    weight,
                ));
            }

            cursor = next;
        }
    }
}
