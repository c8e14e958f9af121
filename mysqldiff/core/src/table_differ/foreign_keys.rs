//! The foreign-key pass. Drops come early (weight 6), additions last
//! (weight 1); a changed constraint is recreated in place unless its columns
//! are going away, in which case the drop and the add straddle the column
//! work.

use super::TableDiffer;
use crate::change::ChangeRecord;
use sql_schema_model::foreign_key_parts;

impl TableDiffer<'_> {
    pub(super) fn diff_foreign_keys(&mut self, changes: &mut Vec<ChangeRecord>) {
        let source = self.source;
        let target = self.target;
        let table = source.name();

        for (name, source_clause) in source.foreign_keys() {
            match target.foreign_key(name) {
                Some(target_clause) if target_clause != source_clause => {
                    let drop = format!("ALTER TABLE {table} DROP FOREIGN KEY {name};");
                    let add = format!("ALTER TABLE {table} ADD CONSTRAINT {name} {target_clause};");

                    let columns_dropped = foreign_key_parts(source_clause)
                        .map(|parts| parts.columns.iter().any(|c| self.ctx.dropped_columns.contains(*c)))
                        .unwrap_or(false);

                    if columns_dropped {
                        changes.push(ChangeRecord::new(drop, 6));
                        changes.push(ChangeRecord::new(add, 5));
                    } else {
                        let priority = self.ctx.added_for_fk.get(name).copied().unwrap_or(5);
                        changes.push(ChangeRecord::new(format!("{drop}\n{add}"), priority));
                    }
                }
                Some(_) => {}
                None => {
                    changes.push(ChangeRecord::new(
                        format!("ALTER TABLE {table} DROP FOREIGN KEY {name};"),
                        6,
                    ));
                }
            }
        }

        for (name, clause) in target.foreign_keys() {
            if source.foreign_key(name).is_none() {
                changes.push(ChangeRecord::new(
                    format!("ALTER TABLE {table} ADD CONSTRAINT {name} {clause};"),
                    1,
                ));
            }
        }
    }
}
