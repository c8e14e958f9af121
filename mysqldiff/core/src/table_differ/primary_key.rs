//! The primary-key pass.
//!
//! A DROP PRIMARY KEY must never strand an auto-increment column without an
//! index: backing indexes go in first, and when the old key column itself
//! loses AUTO_INCREMENT, the fields pass left us the CHANGE COLUMN to fuse
//! into the drop statement.

use super::TableDiffer;
use crate::{change::ChangeRecord, compare, index_workaround::IndexWorkaround};

impl TableDiffer<'_> {
    pub(super) fn diff_primary_key(&mut self, changes: &mut Vec<ChangeRecord>, workaround: &mut IndexWorkaround) {
        let source = self.source;
        let target = self.target;
        let table = source.name();

        let source_pk = source.primary_key();
        let target_pk = target.primary_key();

        match (source_pk, target_pk) {
            (None, Some(pk)) => {
                // The fields pass may have attached the key to a column DDL
                // already.
                if !self.ctx.added_pk {
                    changes.push(ChangeRecord::new(format!("ALTER TABLE {table} ADD PRIMARY KEY {pk};"), 3));
                }
            }
            (Some(old_pk), _) if target_pk != Some(old_pk) => {
                let parts = source.primary_parts();
                let all_dropped = !parts.is_empty() && parts.iter().all(|p| self.ctx.dropped_columns.contains(*p));

                let priority: u8 = match target_pk {
                    None => 4,
                    // The new key column is already in place: do all the
                    // drop work up front.
                    Some(_) if self.ctx.added_pk => 8,
                    Some(_) if all_dropped => 0,
                    Some(_) => 4,
                };

                if !all_dropped {
                    for part in &parts {
                        if target.field(part).map(compare::has_auto_increment).unwrap_or(false) {
                            self.index_auto_col(part, priority, workaround, changes);
                        }
                    }
                    self.cover_fk_parts(&parts, priority, workaround, changes);
                }

                let fused = self
                    .ctx
                    .changed_pk_auto_col
                    .take()
                    .map(|tail| format!(", {tail}"))
                    .unwrap_or_default();

                match target_pk {
                    None => {
                        if !all_dropped {
                            changes.push(ChangeRecord::new(
                                format!("ALTER TABLE {table} DROP PRIMARY KEY{fused};"),
                                priority,
                            ));
                        }
                    }
                    Some(new_pk) => {
                        if all_dropped {
                            // The old key vanishes with its columns; only
                            // the new one remains to be installed, after
                            // everything else.
                            if !self.ctx.added_pk {
                                changes.push(ChangeRecord::new(
                                    format!("ALTER TABLE {table} ADD PRIMARY KEY {new_pk};"),
                                    priority,
                                ));
                            }
                        } else if self.ctx.added_pk {
                            changes.push(ChangeRecord::new(
                                format!("ALTER TABLE {table} DROP PRIMARY KEY{fused};"),
                                priority,
                            ));
                        } else {
                            changes.push(ChangeRecord::new(
                                format!("ALTER TABLE {table} DROP PRIMARY KEY{fused}, ADD PRIMARY KEY {new_pk};"),
                                priority,
                            ));
                        }
                    }
                }
            }
            _ => {}
        }
    }
}
