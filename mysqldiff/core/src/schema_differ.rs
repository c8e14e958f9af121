//! The top-level diff driver.
//!
//! Walks source tables, routines and views in declaration order (changes and
//! drops), then the target's in its declaration order (creations), so the
//! emitted plan is deterministic for any input pair. Common tables delegate
//! to the pair-level differ.

use crate::{
    change::ChangeRecord, index_workaround::IndexWorkaround, options::DiffOptions, plan, table_differ::TableDiffer,
};
use sql_schema_model::{Routine, SqlSchema, View};

/// Computes the upgrade plan that transforms `source`'s structure into
/// `target`'s.
pub fn diff(source: &SqlSchema, target: &SqlSchema, options: &DiffOptions) -> String {
    let mut workaround = IndexWorkaround::new(source.summary(), target.summary());
    let mut changes: Vec<ChangeRecord> = Vec::new();

    // First pass: the source side — changed pairs and drops.
    for (name, table) in &source.tables {
        if !options.table_matches(name) {
            continue;
        }

        match target.table(name) {
            Some(target_table) => {
                changes.extend(TableDiffer::diff(table, target_table, options, &mut workaround));
            }
            None if target.view(name).is_some() => {
                // A view takes this table's place; the view creation drops
                // the table itself.
                tracing::debug!(table = %name, "table becomes a view, suppressing the drop");
            }
            None => {
                if !(options.only_both || options.keep_old_tables) {
                    let sql = format!("{}DROP TABLE {name};", change_header(options, name, "drop_table", &[]));
                    changes.push(ChangeRecord::new(sql, 8));
                }
            }
        }
    }

    for (name, routine) in &source.routines {
        if target.routine(name).is_none() && !(options.only_both || options.keep_old_tables) {
            let sql = format!(
                "{}DROP {} {name};",
                change_header(options, name, "drop_routine", &[]),
                routine.kind(),
            );
            changes.push(ChangeRecord::new(sql, 8));
        }
    }

    for name in source.views.keys() {
        if target.view(name).is_none() && !(options.only_both || options.keep_old_tables) {
            let sql = format!("{}DROP VIEW {name};", change_header(options, name, "drop_view", &[]));
            changes.push(ChangeRecord::new(sql, 8));
        }
    }

    // Second pass: the target side — creations, and view/routine changes.
    for (name, table) in &target.tables {
        if !options.table_matches(name) || source.table(name).is_some() || options.only_both {
            continue;
        }

        let referenced: Vec<&str> = table.fk_tables().into_iter().collect();
        let sql = format!(
            "{}{}",
            change_header(options, name, "add_table", &referenced),
            table.def_without_foreign_keys(),
        );
        changes.push(ChangeRecord::new(sql, 6));

        // The constraints go in last, when every referenced table exists.
        for (fk_name, clause) in table.foreign_keys() {
            changes.push(ChangeRecord::new(
                format!("ALTER TABLE {name} ADD CONSTRAINT {fk_name} {clause};"),
                1,
            ));
        }
    }

    for (name, view) in &target.views {
        match source.view(name) {
            None => {
                if options.only_both {
                    continue;
                }
                // The placeholder table reserves the name and column shape so
                // other views and FK work can reference it before the real
                // definition lands.
                if source.table(name).is_none() {
                    if let Some(placeholder) = target.view_placeholder(name) {
                        let sql = format!("{}{placeholder}", change_header(options, name, "add_view", &[]));
                        changes.push(ChangeRecord::new(sql, 9));
                    }
                }
                changes.push(ChangeRecord::new(
                    format!("DROP TABLE IF EXISTS {name};\n{}", view.definition()),
                    5,
                ));
            }
            Some(old) if views_differ(old, view) => {
                changes.push(ChangeRecord::new(render_alter_view(view), 5));
            }
            Some(_) => {}
        }
    }

    for (name, routine) in &target.routines {
        match source.routine(name) {
            None => {
                if options.only_both {
                    continue;
                }
                let sql = format!(
                    "{}{}",
                    change_header(options, name, "add_routine", &[]),
                    render_create_routine(routine),
                );
                changes.push(ChangeRecord::new(sql, 5));
            }
            Some(old) if routines_differ(old, routine) => {
                changes.push(ChangeRecord::new(
                    format!(
                        "DROP {} IF EXISTS {name};\n{}",
                        routine.kind(),
                        render_create_routine(routine)
                    ),
                    5,
                ));
            }
            Some(_) => {}
        }
    }

    plan::assemble(changes, &workaround, source, target, options)
}

/// The structured comment block prefixed to schema-level operations when
/// `list-tables` is enabled.
pub(crate) fn change_header(options: &DiffOptions, name: &str, action: &str, referenced: &[&str]) -> String {
    #[derive(serde::Serialize)]
    struct ChangeHeader<'a> {
        name: &'a str,
        action_type: &'a str,
        referenced_tables: &'a [&'a str],
    }

    if !options.list_tables {
        return String::new();
    }

    let header = ChangeHeader {
        name,
        action_type: action,
        referenced_tables: referenced,
    };
    format!(
        "-- {}\n",
        serde_json::to_string(&header).expect("header serialization cannot fail")
    )
}

fn views_differ(old: &View, new: &View) -> bool {
    old.fields() != new.fields()
        || old.select_body() != new.select_body()
        || old.algorithm() != new.algorithm()
        || old.security() != new.security()
        || old.trail() != new.trail()
}

fn render_alter_view(view: &View) -> String {
    let mut sql = format!(
        "ALTER ALGORITHM={algorithm} DEFINER=CURRENT_USER SQL SECURITY {security} VIEW {name}",
        algorithm = view.algorithm(),
        security = view.security(),
        name = view.name(),
    );

    if !view.fields().is_empty() {
        sql.push_str(&format!(" ({})", view.fields()));
    }

    sql.push_str(" AS ");
    sql.push_str(view.select_body());

    if !view.trail().is_empty() {
        sql.push(' ');
        sql.push_str(view.trail());
    }

    sql.push(';');
    sql
}

fn routines_differ(old: &Routine, new: &Routine) -> bool {
    (old.options(), old.body(), old.params()) != (new.options(), new.body(), new.params())
}

fn render_create_routine(routine: &Routine) -> String {
    format!("DELIMITER ;;\n{};;\nDELIMITER ;", routine.definition())
}
