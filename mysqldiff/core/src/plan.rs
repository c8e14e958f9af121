//! Plan assembly: the stable priority ordering, the banner, and the
//! conditional-index-procedure bracket.

use crate::{change::ChangeRecord, index_workaround::IndexWorkaround, options::DiffOptions};
use sql_schema_model::SqlSchema;
use std::cmp::Reverse;

pub(crate) fn assemble(
    mut changes: Vec<ChangeRecord>,
    workaround: &IndexWorkaround,
    source: &SqlSchema,
    target: &SqlSchema,
    options: &DiffOptions,
) -> String {
    // Stable sort: emission order is the tiebreaker within a bucket.
    changes.sort_by_key(|change| Reverse(change.priority));

    let mut out = String::new();

    if !options.list_tables {
        banner(&mut out, source, target, options);
    }

    if workaround.used() {
        out.push_str(&workaround.create_statement());
        out.push_str("\n\n");
    }

    for change in &changes {
        out.push_str(change.sql.trim_end());
        out.push_str("\n\n");
    }

    if workaround.used() {
        out.push_str(&workaround.drop_statement());
        out.push_str("\n\n");
    }

    normalize_trailing_newline(out)
}

pub(crate) fn join_statements(changes: &[ChangeRecord]) -> String {
    let mut out = String::new();
    for change in changes {
        out.push_str(change.sql.trim_end());
        out.push_str("\n\n");
    }
    normalize_trailing_newline(out)
}

fn normalize_trailing_newline(mut out: String) -> String {
    while out.ends_with("\n\n") {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn banner(out: &mut String, source: &SqlSchema, target: &SqlSchema, options: &DiffOptions) {
    out.push_str(&format!("## mysqldiff {}\n", env!("CARGO_PKG_VERSION")));
    out.push_str("##\n");
    if let Some(run_time) = &options.run_time {
        out.push_str(&format!("## Run on {run_time}\n"));
    }
    if !options.options_summary.is_empty() {
        out.push_str(&format!("## Options: {}\n", options.options_summary));
    }
    out.push_str("##\n");
    out.push_str(&format!("## --- {}\n", source.summary()));
    out.push_str(&format!("## +++ {}\n", target.summary()));
    out.push('\n');
}
