//! A read-only model of a MySQL schema — tables, views and stored routines in
//! declaration order — as parsed from a `mysqldump`-style SQL text.
//!
//! The model stores column and index definitions as the canonical text MySQL
//! echoes back (`SHOW CREATE TABLE` form). The diffing engine compares and
//! re-emits these fragments verbatim, so nothing here interprets types beyond
//! what ordering and dependency analysis require.

mod parse;

pub use parse::{parse_dump, ParseError, ParseOptions};

use indexmap::IndexMap;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// A database schema. Iteration order over tables, views and routines is the
/// declaration order of the dump it was parsed from.
#[derive(Debug, Clone, Default)]
pub struct SqlSchema {
    summary: String,
    pub tables: IndexMap<String, Table>,
    pub views: IndexMap<String, View>,
    pub routines: IndexMap<String, Routine>,
}

impl SqlSchema {
    /// A one-line description of where the schema came from, e.g.
    /// `file: production.sql`. Echoed in the plan banner.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = summary.into();
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.get(name)
    }

    pub fn routine(&self, name: &str) -> Option<&Routine> {
        self.routines.get(name)
    }

    /// A `CREATE TABLE` standing in for the view's column shape, in the style
    /// of mysqldump's view stand-ins. Creating the placeholder before the
    /// real `CREATE VIEW` breaks forward references from views to tables or
    /// views that only exist later in the plan.
    pub fn view_placeholder(&self, name: &str) -> Option<String> {
        let view = self.views.get(name)?;
        let columns = view
            .field_names()
            .into_iter()
            .map(|field| format!("  {field} tinyint NOT NULL"))
            .join(",\n");

        Some(format!("CREATE TABLE {name} (\n{columns}\n);", name = view.name()))
    }
}

/// A single table: columns, primary key, secondary indexes, foreign keys and
/// the trailing options, all in the textual form of the dump.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub(crate) name: String,
    /// Column name → type-and-clauses text (`int(11) NOT NULL DEFAULT '0'`).
    /// Map order is declaration order.
    pub(crate) fields: IndexMap<String, String>,
    /// The parenthesized column list of the primary key, as written.
    pub(crate) primary_key: Option<String>,
    pub(crate) indices: IndexMap<String, IndexDef>,
    /// Constraint name → `FOREIGN KEY (…) REFERENCES …` clause text.
    pub(crate) foreign_keys: IndexMap<String, String>,
    /// Trailing table options (`ENGINE=… DEFAULT CHARSET=… PARTITION BY …`).
    pub(crate) options: String,
    /// The full `CREATE TABLE` statement.
    pub(crate) def: String,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn def(&self) -> &str {
        &self.def
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    /// The previous and next column in declaration order, or `(None, None)`
    /// for an unknown column.
    pub fn field_links(&self, name: &str) -> (Option<&str>, Option<&str>) {
        match self.fields.get_index_of(name) {
            Some(ix) => {
                let prev = ix
                    .checked_sub(1)
                    .and_then(|p| self.fields.get_index(p))
                    .map(|(k, _)| k.as_str());
                let next = self.fields.get_index(ix + 1).map(|(k, _)| k.as_str());
                (prev, next)
            }
            None => (None, None),
        }
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// The columns participating in the primary key, in key order.
    pub fn primary_parts(&self) -> Vec<&str> {
        self.primary_key.as_deref().map(column_list).unwrap_or_default()
    }

    pub fn is_primary(&self, column: &str) -> bool {
        self.primary_parts().contains(&column)
    }

    pub fn indices(&self) -> &IndexMap<String, IndexDef> {
        &self.indices
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indices.get(name)
    }

    pub fn index_parts(&self, name: &str) -> Vec<&str> {
        self.indices
            .get(name)
            .map(|index| column_list(&index.columns))
            .unwrap_or_default()
    }

    pub fn foreign_keys(&self) -> &IndexMap<String, String> {
        &self.foreign_keys
    }

    pub fn foreign_key(&self, name: &str) -> Option<&str> {
        self.foreign_keys.get(name).map(|s| s.as_str())
    }

    pub fn is_foreign_key(&self, name: &str) -> bool {
        self.foreign_keys.contains_key(name)
    }

    /// The foreign keys whose constrained columns include `column`, in
    /// declaration order.
    pub fn foreign_keys_by_col(&self, column: &str) -> IndexMap<&str, &str> {
        self.foreign_keys
            .iter()
            .filter(|(_, clause)| {
                foreign_key_parts(clause)
                    .map(|parts| parts.columns.contains(&column))
                    .unwrap_or(false)
            })
            .map(|(name, clause)| (name.as_str(), clause.as_str()))
            .collect()
    }

    /// Names of the tables this table references through its foreign keys.
    pub fn fk_tables(&self) -> BTreeSet<&str> {
        self.foreign_keys
            .values()
            .filter_map(|clause| foreign_key_parts(clause))
            .map(|parts| parts.referenced_table)
            .collect()
    }

    /// The CREATE TABLE statement with the FOREIGN KEY constraint entries
    /// removed. The constraints are installed separately, so creating the
    /// table does not depend on the referenced tables existing yet.
    pub fn def_without_foreign_keys(&self) -> String {
        if self.foreign_keys.is_empty() {
            return self.def.clone();
        }

        let Some(open) = self.def.find('(') else {
            return self.def.clone();
        };
        let Some(close) = parse::matching_paren(&self.def, open) else {
            return self.def.clone();
        };

        let body = &self.def[open + 1..close];
        let entries: Vec<&str> = parse::split_top_level(body, ',')
            .into_iter()
            .filter(|entry| !parse::is_foreign_key_entry(entry))
            .collect();

        format!("{}{}{}", &self.def[..open + 1], entries.join(","), &self.def[close..])
    }
}

/// A secondary index definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDef {
    /// The parenthesized column list, as written (`(a, b(10))`).
    pub columns: String,
    /// Option suffix such as `USING BTREE`, or empty.
    pub options: String,
    pub unique: bool,
    pub fulltext: bool,
}

impl IndexDef {
    /// Bare column names, prefix lengths stripped.
    pub fn parts(&self) -> Vec<&str> {
        column_list(&self.columns)
    }

    pub fn kind(&self) -> &'static str {
        if self.unique {
            "UNIQUE INDEX"
        } else if self.fulltext {
            "FULLTEXT INDEX"
        } else {
            "INDEX"
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct View {
    pub(crate) name: String,
    /// Explicit column list text (without parentheses), possibly empty.
    pub(crate) fields: String,
    pub(crate) select_body: String,
    pub(crate) algorithm: String,
    pub(crate) security: String,
    /// Trailing `WITH … CHECK OPTION`, or empty.
    pub(crate) trail: String,
}

impl View {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &str {
        &self.fields
    }

    pub fn select_body(&self) -> &str {
        &self.select_body
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn security(&self) -> &str {
        &self.security
    }

    pub fn trail(&self) -> &str {
        &self.trail
    }

    /// The view's column names: the explicit column list when one was given,
    /// otherwise the select list's aliases or trailing identifier segments.
    pub fn field_names(&self) -> Vec<&str> {
        if !self.fields.is_empty() {
            return self.fields.split(',').map(|f| f.trim().trim_matches('`')).collect();
        }

        select_list(&self.select_body)
            .into_iter()
            .map(output_column_name)
            .collect()
    }

    pub fn definition(&self) -> String {
        let mut out = format!(
            "CREATE ALGORITHM={algorithm} DEFINER=CURRENT_USER SQL SECURITY {security} VIEW {name}",
            algorithm = self.algorithm,
            security = self.security,
            name = self.name,
        );

        if !self.fields.is_empty() {
            out.push_str(&format!(" ({})", self.fields));
        }

        out.push_str(" AS ");
        out.push_str(&self.select_body);

        if !self.trail.is_empty() {
            out.push(' ');
            out.push_str(&self.trail);
        }

        out.push(';');
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Procedure,
    Function,
}

impl RoutineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutineKind::Procedure => "PROCEDURE",
            RoutineKind::Function => "FUNCTION",
        }
    }
}

impl std::fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Routine {
    pub(crate) name: String,
    pub(crate) kind: RoutineKind,
    pub(crate) params: String,
    /// Characteristics between the parameter list and the body
    /// (`DETERMINISTIC`, `RETURNS …`, `SQL SECURITY …`), newline-separated.
    pub(crate) options: String,
    pub(crate) body: String,
}

impl Routine {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RoutineKind {
        self.kind
    }

    pub fn params(&self) -> &str {
        &self.params
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn definition(&self) -> String {
        let mut out = format!("CREATE {} {}({})", self.kind, self.name, self.params);

        if !self.options.is_empty() {
            out.push('\n');
            out.push_str(&self.options);
        }

        out.push('\n');
        out.push_str(&self.body);
        out
    }
}

/// The pieces of a `FOREIGN KEY (…) REFERENCES …` clause the dependency
/// analysis needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyParts<'a> {
    pub columns: Vec<&'a str>,
    pub referenced_table: &'a str,
    pub referenced_columns: Vec<&'a str>,
}

static FK_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)FOREIGN\s+KEY\s*\(([^)]*)\)\s*REFERENCES\s+`?([\w$]+)`?\s*\(([^)]*)\)").unwrap()
});

pub fn foreign_key_parts(clause: &str) -> Option<ForeignKeyParts<'_>> {
    let captures = FK_CLAUSE_RE.captures(clause)?;

    Some(ForeignKeyParts {
        columns: column_list(captures.get(1).unwrap().as_str()),
        referenced_table: captures.get(2).unwrap().as_str(),
        referenced_columns: column_list(captures.get(3).unwrap().as_str()),
    })
}

/// Splits a parenthesized column list (`"(a, b(10), `c`)"`) into bare column
/// names, dropping backticks and index prefix lengths.
pub fn column_list(text: &str) -> Vec<&str> {
    text.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(|part| {
            let part = part.trim();
            let part = match part.find('(') {
                Some(ix) => &part[..ix],
                None => part,
            };
            part.trim().trim_matches('`')
        })
        .filter(|part| !part.is_empty())
        .collect()
}

/// Splits the select list of `SELECT a, b AS c FROM …` at the top level.
fn select_list(select: &str) -> Vec<&str> {
    let lowered = select.to_ascii_lowercase();
    let start = match lowered.find("select") {
        Some(ix) => ix + "select".len(),
        None => return Vec::new(),
    };
    let end = top_level_from(&lowered[start..])
        .map(|ix| start + ix)
        .unwrap_or(select.len());

    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut item_start = start;

    for (ix, ch) in select[start..end].char_indices() {
        let ix = start + ix;
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(select[item_start..ix].trim());
                item_start = ix + 1;
            }
            _ => {}
        }
    }

    items.push(select[item_start..end].trim());
    items.retain(|item| !item.is_empty());
    items
}

/// Byte offset of the top-level ` from ` keyword, if any.
fn top_level_from(lowered: &str) -> Option<usize> {
    let mut depth = 0usize;
    let bytes = lowered.as_bytes();

    for (ix, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'f' if depth == 0 => {
                if lowered[ix..].starts_with("from")
                    && ix > 0
                    && bytes[ix - 1].is_ascii_whitespace()
                    && lowered[ix + 4..]
                        .bytes()
                        .next()
                        .map(|c| c.is_ascii_whitespace())
                        .unwrap_or(true)
                {
                    return Some(ix);
                }
            }
            _ => {}
        }
    }

    None
}

/// The output column name of one select-list item: the alias when present,
/// otherwise the last dotted identifier segment.
fn output_column_name(item: &str) -> &str {
    let lowered = item.to_ascii_lowercase();
    if let Some(ix) = lowered.rfind(" as ") {
        return item[ix + 4..].trim().trim_matches('`');
    }

    let tail = item.rsplit('.').next().unwrap_or(item).trim();
    tail.trim_matches('`')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn column_list_strips_backticks_and_prefix_lengths() {
        assert_eq!(column_list("(`a`, b(10), `c`(5))"), vec!["a", "b", "c"]);
        assert_eq!(column_list("(id)"), vec!["id"]);
        assert_eq!(column_list("()"), Vec::<&str>::new());
    }

    #[test]
    fn foreign_key_parts_extracts_tables_and_columns() {
        let parts =
            foreign_key_parts("FOREIGN KEY (`a`,`b`) REFERENCES `other` (`x`, `y`) ON DELETE CASCADE").unwrap();

        assert_eq!(parts.columns, vec!["a", "b"]);
        assert_eq!(parts.referenced_table, "other");
        assert_eq!(parts.referenced_columns, vec!["x", "y"]);
    }

    #[test]
    fn view_field_names_prefer_the_explicit_list() {
        let view = View {
            name: "v".into(),
            fields: "a, b".into(),
            select_body: "SELECT x, y FROM t".into(),
            ..Default::default()
        };

        assert_eq!(view.field_names(), vec!["a", "b"]);
    }

    #[test]
    fn view_field_names_fall_back_to_the_select_list() {
        let view = View {
            name: "v".into(),
            select_body: "SELECT t.id, COUNT(*) AS total FROM t GROUP BY t.id".into(),
            ..Default::default()
        };

        assert_eq!(view.field_names(), vec!["id", "total"]);
    }
}
