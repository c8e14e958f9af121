//! Parses `mysqldump`-style SQL text into a [`SqlSchema`].
//!
//! The parser splits the dump into statements (honoring `DELIMITER`
//! directives, string literals and comment forms), then recognizes the
//! `CREATE TABLE` / `CREATE VIEW` / `CREATE PROCEDURE` / `CREATE FUNCTION`
//! statements. Everything else in a dump (SET, LOCK, INSERT, DROP) is
//! irrelevant to structure comparison and is skipped.

use crate::{IndexDef, Routine, RoutineKind, SqlSchema, Table, View};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Preserve backticks in parsed definition text instead of stripping
    /// them. Object names are stored unquoted either way.
    pub save_quotes: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed CREATE TABLE statement: {0}")]
    MalformedCreateTable(String),
    #[error("malformed CREATE VIEW statement: {0}")]
    MalformedCreateView(String),
    #[error("malformed CREATE {kind} statement: {fragment}")]
    MalformedRoutine { kind: String, fragment: String },
}

/// Parses a dump into a schema. Statements that are not schema objects are
/// skipped; malformed schema statements are errors.
pub fn parse_dump(text: &str, options: &ParseOptions) -> Result<SqlSchema, ParseError> {
    let mut schema = SqlSchema::default();

    for statement in split_statements(text) {
        let statement = if options.save_quotes {
            statement
        } else {
            statement.replace('`', "")
        };
        let statement = statement.trim();

        if statement.is_empty() {
            continue;
        }

        if CREATE_TABLE_RE.is_match(statement) {
            let table = parse_create_table(statement)?;
            schema.tables.insert(table.name.clone(), table);
        } else if CREATE_VIEW_RE.is_match(statement) {
            let view = parse_create_view(statement)?;
            // mysqldump emits a stand-in table before the real view
            // definition; the view supersedes it.
            schema.tables.shift_remove(&view.name);
            schema.views.insert(view.name.clone(), view);
        } else if CREATE_ROUTINE_RE.is_match(statement) {
            let routine = parse_create_routine(statement)?;
            schema.routines.insert(routine.name.clone(), routine);
        } else if CREATE_ANY_RE.is_match(statement) {
            tracing::debug!(statement = %fragment(statement), "skipping unsupported CREATE statement");
        }
    }

    Ok(schema)
}

static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+(?:TEMPORARY\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?`?([\w$]+)`?\s*\(").unwrap()
});

static CREATE_VIEW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:ALGORITHM\s*=\s*(\w+)\s+)?(?:DEFINER\s*=\s*\S+\s+)?(?:SQL\s+SECURITY\s+(\w+)\s+)?VIEW\s+`?([\w$]+)`?\s*(?:\(([^)]*)\)\s*)?AS\s+(.+)$",
    )
    .unwrap()
});

static CREATE_ROUTINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+(?:DEFINER\s*=\s*\S+\s+)?(PROCEDURE|FUNCTION)\s+`?([\w$]+)`?\s*\(").unwrap()
});

static CREATE_ANY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^\s*CREATE\b").unwrap());

static PRIMARY_KEY_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^PRIMARY\s+KEY\s*(?:USING\s+\w+\s+)?(\(.+\))").unwrap());

static INDEX_ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(?:(UNIQUE|FULLTEXT|SPATIAL)\s+)?(?:KEY|INDEX)\s+`?([\w$]+)`?\s*(\(.+\))\s*(.*)$").unwrap()
});

static FK_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^(?:CONSTRAINT\s+`?([\w$]+)`?\s+)?FOREIGN\s+KEY\s*(.+)$").unwrap());

static CHECK_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^(?:CONSTRAINT\s+`?[\w$]+`?\s+)?CHECK\s*\(").unwrap());

static COLUMN_ENTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^`?([\w$]+)`?\s+(.+)$").unwrap());

static INLINE_PRIMARY_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+PRIMARY\s+KEY\s*$").unwrap());

static VIEW_TRAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(WITH\s+(?:CASCADED\s+|LOCAL\s+)?CHECK\s+OPTION)\s*$").unwrap());

static ROUTINE_OPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^(RETURNS\s+\w+(?:\([^)]*\))?(?:\s+UNSIGNED)?|LANGUAGE\s+SQL|NOT\s+DETERMINISTIC|DETERMINISTIC|CONTAINS\s+SQL|NO\s+SQL|READS\s+SQL\s+DATA|MODIFIES\s+SQL\s+DATA|SQL\s+SECURITY\s+(?:DEFINER|INVOKER)|COMMENT\s+'(?:[^'\\]|\\.)*')\s*",
    )
    .unwrap()
});

fn parse_create_table(statement: &str) -> Result<Table, ParseError> {
    let captures = CREATE_TABLE_RE
        .captures(statement)
        .ok_or_else(|| ParseError::MalformedCreateTable(fragment(statement)))?;

    let name = captures.get(1).unwrap().as_str().to_owned();
    let open = captures.get(0).unwrap().end() - 1;
    let close =
        matching_paren(statement, open).ok_or_else(|| ParseError::MalformedCreateTable(fragment(statement)))?;

    let body = &statement[open + 1..close];
    let options = statement[close + 1..].trim().trim_end_matches(';').trim().to_owned();

    let mut def = statement.trim_end().trim_end_matches(';').to_owned();
    def.push(';');

    let mut table = Table {
        name,
        options,
        def,
        ..Default::default()
    };

    for entry in split_top_level(body, ',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        if let Some(caps) = PRIMARY_KEY_ENTRY_RE.captures(entry) {
            table.primary_key = Some(caps.get(1).unwrap().as_str().trim().to_owned());
        } else if let Some(caps) = FK_ENTRY_RE.captures(entry) {
            let clause = format!("FOREIGN KEY {}", caps.get(2).unwrap().as_str().trim());
            let name = caps
                .get(1)
                .map(|m| m.as_str().to_owned())
                .unwrap_or_else(|| format!("{}_ibfk_{}", table.name, table.foreign_keys.len() + 1));
            table.foreign_keys.insert(name, clause);
        } else if let Some(caps) = INDEX_ENTRY_RE.captures(entry) {
            let kind = caps.get(1).map(|m| m.as_str().to_ascii_uppercase());
            table.indices.insert(
                caps.get(2).unwrap().as_str().to_owned(),
                IndexDef {
                    columns: caps.get(3).unwrap().as_str().trim().to_owned(),
                    options: caps.get(4).map(|m| m.as_str().trim().to_owned()).unwrap_or_default(),
                    unique: kind.as_deref() == Some("UNIQUE"),
                    fulltext: kind.as_deref() == Some("FULLTEXT"),
                },
            );
        } else if CHECK_ENTRY_RE.is_match(entry) {
            tracing::debug!(table = %table.name, "skipping CHECK constraint");
        } else if let Some(caps) = COLUMN_ENTRY_RE.captures(entry) {
            let column = caps.get(1).unwrap().as_str().to_owned();
            let mut definition = caps.get(2).unwrap().as_str().trim().to_owned();

            if INLINE_PRIMARY_KEY_RE.is_match(&definition) {
                definition = INLINE_PRIMARY_KEY_RE.replace(&definition, "").into_owned();
                table.primary_key = Some(format!("({column})"));
            }

            table.fields.insert(column, definition);
        } else {
            tracing::debug!(table = %table.name, entry = %fragment(entry), "skipping unrecognized table entry");
        }
    }

    Ok(table)
}

fn parse_create_view(statement: &str) -> Result<View, ParseError> {
    let captures = CREATE_VIEW_RE
        .captures(statement)
        .ok_or_else(|| ParseError::MalformedCreateView(fragment(statement)))?;

    let mut select_body = captures.get(5).unwrap().as_str().trim().trim_end_matches(';').trim().to_owned();

    let trail = match VIEW_TRAIL_RE.captures(&select_body) {
        Some(caps) => {
            let trail = caps.get(1).unwrap().as_str().to_owned();
            select_body = VIEW_TRAIL_RE.replace(&select_body, "").trim_end().to_owned();
            trail
        }
        None => String::new(),
    };

    Ok(View {
        name: captures.get(3).unwrap().as_str().to_owned(),
        fields: captures.get(4).map(|m| m.as_str().trim().to_owned()).unwrap_or_default(),
        select_body,
        algorithm: captures
            .get(1)
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_else(|| "UNDEFINED".to_owned()),
        security: captures
            .get(2)
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_else(|| "DEFINER".to_owned()),
        trail,
    })
}

fn parse_create_routine(statement: &str) -> Result<Routine, ParseError> {
    let captures = CREATE_ROUTINE_RE.captures(statement).ok_or_else(|| ParseError::MalformedRoutine {
        kind: "ROUTINE".to_owned(),
        fragment: fragment(statement),
    })?;

    let kind = if captures.get(1).unwrap().as_str().eq_ignore_ascii_case("PROCEDURE") {
        RoutineKind::Procedure
    } else {
        RoutineKind::Function
    };
    let name = captures.get(2).unwrap().as_str().to_owned();

    let open = captures.get(0).unwrap().end() - 1;
    let close = matching_paren(statement, open).ok_or_else(|| ParseError::MalformedRoutine {
        kind: kind.as_str().to_owned(),
        fragment: fragment(statement),
    })?;

    let params = statement[open + 1..close].trim().to_owned();
    let mut rest = statement[close + 1..].trim_start();

    let mut options = Vec::new();
    while let Some(caps) = ROUTINE_OPTION_RE.captures(rest) {
        options.push(caps.get(1).unwrap().as_str().trim().to_owned());
        rest = &rest[caps.get(0).unwrap().end()..];
    }

    let body = rest.trim().trim_end_matches(';').trim_end().to_owned();

    if body.is_empty() {
        return Err(ParseError::MalformedRoutine {
            kind: kind.as_str().to_owned(),
            fragment: fragment(statement),
        });
    }

    Ok(Routine {
        name,
        kind,
        params,
        options: options.join("\n"),
        body,
    })
}

/// Whether a CREATE TABLE body entry declares a foreign key constraint.
pub(crate) fn is_foreign_key_entry(entry: &str) -> bool {
    FK_ENTRY_RE.is_match(entry.trim())
}

/// The byte offset of the parenthesis matching the one at `open`, skipping
/// quoted literals.
pub(crate) fn matching_paren(text: &str, open: usize) -> Option<usize> {
    debug_assert_eq!(&text[open..open + 1], "(");

    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut ix = open;

    while ix < bytes.len() {
        match bytes[ix] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(ix);
                }
            }
            quote @ (b'\'' | b'"' | b'`') => {
                ix = skip_quoted(bytes, ix, quote);
                continue;
            }
            _ => {}
        }
        ix += 1;
    }

    None
}

/// Splits `text` on `sep` at parenthesis depth zero, outside quotes.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut ix = 0usize;

    while ix < bytes.len() {
        match bytes[ix] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            quote @ (b'\'' | b'"' | b'`') => {
                ix = skip_quoted(bytes, ix, quote);
                continue;
            }
            b if b == sep as u8 && depth == 0 => {
                pieces.push(&text[start..ix]);
                start = ix + 1;
            }
            _ => {}
        }
        ix += 1;
    }

    pieces.push(&text[start..]);
    pieces
}

/// The byte offset just past the literal opened by the quote at `ix`,
/// honoring backslash escapes and doubled quotes.
fn skip_quoted(bytes: &[u8], ix: usize, quote: u8) -> usize {
    let mut ix = ix + 1;

    while ix < bytes.len() {
        if bytes[ix] == b'\\' && quote != b'`' {
            ix += 2;
            continue;
        }
        if bytes[ix] == quote {
            // A doubled quote is an escaped quote, not a terminator.
            if bytes.get(ix + 1) == Some(&quote) {
                ix += 2;
                continue;
            }
            return ix + 1;
        }
        ix += 1;
    }

    ix.min(bytes.len())
}

/// Splits the dump into statements: honors `DELIMITER` directives, skips
/// comments, unwraps `/*!NNNNN … */` conditional comments into their content.
fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut delimiter = String::from(";");
    let mut at_line_start = true;

    let bytes = text.as_bytes();
    let mut ix = 0usize;

    while ix < bytes.len() {
        if at_line_start {
            let line_end = text[ix..].find('\n').map(|off| ix + off).unwrap_or(bytes.len());
            let line = text[ix..line_end].trim();

            if line.get(..9).map(|p| p.eq_ignore_ascii_case("DELIMITER")).unwrap_or(false) {
                let new_delimiter = line[9..].trim();
                if !new_delimiter.is_empty() {
                    delimiter = new_delimiter.to_owned();
                }
                ix = (line_end + 1).min(bytes.len());
                continue;
            }

            at_line_start = false;
        }

        if text[ix..].starts_with(delimiter.as_str()) {
            flush_statement(&mut current, &mut statements);
            ix += delimiter.len();
            continue;
        }

        match bytes[ix] {
            b'\n' => {
                current.push('\n');
                at_line_start = true;
                ix += 1;
            }
            quote @ (b'\'' | b'"' | b'`') => {
                let end = skip_quoted(bytes, ix, quote);
                current.push_str(&text[ix..end]);
                ix = end;
            }
            b'#' => {
                ix = text[ix..].find('\n').map(|off| ix + off).unwrap_or(bytes.len());
            }
            b'-' if is_line_comment(&text[ix..]) => {
                ix = text[ix..].find('\n').map(|off| ix + off).unwrap_or(bytes.len());
            }
            b'/' if text[ix..].starts_with("/*!") => {
                // Conditional comment: the content is real SQL.
                let mut inner = ix + 3;
                while inner < bytes.len() && bytes[inner].is_ascii_digit() {
                    inner += 1;
                }
                let end = text[inner..].find("*/").map(|off| inner + off).unwrap_or(bytes.len());
                current.push_str(&text[inner..end]);
                ix = (end + 2).min(bytes.len());
            }
            b'/' if text[ix..].starts_with("/*") => {
                let end = text[ix + 2..].find("*/").map(|off| ix + 2 + off + 2).unwrap_or(bytes.len());
                ix = end;
            }
            _ => {
                let ch_len = text[ix..].chars().next().map(char::len_utf8).unwrap_or(1);
                current.push_str(&text[ix..ix + ch_len]);
                ix += ch_len;
            }
        }
    }

    flush_statement(&mut current, &mut statements);
    statements
}

fn flush_statement(current: &mut String, statements: &mut Vec<String>) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_owned());
    }
    current.clear();
}

fn is_line_comment(text: &str) -> bool {
    text.starts_with("--")
        && text[2..]
            .chars()
            .next()
            .map(|c| c == ' ' || c == '\t' || c == '\r' || c == '\n' || c == '-')
            .unwrap_or(true)
}

fn fragment(statement: &str) -> String {
    let mut fragment: String = statement.chars().take(80).collect();
    if fragment.len() < statement.len() {
        fragment.push('…');
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> SqlSchema {
        parse_dump(text, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn parses_a_plain_table() {
        let schema = parse(indoc! {r#"
            -- MySQL dump
            SET NAMES utf8;

            CREATE TABLE `person` (
              `id` int(11) NOT NULL AUTO_INCREMENT,
              `name` varchar(255) NOT NULL DEFAULT '',
              `age` decimal(10,2) DEFAULT NULL,
              PRIMARY KEY (`id`),
              UNIQUE KEY `name_uq` (`name`) USING BTREE,
              KEY `age_ix` (`age`)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8;
        "#});

        let table = schema.table("person").unwrap();
        assert_eq!(
            table.fields().keys().collect::<Vec<_>>(),
            vec!["id", "name", "age"]
        );
        assert_eq!(table.field("id"), Some("int(11) NOT NULL AUTO_INCREMENT"));
        assert_eq!(table.primary_parts(), vec!["id"]);
        assert_eq!(table.options(), "ENGINE=InnoDB DEFAULT CHARSET=utf8");

        let unique = table.index("name_uq").unwrap();
        assert!(unique.unique);
        assert_eq!(unique.options, "USING BTREE");
        assert_eq!(table.index_parts("age_ix"), vec!["age"]);
    }

    #[test]
    fn parses_foreign_keys_and_composite_primary_key() {
        let schema = parse(indoc! {r#"
            CREATE TABLE child (
              a int NOT NULL,
              b int NOT NULL,
              PRIMARY KEY (a, b),
              KEY fk_parent (a),
              CONSTRAINT fk_parent FOREIGN KEY (a) REFERENCES parent (id) ON DELETE CASCADE
            ) ENGINE=InnoDB;
        "#});

        let table = schema.table("child").unwrap();
        assert_eq!(table.primary_parts(), vec!["a", "b"]);
        assert!(table.is_primary("b"));
        assert!(table.is_foreign_key("fk_parent"));
        assert_eq!(
            table.foreign_key("fk_parent"),
            Some("FOREIGN KEY (a) REFERENCES parent (id) ON DELETE CASCADE")
        );
        assert_eq!(table.fk_tables().into_iter().collect::<Vec<_>>(), vec!["parent"]);
        assert_eq!(
            table.foreign_keys_by_col("a").keys().collect::<Vec<_>>(),
            vec![&"fk_parent"]
        );
        assert!(table.foreign_keys_by_col("b").is_empty());
    }

    #[test]
    fn a_view_supersedes_its_stand_in_table() {
        let schema = parse(indoc! {r#"
            CREATE TABLE v (
              id tinyint NOT NULL
            );

            /*!50001 CREATE ALGORITHM=MERGE DEFINER=`root`@`localhost` SQL SECURITY INVOKER VIEW v AS SELECT id FROM t WITH CASCADED CHECK OPTION */;
        "#});

        assert!(schema.table("v").is_none());
        let view = schema.view("v").unwrap();
        assert_eq!(view.algorithm(), "MERGE");
        assert_eq!(view.security(), "INVOKER");
        assert_eq!(view.select_body(), "SELECT id FROM t");
        assert_eq!(view.trail(), "WITH CASCADED CHECK OPTION");
    }

    #[test]
    fn parses_routines_in_delimiter_blocks() {
        let schema = parse(indoc! {r#"
            DELIMITER ;;
            CREATE PROCEDURE bump(IN amount INT)
            MODIFIES SQL DATA
            COMMENT 'increment the counter'
            BEGIN
              UPDATE counters SET n = n + amount;
            END;;
            DELIMITER ;

            CREATE FUNCTION answer() RETURNS int DETERMINISTIC RETURN 42;
        "#});

        let procedure = schema.routine("bump").unwrap();
        assert_eq!(procedure.kind(), RoutineKind::Procedure);
        assert_eq!(procedure.params(), "IN amount INT");
        assert_eq!(procedure.options(), "MODIFIES SQL DATA\nCOMMENT 'increment the counter'");
        assert!(procedure.body().starts_with("BEGIN"));
        assert!(procedure.body().ends_with("END"));

        let function = schema.routine("answer").unwrap();
        assert_eq!(function.kind(), RoutineKind::Function);
        assert_eq!(function.options(), "RETURNS int\nDETERMINISTIC");
        assert_eq!(function.body(), "RETURN 42");
    }

    #[test]
    fn statement_splitting_ignores_quoted_delimiters() {
        let schema = parse(indoc! {r#"
            CREATE TABLE t (
              a varchar(10) NOT NULL DEFAULT 'x;y',
              b enum('a','b') DEFAULT 'a'
            ) COMMENT='semi ; colon';
        "#});

        let table = schema.table("t").unwrap();
        assert_eq!(table.field("a"), Some("varchar(10) NOT NULL DEFAULT 'x;y'"));
        assert_eq!(table.field("b"), Some("enum('a','b') DEFAULT 'a'"));
        assert_eq!(table.options(), "COMMENT='semi ; colon'");
    }

    #[test]
    fn partitioned_table_options_are_kept_verbatim() {
        let schema = parse(indoc! {r#"
            CREATE TABLE metrics (
              id int NOT NULL
            ) ENGINE=InnoDB PARTITION BY HASH(id) PARTITIONS 4;
        "#});

        assert_eq!(
            schema.table("metrics").unwrap().options(),
            "ENGINE=InnoDB PARTITION BY HASH(id) PARTITIONS 4"
        );
    }
}
