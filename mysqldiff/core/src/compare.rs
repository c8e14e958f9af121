//! Texts-as-MySQL-echoes-them comparison, including the tolerant
//! normalization.
//!
//! Tolerant field comparison relaxes exactly three things: `COLLATE …` is
//! stripped, a `DEFAULT '' NOT NULL` / `NOT NULL` tail is ignored, and a
//! numeric precision `(n,m)` change on the same base type is ignored.

use once_cell::sync::Lazy;
use regex::Regex;

static COLLATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*COLLATE[= ]\S+").unwrap());

static NUMERIC_PRECISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\w+)\(\d+(?:,\d+)?\)(.*)$").unwrap());

static AUTO_INCREMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bAUTO_INCREMENT\b").unwrap());

static AUTO_INCREMENT_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*\bAUTO_INCREMENT\b").unwrap());

static TIMESTAMP_DEFAULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(?:CURRENT_TIMESTAMP|LOCALTIMESTAMP|LOCALTIME)(?:\(\d*\))?|NOW\(\))").unwrap()
});

static EMPTY_CHAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCHAR\(0\)").unwrap());

static OPTION_AUTO_INCREMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*AUTO_INCREMENT=\d+").unwrap());

static OPTION_COLLATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*COLLATE=\S+").unwrap());

static OPTION_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCOMMENT=").unwrap());

static PARTITION_BY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bPARTITION\s+BY\b").unwrap());

pub(crate) fn has_auto_increment(text: &str) -> bool {
    AUTO_INCREMENT_RE.is_match(text)
}

pub(crate) fn strip_auto_increment(text: &str) -> String {
    AUTO_INCREMENT_CLAUSE_RE.replace_all(text, "").trim().to_owned()
}

pub(crate) fn has_timestamp_default(text: &str) -> bool {
    TIMESTAMP_DEFAULT_RE.is_match(text)
}

pub(crate) fn is_empty_char(text: &str) -> bool {
    EMPTY_CHAR_RE.is_match(text)
}

/// Whether two column definitions are to be treated as equal.
pub(crate) fn fields_equal(f1: &str, f2: &str, tolerant: bool) -> bool {
    if f1 == f2 {
        return true;
    }
    if !tolerant {
        return false;
    }

    let n1 = COLLATE_RE.replace_all(f1, "").trim().to_owned();
    let n2 = COLLATE_RE.replace_all(f2, "").trim().to_owned();
    if n1 == n2 {
        return true;
    }

    let t1 = strip_nullable_tail(&n1);
    let t2 = strip_nullable_tail(&n2);
    if t1 == t2 {
        return true;
    }

    // Same base type, different numeric precision.
    if let (Some(c1), Some(c2)) = (NUMERIC_PRECISION_RE.captures(t1), NUMERIC_PRECISION_RE.captures(t2)) {
        if c1.get(1).unwrap().as_str().eq_ignore_ascii_case(c2.get(1).unwrap().as_str())
            && c1.get(2).unwrap().as_str() == c2.get(2).unwrap().as_str()
        {
            return true;
        }
    }

    false
}

fn strip_nullable_tail(text: &str) -> &str {
    for tail in [" DEFAULT '' NOT NULL", " NOT NULL"] {
        if let Some(stripped) = text.strip_suffix(tail) {
            return stripped;
        }
    }
    text
}

/// Whether two table-option strings are to be treated as equal.
pub(crate) fn options_equal(o1: &str, o2: &str, tolerant: bool) -> bool {
    if o1 == o2 {
        return true;
    }
    if !tolerant {
        return false;
    }

    normalize_options(o1) == normalize_options(o2)
}

fn normalize_options(options: &str) -> String {
    let options = OPTION_AUTO_INCREMENT_RE.replace_all(options, "");
    let options = OPTION_COLLATE_RE.replace_all(&options, "");
    options.trim().to_owned()
}

/// Splits table options into the part before `PARTITION BY` and the
/// partition clause itself.
pub(crate) fn split_partition(options: &str) -> (&str, Option<&str>) {
    match PARTITION_BY_RE.find(options) {
        Some(m) => (options[..m.start()].trim_end(), Some(options[m.start()..].trim())),
        None => (options, None),
    }
}

/// When the source options carried a COMMENT and the target ones do not,
/// an explicit empty COMMENT is needed for MySQL to clear the stale one.
pub(crate) fn with_comment_reset(target_base: &str, source_options: &str) -> String {
    if OPTION_COMMENT_RE.is_match(source_options) && !OPTION_COMMENT_RE.is_match(target_base) {
        if target_base.is_empty() {
            "COMMENT=''".to_owned()
        } else {
            format!("{target_base} COMMENT=''")
        }
    } else {
        target_base.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_comparison_is_textual() {
        assert!(fields_equal("int(11) NOT NULL", "int(11) NOT NULL", false));
        assert!(!fields_equal("int(11)", "int(11) NOT NULL", false));
    }

    #[test]
    fn tolerant_comparison_ignores_collate() {
        assert!(fields_equal(
            "varchar(16) COLLATE utf8_bin NOT NULL",
            "varchar(16) NOT NULL",
            true
        ));
    }

    #[test]
    fn tolerant_comparison_ignores_not_null_and_empty_default_tails() {
        assert!(fields_equal("varchar(8)", "varchar(8) NOT NULL", true));
        assert!(fields_equal("varchar(8)", "varchar(8) DEFAULT '' NOT NULL", true));
        assert!(!fields_equal("varchar(8)", "varchar(8) DEFAULT 'x'", true));
    }

    #[test]
    fn tolerant_comparison_ignores_numeric_precision_of_the_same_base_type() {
        assert!(fields_equal("decimal(10,2) NOT NULL", "decimal(12,4) NOT NULL", true));
        assert!(fields_equal("int(10)", "int(11)", true));
        assert!(!fields_equal("int(10)", "bigint(10)", true));
        assert!(!fields_equal("enum('a')", "enum('b')", true));
    }

    #[test]
    fn tolerant_options_ignore_auto_increment_and_collate() {
        assert!(options_equal(
            "ENGINE=InnoDB AUTO_INCREMENT=42 DEFAULT CHARSET=utf8 COLLATE=utf8_bin",
            "ENGINE=InnoDB DEFAULT CHARSET=utf8",
            true
        ));
        assert!(!options_equal("ENGINE=InnoDB", "ENGINE=MyISAM", true));
    }

    #[test]
    fn partition_clause_splits_off() {
        let (base, partition) = split_partition("ENGINE=InnoDB PARTITION BY HASH(id) PARTITIONS 4");
        assert_eq!(base, "ENGINE=InnoDB");
        assert_eq!(partition, Some("PARTITION BY HASH(id) PARTITIONS 4"));

        assert_eq!(split_partition("ENGINE=InnoDB"), ("ENGINE=InnoDB", None));
    }

    #[test]
    fn timestamp_defaults_are_recognized() {
        assert!(has_timestamp_default("timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP"));
        assert!(has_timestamp_default("datetime DEFAULT NOW()"));
        assert!(has_timestamp_default("timestamp(3) DEFAULT LOCALTIMESTAMP(3)"));
        assert!(!has_timestamp_default("timestamp NOT NULL"));
    }

    #[test]
    fn auto_increment_stripping_leaves_the_rest_intact() {
        assert_eq!(strip_auto_increment("int(11) NOT NULL AUTO_INCREMENT"), "int(11) NOT NULL");
        assert_eq!(
            strip_auto_increment("bigint unsigned NOT NULL AUTO_INCREMENT COMMENT 'id'"),
            "bigint unsigned NOT NULL COMMENT 'id'"
        );
    }
}
