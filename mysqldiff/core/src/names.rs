//! Generated identifier names for plan scaffolding.
//!
//! All generated names are derived by hashing, never by randomness, so the
//! emitted plan is a pure function of its inputs.

use sha2::{Digest, Sha256};

pub(crate) fn short_hash(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(len);
    hash
}

/// A cover index protecting FK-referenced columns while other index work is
/// in flight.
pub(crate) fn temp_index_name(column: &str) -> String {
    format!("temp_{}", short_hash(column, 16))
}

/// A cover index protecting the columns of an index whose name collides with
/// a foreign key being recreated. The suffix names the FK transition.
pub(crate) fn fk_cover_index_name(columns: &str, suffix: &str) -> String {
    format!("rc_temp_{}_{}", short_hash(columns, 16), suffix)
}

/// The backing index keeping an auto-increment column indexed across
/// transitional steps.
pub(crate) fn auto_index_name(table: &str, column: &str) -> String {
    format!("mysqldiff_{}", short_hash(&format!("{table}.{column}"), 16))
}

/// The conditional index procedure name for one plan.
pub(crate) fn workaround_procedure_name(source_summary: &str, target_summary: &str) -> String {
    format!(
        "workaround_{}",
        short_hash(&format!("{source_summary}\0{target_summary}"), 12)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_stable_and_distinct() {
        assert_eq!(temp_index_name("a"), temp_index_name("a"));
        assert_ne!(temp_index_name("a"), temp_index_name("b"));
        assert_ne!(temp_index_name("a"), auto_index_name("t", "a"));
        assert!(fk_cover_index_name("x", "change").starts_with("rc_temp_"));
        assert!(fk_cover_index_name("x", "change").ends_with("_change"));
    }

    #[test]
    fn workaround_name_is_a_function_of_both_summaries() {
        let name = workaround_procedure_name("file: a.sql", "file: b.sql");
        assert_eq!(name, workaround_procedure_name("file: a.sql", "file: b.sql"));
        assert_ne!(name, workaround_procedure_name("file: b.sql", "file: a.sql"));
    }
}
