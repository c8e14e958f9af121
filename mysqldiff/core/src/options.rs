use regex::Regex;

/// The options affecting plan generation. The CLI maps its flags onto this;
/// library callers construct it directly.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Only consider tables whose name matches this pattern.
    pub table_re: Option<Regex>,
    /// Suppress drops and creations; emit only changes to common objects.
    pub only_both: bool,
    /// Suppress drops of tables, views and routines absent from the target.
    pub keep_old_tables: bool,
    /// Prefix schema-level operations with structured comment headers and
    /// omit the banner.
    pub list_tables: bool,
    /// Suppress the `# was …` trailing comments.
    pub no_old_defs: bool,
    /// Loose comparison: ignore collations, numeric precision changes of the
    /// same base type, `DEFAULT '' NOT NULL` tails, and `AUTO_INCREMENT=n` /
    /// `COLLATE=x` table options.
    pub tolerant: bool,
    /// Wall-clock line for the banner. `None` omits the line, which keeps
    /// the output a pure function of the schemas.
    pub run_time: Option<String>,
    /// Echo of the invocation options for the banner.
    pub options_summary: String,
}

impl DiffOptions {
    pub fn table_matches(&self, name: &str) -> bool {
        self.table_re.as_ref().map(|re| re.is_match(name)).unwrap_or(true)
    }
}
