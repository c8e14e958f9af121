//! The mysqldiff command line front end: reads two dump files, runs the
//! differencing engine, prints the plan to stdout.

use mysqldiff_core::DiffOptions;
use regex::Regex;
use sql_schema_model::{parse_dump, ParseOptions, SqlSchema};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "mysqldiff",
    about = "Computes the MySQL DDL script that upgrades one schema dump into another."
)]
struct Opt {
    /// Only consider tables whose name matches this regular expression.
    #[structopt(long = "table-re", value_name = "regex")]
    table_re: Option<String>,

    /// List the selected tables and their transitive FK dependencies
    /// instead of diffing.
    #[structopt(long)]
    refs: bool,

    /// Only emit changes to objects present in both schemas.
    #[structopt(long = "only-both")]
    only_both: bool,

    /// Do not drop tables, views or routines absent from the target.
    #[structopt(long = "keep-old-tables")]
    keep_old_tables: bool,

    /// Prefix schema-level operations with structured comment headers.
    #[structopt(long = "list-tables")]
    list_tables: bool,

    /// Suppress the trailing `# was …` comments.
    #[structopt(long = "no-old-defs")]
    no_old_defs: bool,

    /// Loose comparison: ignore collations, numeric precision changes of
    /// the same base type, and empty-default/NOT NULL tails.
    #[structopt(long)]
    tolerant: bool,

    /// Preserve backticks from the dumps in the emitted DDL.
    #[structopt(long = "save-quotes")]
    save_quotes: bool,

    /// Enable debug logging.
    #[structopt(long)]
    debug: bool,

    /// Write the log to this file instead of stderr.
    #[structopt(long = "debug-file", value_name = "file", parse(from_os_str))]
    debug_file: Option<PathBuf>,

    /// Directory the log file is placed in.
    #[structopt(long = "logs-folder", value_name = "dir", parse(from_os_str))]
    logs_folder: Option<PathBuf>,

    /// The dump of the schema to upgrade.
    #[structopt(value_name = "source.sql", parse(from_os_str))]
    source: PathBuf,

    /// The dump of the schema to upgrade to.
    #[structopt(value_name = "target.sql", parse(from_os_str))]
    target: PathBuf,
}

fn main() {
    let opt = Opt::from_args();

    if let Err(error) = init_logging(&opt) {
        eprintln!("mysqldiff: {error}");
        std::process::exit(1);
    }

    match run(&opt) {
        Ok(plan) => print!("{plan}"),
        Err(error) => {
            eprintln!("mysqldiff: {error}");
            std::process::exit(1);
        }
    }
}

fn run(opt: &Opt) -> Result<String, Box<dyn std::error::Error>> {
    let parse_options = ParseOptions {
        save_quotes: opt.save_quotes,
    };

    let source = load_schema(&opt.source, &parse_options)?;

    let diff_options = DiffOptions {
        table_re: opt.table_re.as_deref().map(Regex::new).transpose()?,
        only_both: opt.only_both,
        keep_old_tables: opt.keep_old_tables,
        list_tables: opt.list_tables,
        no_old_defs: opt.no_old_defs,
        tolerant: opt.tolerant,
        run_time: Some(chrono::Local::now().format("%a %b %e %H:%M:%S %Y").to_string()),
        options_summary: options_summary(opt),
    };

    if opt.refs {
        return Ok(mysqldiff_core::reference_closure(&source, &diff_options));
    }

    let target = load_schema(&opt.target, &parse_options)?;
    Ok(mysqldiff_core::diff(&source, &target, &diff_options))
}

fn load_schema(path: &Path, parse_options: &ParseOptions) -> Result<SqlSchema, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let mut schema = parse_dump(&text, parse_options)?;
    schema.set_summary(format!("file: {}", path.display()));

    tracing::debug!(
        dump = %path.display(),
        tables = schema.tables.len(),
        views = schema.views.len(),
        routines = schema.routines.len(),
        "loaded schema"
    );

    Ok(schema)
}

fn options_summary(opt: &Opt) -> String {
    let mut summary = Vec::new();

    if let Some(table_re) = &opt.table_re {
        summary.push(format!("table-re={table_re}"));
    }
    for (flag, set) in [
        ("refs", opt.refs),
        ("only-both", opt.only_both),
        ("keep-old-tables", opt.keep_old_tables),
        ("list-tables", opt.list_tables),
        ("no-old-defs", opt.no_old_defs),
        ("tolerant", opt.tolerant),
        ("save-quotes", opt.save_quotes),
    ] {
        if set {
            summary.push(flag.to_owned());
        }
    }

    summary.join(", ")
}

fn init_logging(opt: &Opt) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if opt.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };

    let log_file = match (&opt.debug_file, &opt.logs_folder) {
        (Some(file), Some(folder)) if file.is_relative() => Some(folder.join(file)),
        (Some(file), _) => Some(file.clone()),
        (None, Some(folder)) => Some(folder.join("mysqldiff.log")),
        (None, None) => None,
    };

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(&path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}
