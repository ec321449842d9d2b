use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use export::{ExportMethod, ExportOptions};
use import::{ColumnBinding, ImportOptions};
use pgcsv_core::{file_stamp, stamped_table_name, ConnectionParams, TableRef};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

const DEFAULT_OUT_DIR: &str = "Data/processed";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Method { Cursor, Frame }

impl From<Method> for ExportMethod {
    fn from(m: Method) -> Self {
        match m {
            Method::Cursor => ExportMethod::Cursor,
            Method::Frame => ExportMethod::Frame,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Bind { Positional, Header }

impl From<Bind> for ColumnBinding {
    fn from(b: Bind) -> Self {
        match b {
            Bind::Positional => ColumnBinding::Positional,
            Bind::Header => ColumnBinding::Header,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "pgcsv", version, about = "Move tables between PostgreSQL and CSV files")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./pgcsv.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Env file with db_name/user/password/host/port. Defaults to ./.env if present.
    #[arg(long, global = true, value_name = "FILE")]
    env_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Export a table to CSV (header + one line per row)
    Export {
        /// Table to export, optionally schema-qualified (schema.table)
        #[arg(long)]
        table: Option<String>,
        /// Output file (overwrites). Default: <out_dir>/<table>-<timestamp>.csv
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// cursor: text-protocol cursor; frame: typed Arrow batches
        #[arg(long, value_enum)]
        method: Option<Method>,
        /// Field delimiter (default ',')
        #[arg(long)]
        delimiter: Option<char>,
        /// Rows fetched per round trip
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Summary format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Bulk-load a CSV file into a table with COPY (header line is skipped)
    Import {
        /// CSV file to load
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        /// Target table, optionally schema-qualified
        #[arg(long)]
        table: Option<String>,
        /// Append a -YYYY_MM_DD_HH_MM_SS suffix to the table name
        #[arg(long, default_value_t = false)]
        stamp: bool,
        /// Create the table from the CSV header (text columns) if missing
        #[arg(long, default_value_t = false)]
        create_table: bool,
        /// Match fields to columns by position or by header name
        #[arg(long, value_enum)]
        bind: Option<Bind>,
        /// Field delimiter (default ',')
        #[arg(long)]
        delimiter: Option<char>,
        /// Summary format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = config::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Version => {
            println!("pgcsv {} (core {})", env!("CARGO_PKG_VERSION"), pgcsv_core::version());
        }
        Commands::Export { table, out, method, delimiter, chunk_size, format } => {
            let ecfg = cfg.export.unwrap_or_default();
            let table = table
                .or(ecfg.table)
                .ok_or_else(|| anyhow!("no table given (use --table or export.table in the config file)"))?;
            let table = TableRef::parse(&table);
            let out = match out {
                Some(p) => p,
                None => default_output_path(ecfg.out_dir.as_deref(), &table, OffsetDateTime::now_utc()),
            };
            let method = method.map(ExportMethod::from).or(ecfg.method).unwrap_or_default();
            let mut opts = ExportOptions::default();
            if let Some(d) = delimiter.or(ecfg.delimiter) {
                opts.delimiter = delimiter_byte(d)?;
            }
            if let Some(n) = chunk_size.or(ecfg.chunk_size) {
                opts.chunk_size = n.max(1);
            }
            let params = connection_params(cli.env_file.as_deref())?;
            let summary = export::export(&params, &table, &out, method, &opts)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&summary)?),
                OutputFormat::Text => println!(
                    "exported {} rows ({} columns) from {} to {}",
                    summary.rows,
                    summary.columns,
                    summary.table,
                    summary.path.display()
                ),
            }
        }
        Commands::Import { file, table, stamp, create_table, bind, delimiter, format } => {
            let icfg = cfg.import.unwrap_or_default();
            let base = table
                .or(icfg.table)
                .ok_or_else(|| anyhow!("no table given (use --table or import.table in the config file)"))?;
            let mut table = TableRef::parse(&base);
            if stamp || icfg.stamp.unwrap_or(false) {
                table.name = stamped_table_name(&table.name, OffsetDateTime::now_utc());
            }
            let mut opts = ImportOptions {
                create_table: create_table || icfg.create_table.unwrap_or(false),
                binding: bind.map(ColumnBinding::from).or(icfg.bind).unwrap_or_default(),
                ..ImportOptions::default()
            };
            if let Some(d) = delimiter.or(icfg.delimiter) {
                opts.delimiter = delimiter_byte(d)?;
            }
            let params = connection_params(cli.env_file.as_deref())?;
            let summary = import::import_csv(&params, &file, &table, &opts)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&summary)?),
                OutputFormat::Text => println!(
                    "imported {} rows from {} into {}{}",
                    summary.rows,
                    summary.path.display(),
                    summary.table,
                    if summary.created { " (created)" } else { "" }
                ),
            }
        }
    }
    Ok(())
}

fn connection_params(env_file: Option<&Path>) -> Result<ConnectionParams> {
    Ok(match env_file {
        Some(p) => ConnectionParams::from_env_file(p)?,
        None => ConnectionParams::from_env()?,
    })
}

fn delimiter_byte(c: char) -> Result<u8> {
    if c.is_ascii() && c != '\n' && c != '\r' && c != '"' {
        Ok(c as u8)
    } else {
        Err(anyhow!("unsupported delimiter {:?}: must be a single ASCII character other than a quote or newline", c))
    }
}

fn default_output_path(out_dir: Option<&Path>, table: &TableRef, at: OffsetDateTime) -> PathBuf {
    let dir = out_dir.unwrap_or_else(|| Path::new(DEFAULT_OUT_DIR));
    dir.join(format!("{}-{}.csv", table.name, file_stamp(at)))
}
