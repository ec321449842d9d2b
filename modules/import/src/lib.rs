//! Bulk-load a CSV file into a PostgreSQL table with `COPY ... FROM STDIN`.

use pg_session::{table_exists, Result, Session, TransferError};
use pgcsv_core::naming::quote_ident;
use pgcsv_core::{ConnectionParams, TableRef};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How CSV fields are matched to table columns.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnBinding {
    /// Field N goes to the table's column N.
    #[default]
    Positional,
    /// Header names are passed as the COPY column list.
    Header,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub delimiter: u8,
    pub binding: ColumnBinding,
    /// Create the table from the header (all columns `text`) when it is missing.
    pub create_table: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions { delimiter: b',', binding: ColumnBinding::Positional, create_table: false }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub table: String,
    pub path: PathBuf,
    pub rows: u64,
    pub created: bool,
}

pub fn import_csv(
    params: &ConnectionParams,
    csv_path: &Path,
    table: &TableRef,
    opts: &ImportOptions,
) -> Result<ImportSummary> {
    let header = read_header(csv_path, opts.delimiter)?;
    let mut file = BufReader::new(File::open(csv_path)?);

    let mut session = Session::open(params)?;
    let mut tx = session.client.transaction()?;
    let mut created = false;
    if opts.create_table && !table_exists(&mut tx, table)? {
        tx.batch_execute(&create_table_sql(table, &header))?;
        created = true;
        debug!(%table, columns = header.len(), "table created");
    }
    let columns = match opts.binding {
        ColumnBinding::Positional => None,
        ColumnBinding::Header => Some(header.as_slice()),
    };
    let sql = copy_sql(table, columns, opts.delimiter);
    debug!(%sql, "copy");
    let mut writer = tx.copy_in(sql.as_str())?;
    std::io::copy(&mut file, &mut writer)?;
    let rows = writer.finish()?;
    tx.commit()?;
    session.close()?;

    let summary = ImportSummary { table: table.to_string(), path: csv_path.to_path_buf(), rows, created };
    info!(table = %summary.table, path = %summary.path.display(), rows, "import finished");
    Ok(summary)
}

/// Column names from the first line of the file.
pub fn read_header(path: &Path, delimiter: u8) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new().delimiter(delimiter).has_headers(true).from_reader(file);
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if header.is_empty() {
        return Err(TransferError::EmptyCsv(path.to_path_buf()));
    }
    Ok(header)
}

/// The first line is always treated as a header and skipped by the server.
pub fn copy_sql(table: &TableRef, columns: Option<&[String]>, delimiter: u8) -> String {
    let cols = match columns {
        Some(cols) => format!(" ({})", ident_list(cols)),
        None => String::new(),
    };
    let delim = (delimiter as char).to_string().replace('\'', "''");
    format!(
        "COPY {}{} FROM STDIN WITH (FORMAT csv, HEADER true, DELIMITER '{}')",
        table.quoted(),
        cols,
        delim
    )
}

pub fn create_table_sql(table: &TableRef, header: &[String]) -> String {
    let cols: Vec<String> = header.iter().map(|c| format!("{} text", quote_ident(c))).collect();
    format!("CREATE TABLE {} ({})", table.quoted(), cols.join(", "))
}

fn ident_list(cols: &[String]) -> String {
    cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}
