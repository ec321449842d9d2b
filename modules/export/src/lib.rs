//! Export a PostgreSQL table to CSV, through a text cursor or Arrow record batches.

mod sink;

pub use sink::AtomicFile;

use arrow::record_batch::RecordBatch;
use pg_session::frame::FrameReader;
use pg_session::{Result, RowSet, Session, TextCursor};
use pgcsv_core::{ConnectionParams, TableRef};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_CHUNK_ROWS: usize = 10_000;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMethod {
    #[default]
    Cursor,
    Frame,
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub delimiter: u8,
    /// Rows fetched from the server per round trip.
    pub chunk_size: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions { delimiter: b',', chunk_size: DEFAULT_CHUNK_ROWS }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub table: String,
    pub path: PathBuf,
    pub method: ExportMethod,
    pub columns: usize,
    pub rows: u64,
}

pub fn export(
    params: &ConnectionParams,
    table: &TableRef,
    output: &Path,
    method: ExportMethod,
    opts: &ExportOptions,
) -> Result<ExportSummary> {
    match method {
        ExportMethod::Cursor => export_with_cursor(params, table, output, opts),
        ExportMethod::Frame => export_with_frame(params, table, output, opts),
    }
}

/// Streams `SELECT * FROM table` through a server-side cursor, writing each
/// value in PostgreSQL's text form.
pub fn export_with_cursor(
    params: &ConnectionParams,
    table: &TableRef,
    output: &Path,
    opts: &ExportOptions,
) -> Result<ExportSummary> {
    let mut session = Session::open(params)?;
    let mut out = AtomicFile::create(output)?;
    let (columns, rows) = {
        let mut cursor = TextCursor::declare(&mut session.client, table)?;
        let mut wtr = csv_writer(out.file(), opts.delimiter);
        wtr.write_record(cursor.columns())?;
        let mut rows = 0u64;
        loop {
            let chunk = cursor.fetch(opts.chunk_size)?;
            if chunk.is_empty() {
                break;
            }
            rows += write_row_set(&mut wtr, &chunk)?;
            debug!(rows, "chunk written");
        }
        wtr.flush()?;
        let columns = cursor.columns().len();
        cursor.close()?;
        (columns, rows)
    };
    let path = out.commit()?;
    session.close()?;
    let summary = ExportSummary { table: table.to_string(), path, method: ExportMethod::Cursor, columns, rows };
    info!(table = %summary.table, path = %summary.path.display(), rows, "export finished");
    Ok(summary)
}

/// Reads the table into typed Arrow batches and writes them with Arrow's CSV writer.
pub fn export_with_frame(
    params: &ConnectionParams,
    table: &TableRef,
    output: &Path,
    opts: &ExportOptions,
) -> Result<ExportSummary> {
    let mut session = Session::open(params)?;
    let mut out = AtomicFile::create(output)?;
    let (columns, rows) = {
        let mut reader = FrameReader::open(&mut session.client, table)?;
        let schema = reader.schema();
        let mut wtr = FrameCsvWriter::new(out.file(), opts.delimiter);
        while let Some(batch) = reader.next_batch(opts.chunk_size)? {
            wtr.write(&batch)?;
            debug!(rows = wtr.rows(), "batch written");
        }
        if wtr.rows() == 0 {
            wtr.write(&RecordBatch::new_empty(schema.clone()))?;
        }
        let rows = wtr.finish()?;
        reader.close()?;
        (schema.fields().len(), rows)
    };
    let path = out.commit()?;
    session.close()?;
    let summary = ExportSummary { table: table.to_string(), path, method: ExportMethod::Frame, columns, rows };
    info!(table = %summary.table, path = %summary.path.display(), rows, "export finished");
    Ok(summary)
}

fn csv_writer<W: Write>(w: W, delimiter: u8) -> csv::Writer<W> {
    csv::WriterBuilder::new().delimiter(delimiter).from_writer(w)
}

/// NULL becomes an empty field.
fn write_row_set<W: Write>(wtr: &mut csv::Writer<W>, set: &RowSet) -> Result<u64> {
    for row in &set.rows {
        wtr.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    Ok(set.rows.len() as u64)
}

/// Arrow CSV writer that emits the header with the first batch.
struct FrameCsvWriter<W: Write> {
    inner: arrow::csv::Writer<W>,
    rows: u64,
}

impl<W: Write> FrameCsvWriter<W> {
    fn new(w: W, delimiter: u8) -> Self {
        let inner = arrow::csv::WriterBuilder::new().with_header(true).with_delimiter(delimiter).build(w);
        FrameCsvWriter { inner, rows: 0 }
    }

    fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.inner.write(batch)?;
        self.rows += batch.num_rows() as u64;
        Ok(())
    }

    fn rows(&self) -> u64 {
        self.rows
    }

    fn finish(self) -> Result<u64> {
        self.inner.into_inner().flush()?;
        Ok(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn id_name_rows() -> RowSet {
        RowSet {
            columns: vec!["id".into(), "name".into()],
            rows: vec![
                vec![Some("1".into()), Some("a".into())],
                vec![Some("2".into()), Some("b".into())],
            ],
        }
    }

    fn cursor_csv(set: &RowSet, delimiter: u8) -> String {
        let mut wtr = csv_writer(Vec::new(), delimiter);
        wtr.write_record(&set.columns).unwrap();
        write_row_set(&mut wtr, set).unwrap();
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    fn id_name_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        let ids: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
        let names: ArrayRef = Arc::new(StringArray::from(vec!["a", "b"]));
        RecordBatch::try_new(schema, vec![ids, names]).unwrap()
    }

    fn frame_csv(batches: &[RecordBatch]) -> String {
        let mut buf = Vec::new();
        {
            let mut wtr = FrameCsvWriter::new(&mut buf, b',');
            for b in batches {
                wtr.write(b).unwrap();
            }
            wtr.finish().unwrap();
        }
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn cursor_writes_header_and_rows() {
        assert_eq!(cursor_csv(&id_name_rows(), b','), "id,name\n1,a\n2,b\n");
    }

    #[test]
    fn cursor_output_has_one_line_per_row_plus_header() {
        let mut set = id_name_rows();
        set.rows.push(vec![None, Some("with, comma".into())]);
        let out = cursor_csv(&set, b',');
        let mut rdr = csv::ReaderBuilder::new().has_headers(false).from_reader(out.as_bytes());
        let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), set.rows.len() + 1);
        assert!(records.iter().all(|r| r.len() == 2));
        assert_eq!(&records[3][0], "");
        assert_eq!(&records[3][1], "with, comma");
    }

    #[test]
    fn cursor_output_is_stable_across_runs() {
        assert_eq!(cursor_csv(&id_name_rows(), b','), cursor_csv(&id_name_rows(), b','));
    }

    #[test]
    fn cursor_honours_delimiter() {
        assert_eq!(cursor_csv(&id_name_rows(), b';'), "id;name\n1;a\n2;b\n");
    }

    #[test]
    fn frame_writes_same_content_as_cursor() {
        assert_eq!(frame_csv(&[id_name_batch()]), "id,name\n1,a\n2,b\n");
    }

    #[test]
    fn frame_header_written_once_across_batches() {
        let out = frame_csv(&[id_name_batch(), id_name_batch()]);
        assert_eq!(out, "id,name\n1,a\n2,b\n1,a\n2,b\n");
    }

    #[test]
    fn frame_empty_table_still_has_header() {
        let out = frame_csv(&[RecordBatch::new_empty(id_name_batch().schema())]);
        assert_eq!(out, "id,name\n");
    }

    #[test]
    fn frame_writes_nulls_as_empty_fields() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, true),
            Field::new("price", DataType::Float64, true),
        ]));
        let ids: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
        let prices: ArrayRef = Arc::new(Float64Array::from(vec![Some(1.5), None]));
        let batch = RecordBatch::try_new(schema, vec![ids, prices]).unwrap();
        assert_eq!(frame_csv(&[batch]), "id,price\n1,1.5\n2,\n");
    }

    #[test]
    fn unreachable_database_leaves_no_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let params = ConnectionParams {
            host: "127.0.0.1".into(),
            port: 1,
            user: "nobody".into(),
            password: String::new(),
            db_name: "none".into(),
        };
        for method in [ExportMethod::Cursor, ExportMethod::Frame] {
            let out = dir.path().join("out.csv");
            let res = export(&params, &TableRef::new("t"), &out, method, &ExportOptions::default());
            assert!(res.is_err());
            assert!(!out.exists());
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
