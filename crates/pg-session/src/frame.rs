//! Typed, chunked reads of a whole table into Arrow record batches.

use crate::arrow_schemas::{self, ColumnKind};
use crate::{describe, Result};
use arrow::array::{
    ArrayRef, BooleanBuilder, Float32Builder, Float64Builder, Int16Builder, Int32Builder, Int64Builder, StringBuilder,
};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use pgcsv_core::TableRef;
use postgres::{Client, Portal, Row, Transaction};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
}

impl Cell {
    pub fn from_row(row: &Row, idx: usize, kind: ColumnKind) -> Result<Cell> {
        let cell = match kind {
            ColumnKind::Boolean => row.try_get::<_, Option<bool>>(idx)?.map(Cell::Bool),
            ColumnKind::Int16 => row.try_get::<_, Option<i16>>(idx)?.map(Cell::I16),
            ColumnKind::Int32 => row.try_get::<_, Option<i32>>(idx)?.map(Cell::I32),
            ColumnKind::Int64 => row.try_get::<_, Option<i64>>(idx)?.map(Cell::I64),
            ColumnKind::Float32 => row.try_get::<_, Option<f32>>(idx)?.map(Cell::F32),
            ColumnKind::Float64 => row.try_get::<_, Option<f64>>(idx)?.map(Cell::F64),
            ColumnKind::Utf8 => row.try_get::<_, Option<String>>(idx)?.map(Cell::Text),
        };
        Ok(cell.unwrap_or(Cell::Null))
    }
}

enum ColumnBuilder {
    Boolean(BooleanBuilder),
    Int16(Int16Builder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
}

impl ColumnBuilder {
    fn new(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Boolean => ColumnBuilder::Boolean(BooleanBuilder::new()),
            ColumnKind::Int16 => ColumnBuilder::Int16(Int16Builder::new()),
            ColumnKind::Int32 => ColumnBuilder::Int32(Int32Builder::new()),
            ColumnKind::Int64 => ColumnBuilder::Int64(Int64Builder::new()),
            ColumnKind::Float32 => ColumnBuilder::Float32(Float32Builder::new()),
            ColumnKind::Float64 => ColumnBuilder::Float64(Float64Builder::new()),
            ColumnKind::Utf8 => ColumnBuilder::Utf8(StringBuilder::new()),
        }
    }

    fn append(&mut self, cell: Cell) -> std::result::Result<(), ArrowError> {
        match (self, cell) {
            (ColumnBuilder::Boolean(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Int16(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Int32(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Int64(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Float32(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Float64(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Utf8(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Boolean(b), Cell::Bool(v)) => b.append_value(v),
            (ColumnBuilder::Int16(b), Cell::I16(v)) => b.append_value(v),
            (ColumnBuilder::Int32(b), Cell::I32(v)) => b.append_value(v),
            (ColumnBuilder::Int64(b), Cell::I64(v)) => b.append_value(v),
            (ColumnBuilder::Float32(b), Cell::F32(v)) => b.append_value(v),
            (ColumnBuilder::Float64(b), Cell::F64(v)) => b.append_value(v),
            (ColumnBuilder::Utf8(b), Cell::Text(v)) => b.append_value(v),
            (_, other) => {
                return Err(ArrowError::InvalidArgumentError(format!("cell {:?} does not fit column", other)))
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Boolean(b) => Arc::new(b.finish()),
            ColumnBuilder::Int16(b) => Arc::new(b.finish()),
            ColumnBuilder::Int32(b) => Arc::new(b.finish()),
            ColumnBuilder::Int64(b) => Arc::new(b.finish()),
            ColumnBuilder::Float32(b) => Arc::new(b.finish()),
            ColumnBuilder::Float64(b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8(b) => Arc::new(b.finish()),
        }
    }
}

/// Assembles row-major cells into one column-major batch.
pub fn build_batch<I>(schema: SchemaRef, kinds: &[ColumnKind], rows: I) -> Result<RecordBatch>
where
    I: IntoIterator<Item = Vec<Cell>>,
{
    let mut builders: Vec<ColumnBuilder> = kinds.iter().map(|k| ColumnBuilder::new(*k)).collect();
    let mut count = 0;
    for row in rows {
        if row.len() != builders.len() {
            return Err(ArrowError::InvalidArgumentError(format!(
                "row has {} cells, expected {}",
                row.len(),
                builders.len()
            ))
            .into());
        }
        for (b, cell) in builders.iter_mut().zip(row) {
            b.append(cell)?;
        }
        count += 1;
    }
    let arrays: Vec<ArrayRef> = builders.iter_mut().map(ColumnBuilder::finish).collect();
    let options = RecordBatchOptions::new().with_row_count(Some(count));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

/// Portal-backed reader yielding one [`RecordBatch`] per chunk.
pub struct FrameReader<'a> {
    tx: Transaction<'a>,
    portal: Portal,
    schema: SchemaRef,
    kinds: Vec<ColumnKind>,
}

impl<'a> FrameReader<'a> {
    pub fn open(client: &'a mut Client, table: &TableRef) -> Result<Self> {
        let columns = describe(client, table)?;
        let (schema, kinds) = arrow_schemas::frame_schema(&columns);
        let sql = arrow_schemas::projection_sql(table, &columns);
        debug!(%sql, "frame projection");
        let mut tx = client.transaction()?;
        let stmt = tx.prepare(&sql)?;
        let portal = tx.bind(&stmt, &[])?;
        Ok(FrameReader { tx, portal, schema: Arc::new(schema), kinds })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// `None` once the portal is drained.
    pub fn next_batch(&mut self, max_rows: usize) -> Result<Option<RecordBatch>> {
        let limit = i32::try_from(max_rows.max(1)).unwrap_or(i32::MAX);
        let rows = self.tx.query_portal(&self.portal, limit)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let mut cells = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut out = Vec::with_capacity(self.kinds.len());
            for (idx, kind) in self.kinds.iter().enumerate() {
                out.push(Cell::from_row(row, idx, *kind)?);
            }
            cells.push(out);
        }
        build_batch(self.schema.clone(), &self.kinds, cells).map(Some)
    }

    pub fn close(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    fn id_name_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, true),
            Field::new("name", DataType::Utf8, true),
        ]))
    }

    #[test]
    fn builds_batch_with_nulls() {
        let kinds = [ColumnKind::Int32, ColumnKind::Utf8];
        let batch = build_batch(
            id_name_schema(),
            &kinds,
            vec![
                vec![Cell::I32(1), Cell::Text("a".into())],
                vec![Cell::I32(2), Cell::Null],
            ],
        )
        .unwrap();
        assert_eq!(batch.num_rows(), 2);
        let ids = batch.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(ids.value(1), 2);
        let names = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(names.value(0), "a");
        assert!(names.is_null(1));
    }

    #[test]
    fn empty_input_gives_empty_batch() {
        let batch = build_batch(id_name_schema(), &[ColumnKind::Int32, ColumnKind::Utf8], Vec::new()).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 2);
    }

    #[test]
    fn rejects_mismatched_cells() {
        let kinds = [ColumnKind::Int32, ColumnKind::Utf8];
        let err = build_batch(id_name_schema(), &kinds, vec![vec![Cell::Text("x".into()), Cell::Null]]);
        assert!(err.is_err());
        let err = build_batch(id_name_schema(), &kinds, vec![vec![Cell::I32(1)]]);
        assert!(err.is_err());
    }
}
