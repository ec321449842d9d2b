use crate::Result;
use pgcsv_core::TableRef;
use postgres::types::Type;
use postgres::{Client, GenericClient, SimpleQueryMessage, Transaction};
use tracing::debug;

const CURSOR: &str = "pgcsv_export";

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDesc {
    pub name: String,
    pub pg_type: Type,
}

/// Column names plus rows of text cells; `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RowSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Describes `SELECT * FROM table` without running it.
pub fn describe(client: &mut Client, table: &TableRef) -> Result<Vec<ColumnDesc>> {
    let stmt = client.prepare(&format!("SELECT * FROM {}", table.quoted()))?;
    Ok(stmt
        .columns()
        .iter()
        .map(|c| ColumnDesc { name: c.name().to_string(), pg_type: c.type_().clone() })
        .collect())
}

pub fn table_exists<C: GenericClient>(client: &mut C, table: &TableRef) -> Result<bool> {
    let row = client.query_one("SELECT to_regclass($1) IS NOT NULL", &[&table.quoted()])?;
    Ok(row.try_get(0)?)
}

/// Server-side cursor over `SELECT * FROM table`, fetched through the text
/// protocol so every value arrives in PostgreSQL's own output format.
pub struct TextCursor<'a> {
    tx: Transaction<'a>,
    columns: Vec<String>,
}

impl<'a> TextCursor<'a> {
    pub fn declare(client: &'a mut Client, table: &TableRef) -> Result<Self> {
        let columns = describe(client, table)?.into_iter().map(|c| c.name).collect();
        let mut tx = client.transaction()?;
        tx.batch_execute(&format!("DECLARE {} NO SCROLL CURSOR FOR SELECT * FROM {}", CURSOR, table.quoted()))?;
        debug!(%table, "cursor declared");
        Ok(TextCursor { tx, columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Next chunk of at most `max_rows` rows; an empty set means the cursor is exhausted.
    pub fn fetch(&mut self, max_rows: usize) -> Result<RowSet> {
        let sql = format!("FETCH FORWARD {} FROM {}", max_rows.max(1), CURSOR);
        let mut rows = Vec::new();
        for msg in self.tx.simple_query(&sql)? {
            if let SimpleQueryMessage::Row(row) = msg {
                rows.push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
            }
        }
        Ok(RowSet { columns: self.columns.clone(), rows })
    }

    pub fn close(mut self) -> Result<()> {
        self.tx.batch_execute(&format!("CLOSE {}", CURSOR))?;
        self.tx.commit()?;
        Ok(())
    }
}
