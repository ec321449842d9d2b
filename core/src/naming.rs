//! Table references and the timestamp suffixes used for generated names.

use std::fmt;
use time::macros::format_description;
use time::OffsetDateTime;

/// A possibly schema-qualified table, rendered as quoted SQL identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        TableRef { schema: None, name: name.into() }
    }

    /// `schema.table` splits on the first dot; anything else is a bare table name.
    pub fn parse(s: &str) -> Self {
        match s.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => TableRef {
                schema: Some(schema.to_string()),
                name: name.to_string(),
            },
            _ => TableRef::new(s),
        }
    }

    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `superstore_data` -> `superstore_data-2024_03_09_14_05_59`
pub fn stamped_table_name(base: &str, at: OffsetDateTime) -> String {
    let fmt = format_description!("[year]_[month]_[day]_[hour]_[minute]_[second]");
    format!("{}-{}", base, at.format(&fmt).unwrap_or_default())
}

/// Suffix used for default export file names, e.g. `2024-03-09-14-05-59`.
pub fn file_stamp(at: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]-[hour]-[minute]-[second]");
    at.format(&fmt).unwrap_or_default()
}
