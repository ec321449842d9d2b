use pgcsv_core::ConfigError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database error")]
    Database(#[from] postgres::Error),
    #[error("i/o error")]
    Io(#[from] std::io::Error),
    #[error("csv error")]
    Csv(#[from] csv::Error),
    #[error("arrow error")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("{} has no header line", .0.display())]
    EmptyCsv(PathBuf),
}

pub type Result<T> = std::result::Result<T, TransferError>;
