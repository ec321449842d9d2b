mod open;
mod error;
mod query;
pub mod arrow_schemas;
pub mod frame;

pub use open::Session;
pub use error::*;
pub use query::*;
