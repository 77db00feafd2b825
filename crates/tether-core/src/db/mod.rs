//! Database layer for tether

mod connection;
pub mod migrations;
mod records;
mod store;
pub mod table;

pub use connection::Database;
pub use store::LocalStore;
pub use table::TableRecord;
