//! SQLite persistence for the remediation ledger, alerts and collector tables.

mod ledger;
mod schema;
mod sources;
mod store;

pub use store::SqliteStore;
