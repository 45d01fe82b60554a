//! Persistence seams for the order core.
//!
//! Each trait owns one shared resource: [`InventoryLedger`] the per-product
//! stock counters, [`OrderStore`] the order records, [`CommitJournal`] the
//! durable intent log. [`InMemoryStore`] and [`PostgresStore`] implement all
//! of them.

pub mod error;
pub mod journal;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use journal::{IntentKind, IntentOutcome, JournalEvent, JournalLine};
pub use memory::{InMemoryStore, InsertFailure};
pub use postgres::PostgresStore;
pub use query::OrderQuery;
pub use store::{Backend, CommitJournal, InventoryLedger, OrderStore, ProductCatalog};
