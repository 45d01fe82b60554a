//! Order commit saga for the point-of-sale core.
//!
//! A commit validates and prices a cart, then reserves stock one product at
//! a time. The store only offers single-record atomicity, so the commit is
//! a saga: if a reservation or the final write fails, every reservation
//! already made is released before the error is returned.
//!
//! Each commit and cancellation is journaled as an intent. On start-up,
//! [`IntentRecovery`] finishes or undoes intents a crash left open.

pub mod assembler;
pub mod coordinator;
pub mod error;
pub mod intent;
pub mod numbering;
pub mod recovery;
pub mod status;

pub use assembler::{CartLine, CartRequest, CustomerInput, InlineCustomer, OrderAssembler, PricedCart};
pub use coordinator::{CommitCoordinator, CommitOutcome, DEFAULT_NUMBER_RETRIES, LowStockAlert};
pub use error::{CommitError, Result};
pub use intent::IntentRecord;
pub use numbering::OrderNumberGenerator;
pub use recovery::{IntentRecovery, RecoveryReport};
pub use status::StatusTransition;
