//! Payment intents and the loyalty ledger they feed.
//!
//! An intent is priced once at creation ([`intents`]), moves through a fixed
//! lifecycle ([`state_machine`]), and on success settles atomically into the
//! customer's loyalty account ([`coordinator`], [`ledger`]).

pub mod api;
pub mod coordinator;
pub mod error;
pub mod intents;
pub mod ledger;
pub mod models;
pub mod schema;
pub mod state_machine;
pub mod store;

pub use coordinator::TransactionCoordinator;
pub use error::PaymentError;
pub use intents::PaymentIntentStore;
pub use ledger::LoyaltyLedger;
pub use state_machine::PaymentStateMachine;
pub use store::{InMemoryStore, PaymentStore, PgStore, StoreError, UnitOfWork};
