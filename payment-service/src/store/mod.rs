mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{run_migrations, DbPool, PgStore, MIGRATIONS};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    AppointmentStatus, LoyaltyAccount, LoyaltyTransaction, PaymentIntent, PaymentMethod,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("{0} not found")]
    Missing(&'static str),
}

/// Reads and inserts that need no isolation, plus the entry point to a unit of work.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Opens a unit of work. Nothing written through it is visible until `commit`.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Fails with `StoreError::Missing` if the referenced appointment or payment
    /// method does not exist.
    async fn insert_intent(&self, intent: &PaymentIntent) -> Result<(), StoreError>;

    async fn find_intent(&self, id: Uuid) -> Result<Option<PaymentIntent>, StoreError>;

    /// Newest first.
    async fn list_intents_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PaymentIntent>, StoreError>;

    async fn find_payment_method(&self, id: Uuid) -> Result<Option<PaymentMethod>, StoreError>;

    async fn find_loyalty_account(
        &self,
        user_id: Uuid,
    ) -> Result<Option<LoyaltyAccount>, StoreError>;

    /// Newest first.
    async fn recent_loyalty_transactions(
        &self,
        loyalty_account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LoyaltyTransaction>, StoreError>;
}

/// An all-or-nothing unit of work.
///
/// Locking reads hold their row until the unit of work ends, so two units of work
/// touching the same intent or the same loyalty account run one after the other.
/// Rows are always locked intent first, loyalty account second.
///
/// Dropping a unit of work without calling `commit` discards its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Reads an intent and locks it against concurrent status changes.
    async fn lock_intent(&mut self, id: Uuid) -> Result<Option<PaymentIntent>, StoreError>;

    /// Writes the mutable fields of an intent: status, provider reference and payload.
    async fn update_intent_status(&mut self, intent: &PaymentIntent) -> Result<(), StoreError>;

    /// Fails with `StoreError::Missing` if the appointment does not exist.
    async fn set_appointment_status(
        &mut self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<(), StoreError>;

    /// Get-or-create the user's loyalty account and lock it.
    async fn lock_loyalty_account(
        &mut self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<LoyaltyAccount, StoreError>;

    async fn append_loyalty_transaction(
        &mut self,
        entry: &LoyaltyTransaction,
    ) -> Result<(), StoreError>;

    async fn save_loyalty_account(&mut self, account: &LoyaltyAccount) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
