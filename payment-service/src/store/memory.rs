use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    AppointmentStatus, LoyaltyAccount, LoyaltyTransaction, PaymentIntent, PaymentMethod,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{PaymentStore, StoreError, UnitOfWork};

#[derive(Debug, Default, Clone)]
struct Tables {
    // Insertion order.
    intents: Vec<PaymentIntent>,
    // Keyed by user id.
    loyalty_accounts: HashMap<Uuid, LoyaltyAccount>,
    loyalty_transactions: Vec<LoyaltyTransaction>,
    appointments: HashMap<Uuid, AppointmentStatus>,
    payment_methods: HashMap<Uuid, PaymentMethod>,
}

/// In-process store used by tests and local runs.
///
/// A unit of work holds the store's lock for its whole life and writes to a staged
/// copy of the tables, so units of work are fully serialized and a rollback (or a
/// drop) leaves the committed tables untouched.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_payment_method(&self, method: PaymentMethod) {
        self.tables
            .lock()
            .await
            .payment_methods
            .insert(method.id, method);
    }

    pub async fn add_appointment(&self, appointment_id: Uuid, status: AppointmentStatus) {
        self.tables
            .lock()
            .await
            .appointments
            .insert(appointment_id, status);
    }

    /// Deletes an appointment out from under any intent that references it.
    pub async fn remove_appointment(&self, appointment_id: Uuid) {
        self.tables
            .lock()
            .await
            .appointments
            .remove(&appointment_id);
    }

    pub async fn appointment_status(&self, appointment_id: Uuid) -> Option<AppointmentStatus> {
        self.tables
            .lock()
            .await
            .appointments
            .get(&appointment_id)
            .copied()
    }

    pub async fn put_loyalty_account(&self, account: LoyaltyAccount) {
        self.tables
            .lock()
            .await
            .loyalty_accounts
            .insert(account.user_id, account);
    }

    pub async fn loyalty_account(&self, user_id: Uuid) -> Option<LoyaltyAccount> {
        self.tables
            .lock()
            .await
            .loyalty_accounts
            .get(&user_id)
            .cloned()
    }

    /// Every ledger entry of the user's account, oldest first.
    pub async fn loyalty_transactions_for(&self, user_id: Uuid) -> Vec<LoyaltyTransaction> {
        let tables = self.tables.lock().await;
        let Some(account) = tables.loyalty_accounts.get(&user_id) else {
            return Vec::new();
        };
        tables
            .loyalty_transactions
            .iter()
            .filter(|entry| entry.loyalty_account_id == account.id)
            .cloned()
            .collect()
    }

    /// Overwrites a stored intent, bypassing the state machine. Test setup only.
    pub async fn put_intent(&self, intent: PaymentIntent) {
        let mut tables = self.tables.lock().await;
        match tables.intents.iter_mut().find(|stored| stored.id == intent.id) {
            Some(stored) => *stored = intent,
            None => tables.intents.push(intent),
        }
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let committed = self.tables.clone().lock_owned().await;
        let staged = committed.clone();
        Ok(Box::new(InMemoryUnitOfWork { committed, staged }))
    }

    async fn insert_intent(&self, intent: &PaymentIntent) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(appointment_id) = intent.appointment_id {
            if !tables.appointments.contains_key(&appointment_id) {
                return Err(StoreError::Missing("appointment"));
            }
        }
        if let Some(method_id) = intent.payment_method_id {
            if !tables.payment_methods.contains_key(&method_id) {
                return Err(StoreError::Missing("payment method"));
            }
        }
        tables.intents.push(intent.clone());
        Ok(())
    }

    async fn find_intent(&self, id: Uuid) -> Result<Option<PaymentIntent>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.intents.iter().find(|intent| intent.id == id).cloned())
    }

    async fn list_intents_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PaymentIntent>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .intents
            .iter()
            .rev()
            .filter(|intent| intent.user_id == user_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn find_payment_method(&self, id: Uuid) -> Result<Option<PaymentMethod>, StoreError> {
        Ok(self.tables.lock().await.payment_methods.get(&id).cloned())
    }

    async fn find_loyalty_account(
        &self,
        user_id: Uuid,
    ) -> Result<Option<LoyaltyAccount>, StoreError> {
        Ok(self.tables.lock().await.loyalty_accounts.get(&user_id).cloned())
    }

    async fn recent_loyalty_transactions(
        &self,
        loyalty_account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LoyaltyTransaction>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .loyalty_transactions
            .iter()
            .rev()
            .filter(|entry| entry.loyalty_account_id == loyalty_account_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}

struct InMemoryUnitOfWork {
    committed: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_intent(&mut self, id: Uuid) -> Result<Option<PaymentIntent>, StoreError> {
        Ok(self.staged.intents.iter().find(|intent| intent.id == id).cloned())
    }

    async fn update_intent_status(&mut self, intent: &PaymentIntent) -> Result<(), StoreError> {
        let stored = self
            .staged
            .intents
            .iter_mut()
            .find(|stored| stored.id == intent.id)
            .ok_or(StoreError::Missing("payment intent"))?;
        stored.status = intent.status;
        stored.provider_ref = intent.provider_ref.clone();
        stored.provider_data = intent.provider_data.clone();
        stored.updated_at = intent.updated_at;
        Ok(())
    }

    async fn set_appointment_status(
        &mut self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<(), StoreError> {
        let stored = self
            .staged
            .appointments
            .get_mut(&appointment_id)
            .ok_or(StoreError::Missing("appointment"))?;
        *stored = status;
        Ok(())
    }

    async fn lock_loyalty_account(
        &mut self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<LoyaltyAccount, StoreError> {
        Ok(self
            .staged
            .loyalty_accounts
            .entry(user_id)
            .or_insert_with(|| LoyaltyAccount::new(user_id, now))
            .clone())
    }

    async fn append_loyalty_transaction(
        &mut self,
        entry: &LoyaltyTransaction,
    ) -> Result<(), StoreError> {
        self.staged.loyalty_transactions.push(entry.clone());
        Ok(())
    }

    async fn save_loyalty_account(&mut self, account: &LoyaltyAccount) -> Result<(), StoreError> {
        self.staged
            .loyalty_accounts
            .insert(account.user_id, account.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnitOfWork {
            mut committed,
            staged,
        } = *self;
        *committed = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
