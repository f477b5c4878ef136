use async_trait::async_trait;
use bb8::PooledConnection;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use shared::{
    AppointmentStatus, LoyaltyAccount, LoyaltyTransaction, PaymentIntent, PaymentMethod,
};
use uuid::Uuid;

use super::{PaymentStore, StoreError, UnitOfWork};
use crate::models::*;
use crate::schema::*;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies pending migrations over a blocking connection.
pub fn run_migrations(database_url: &str) -> anyhow::Result<()> {
    let mut conn = diesel::PgConnection::establish(database_url)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;
    Ok(())
}

pub type DbPool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

type PooledPg = PooledConnection<'static, AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Maps a foreign key violation on a new intent to the row it referenced.
fn missing_reference(err: DieselError) -> StoreError {
    if let DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) = &err {
        match info.constraint_name() {
            Some("payment_intents_appointment_id_fkey") => return StoreError::Missing("appointment"),
            Some("payment_intents_payment_method_id_fkey") => {
                return StoreError::Missing("payment method")
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

/// Postgres-backed store. Units of work are database transactions that take
/// `FOR UPDATE` row locks.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<PooledPg, StoreError> {
        self.pool
            .get_owned()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let mut conn = self.connection().await?;
        AnsiTransactionManager::begin_transaction(&mut *conn).await?;
        Ok(Box::new(PgUnitOfWork { conn }))
    }

    async fn insert_intent(&self, intent: &PaymentIntent) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        diesel::insert_into(payment_intents::table)
            .values(&PaymentIntentRow::from(intent))
            .execute(&mut *conn)
            .await
            .map_err(missing_reference)?;
        Ok(())
    }

    async fn find_intent(&self, id: Uuid) -> Result<Option<PaymentIntent>, StoreError> {
        let mut conn = self.connection().await?;
        payment_intents::table
            .find(id)
            .first::<PaymentIntentRow>(&mut *conn)
            .await
            .optional()?
            .map(PaymentIntent::try_from)
            .transpose()
    }

    async fn list_intents_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PaymentIntent>, StoreError> {
        let mut conn = self.connection().await?;
        payment_intents::table
            .filter(payment_intents::user_id.eq(user_id))
            .order(payment_intents::created_at.desc())
            .limit(limit)
            .load::<PaymentIntentRow>(&mut *conn)
            .await?
            .into_iter()
            .map(PaymentIntent::try_from)
            .collect()
    }

    async fn find_payment_method(&self, id: Uuid) -> Result<Option<PaymentMethod>, StoreError> {
        let mut conn = self.connection().await?;
        let row = payment_methods::table
            .find(id)
            .first::<PaymentMethodRow>(&mut *conn)
            .await
            .optional()?;
        Ok(row.map(PaymentMethod::from))
    }

    async fn find_loyalty_account(
        &self,
        user_id: Uuid,
    ) -> Result<Option<LoyaltyAccount>, StoreError> {
        let mut conn = self.connection().await?;
        loyalty_accounts::table
            .filter(loyalty_accounts::user_id.eq(user_id))
            .first::<LoyaltyAccountRow>(&mut *conn)
            .await
            .optional()?
            .map(LoyaltyAccount::try_from)
            .transpose()
    }

    async fn recent_loyalty_transactions(
        &self,
        loyalty_account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LoyaltyTransaction>, StoreError> {
        let mut conn = self.connection().await?;
        loyalty_transactions::table
            .filter(loyalty_transactions::loyalty_account_id.eq(loyalty_account_id))
            .order(loyalty_transactions::created_at.desc())
            .limit(limit)
            .load::<LoyaltyTransactionRow>(&mut *conn)
            .await?
            .into_iter()
            .map(LoyaltyTransaction::try_from)
            .collect()
    }
}

/// A connection checked out of the pool with an open transaction. If it is dropped
/// without commit or rollback the pool sees the open transaction, discards the
/// connection and the server rolls the transaction back.
struct PgUnitOfWork {
    conn: PooledPg,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_intent(&mut self, id: Uuid) -> Result<Option<PaymentIntent>, StoreError> {
        payment_intents::table
            .find(id)
            .for_update()
            .first::<PaymentIntentRow>(&mut *self.conn)
            .await
            .optional()?
            .map(PaymentIntent::try_from)
            .transpose()
    }

    async fn update_intent_status(&mut self, intent: &PaymentIntent) -> Result<(), StoreError> {
        diesel::update(payment_intents::table.find(intent.id))
            .set((
                payment_intents::status.eq(intent.status.as_str()),
                payment_intents::provider_ref.eq(intent.provider_ref.clone()),
                payment_intents::provider_data.eq(intent.provider_data.clone()),
                payment_intents::updated_at.eq(intent.updated_at),
            ))
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn set_appointment_status(
        &mut self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<(), StoreError> {
        let updated = diesel::update(appointments::table.find(appointment_id))
            .set((
                appointments::status.eq(status.as_str()),
                appointments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut *self.conn)
            .await?;

        if updated == 0 {
            return Err(StoreError::Missing("appointment"));
        }
        Ok(())
    }

    async fn lock_loyalty_account(
        &mut self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<LoyaltyAccount, StoreError> {
        let fresh = LoyaltyAccount::new(user_id, now);
        diesel::insert_into(loyalty_accounts::table)
            .values(&LoyaltyAccountRow::from(&fresh))
            .on_conflict(loyalty_accounts::user_id)
            .do_nothing()
            .execute(&mut *self.conn)
            .await?;

        let row = loyalty_accounts::table
            .filter(loyalty_accounts::user_id.eq(user_id))
            .for_update()
            .first::<LoyaltyAccountRow>(&mut *self.conn)
            .await?;
        LoyaltyAccount::try_from(row)
    }

    async fn append_loyalty_transaction(
        &mut self,
        entry: &LoyaltyTransaction,
    ) -> Result<(), StoreError> {
        diesel::insert_into(loyalty_transactions::table)
            .values(&LoyaltyTransactionRow::from(entry))
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn save_loyalty_account(&mut self, account: &LoyaltyAccount) -> Result<(), StoreError> {
        diesel::update(loyalty_accounts::table.find(account.id))
            .set(&LoyaltyAccountChanges::from(account))
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut conn = self.conn;
        AnsiTransactionManager::commit_transaction(&mut *conn).await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let mut conn = self.conn;
        AnsiTransactionManager::rollback_transaction(&mut *conn).await?;
        Ok(())
    }
}
