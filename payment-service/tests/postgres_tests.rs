//! Row-locking behaviour of `PgStore` against a live database.
//!
//! Each test returns early when `DATABASE_URL` is unset. Every test works on fresh
//! user ids, so the suite can share one database with other runs.

mod common;

use common::*;
use diesel::prelude::*;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use payment_service::api::AppState;
use payment_service::schema::{appointments, loyalty_accounts};
use payment_service::store::{run_migrations, DbPool, PgStore};
use payment_service::{PaymentError, PaymentStore};
use shared::{
    Actor, AppointmentStatus, CreateIntentRequest, LoyaltyTier, LoyaltyTransaction, PaymentIntent,
    PaymentStatus, UpdateStatusRequest,
};
use std::sync::{Arc, Once};
use uuid::Uuid;

static MIGRATE: Once = Once::new();

struct PgContext {
    pool: DbPool,
    store: Arc<PgStore>,
    state: AppState,
}

async fn pg_context() -> Option<PgContext> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set; skipping Postgres test");
        return None;
    };
    MIGRATE.call_once(|| run_migrations(&database_url).expect("migrations should apply"));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&database_url);
    let pool: DbPool = bb8::Pool::builder()
        .max_size(16)
        .build(config)
        .await
        .expect("pool should build");
    let store = Arc::new(PgStore::new(pool.clone()));
    let state = AppState::new(store.clone(), PLATFORM_FEE_PCT);
    Some(PgContext { pool, store, state })
}

impl PgContext {
    async fn pending_intent(&self, owner: &Actor, request: CreateIntentRequest) -> PaymentIntent {
        let intent = self
            .state
            .intents
            .create(owner.user_id, request)
            .await
            .expect("intent should be created");
        self.state
            .coordinator
            .update_status(owner, intent.id, UpdateStatusRequest::to(PaymentStatus::Pending))
            .await
            .expect("CREATED -> PENDING should be allowed")
    }

    async fn settle(&self, owner: &Actor, intent_id: Uuid) -> PaymentIntent {
        self.state
            .coordinator
            .update_status(owner, intent_id, UpdateStatusRequest::to(PaymentStatus::Succeeded))
            .await
            .expect("PENDING -> SUCCEEDED should be allowed")
    }

    async fn entries(&self, user_id: Uuid) -> Vec<LoyaltyTransaction> {
        let Some(account) = self.store.find_loyalty_account(user_id).await.unwrap() else {
            return Vec::new();
        };
        self.store
            .recent_loyalty_transactions(account.id, 100)
            .await
            .unwrap()
    }

    /// Raw pending-discount columns of the user's account row.
    async fn pending_columns(&self, user_id: Uuid) -> (i64, Option<String>, Option<Uuid>) {
        let mut conn = self.pool.get().await.expect("connection");
        loyalty_accounts::table
            .filter(loyalty_accounts::user_id.eq(user_id))
            .select((
                loyalty_accounts::pending_discount_amount,
                loyalty_accounts::pending_discount_tier,
                loyalty_accounts::pending_discount_consumed_intent_id,
            ))
            .first(&mut *conn)
            .await
            .expect("account row should exist")
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settlements_of_one_intent_credit_once() {
    let Some(ctx) = pg_context().await else {
        return;
    };
    let owner = professional();
    let intent = ctx.pending_intent(&owner, CreateIntentRequest::new(10_000, "XAF")).await;

    let intent_id = intent.id;
    let attempts = (0..8).map(|_| {
        let coordinator = Arc::clone(&ctx.state.coordinator);
        tokio::spawn(async move {
            coordinator
                .update_status(&owner, intent_id, UpdateStatusRequest::to(PaymentStatus::Succeeded))
                .await
        })
    });
    let results = futures::future::join_all(attempts).await;

    let mut succeeded = 0;
    for result in results {
        match result.expect("task should not panic") {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(
                matches!(
                    err,
                    PaymentError::InvalidTransition {
                        from: PaymentStatus::Succeeded,
                        to: PaymentStatus::Succeeded
                    }
                ),
                "{err}"
            ),
        }
    }
    assert_eq!(succeeded, 1);

    let entries = ctx.entries(owner.user_id).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].delta_points, 100);
    let account = ctx.store.find_loyalty_account(owner.user_id).await.unwrap().unwrap();
    assert_eq!(account.lifetime_points, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_settlements_create_one_account() {
    let Some(ctx) = pg_context().await else {
        return;
    };
    let owner = professional();

    let mut intents = Vec::new();
    for _ in 0..6 {
        intents.push(ctx.pending_intent(&owner, CreateIntentRequest::new(10_000, "XAF")).await);
    }

    let settlements = intents.iter().map(|intent| {
        let coordinator = Arc::clone(&ctx.state.coordinator);
        let intent_id = intent.id;
        tokio::spawn(async move {
            coordinator
                .update_status(&owner, intent_id, UpdateStatusRequest::to(PaymentStatus::Succeeded))
                .await
        })
    });
    for result in futures::future::join_all(settlements).await {
        result
            .expect("task should not panic")
            .expect("every settlement should succeed");
    }

    let account = ctx.store.find_loyalty_account(owner.user_id).await.unwrap().unwrap();
    assert_eq!(account.lifetime_points, 600);
    assert_eq!(account.current_points, 600);
    assert_eq!(account.tier, LoyaltyTier::Silver);
    assert_eq!(account.pending_discount_amount, 1_000);
    assert_eq!(account.pending_discount_tier, Some(LoyaltyTier::Silver));
    assert_eq!(ctx.entries(owner.user_id).await.len(), 6);
}

#[tokio::test]
async fn consuming_a_discount_nulls_its_tier() {
    let Some(ctx) = pg_context().await else {
        return;
    };
    let owner = professional();

    let first = ctx.pending_intent(&owner, CreateIntentRequest::new(60_000, "XAF")).await;
    ctx.settle(&owner, first.id).await;
    assert_eq!(
        ctx.pending_columns(owner.user_id).await,
        (1_000, Some(LoyaltyTier::Silver.as_str().to_string()), None)
    );

    let discounted = ctx.pending_intent(&owner, CreateIntentRequest::new(5_000, "XAF")).await;
    assert_eq!(discounted.discount_amount, 1_000);
    ctx.settle(&owner, discounted.id).await;

    assert_eq!(
        ctx.pending_columns(owner.user_id).await,
        (0, None, Some(discounted.id))
    );
}

#[tokio::test]
async fn settlement_confirms_appointment_row() {
    let Some(ctx) = pg_context().await else {
        return;
    };
    let owner = professional();
    let appointment_id = Uuid::new_v4();
    {
        let mut conn = ctx.pool.get().await.expect("connection");
        diesel::insert_into(appointments::table)
            .values((
                appointments::id.eq(appointment_id),
                appointments::status.eq(AppointmentStatus::Pending.as_str()),
            ))
            .execute(&mut *conn)
            .await
            .expect("appointment should be inserted");
    }

    let mut request = CreateIntentRequest::new(5_000, "XAF");
    request.appointment_id = Some(appointment_id);
    let intent = ctx.pending_intent(&owner, request).await;
    ctx.settle(&owner, intent.id).await;

    let mut conn = ctx.pool.get().await.expect("connection");
    let status: String = appointments::table
        .find(appointment_id)
        .select(appointments::status)
        .first(&mut *conn)
        .await
        .expect("appointment should exist");
    assert_eq!(status, AppointmentStatus::Confirmed.as_str());
}

#[tokio::test]
async fn unknown_appointment_is_not_found() {
    let Some(ctx) = pg_context().await else {
        return;
    };
    let mut request = CreateIntentRequest::new(5_000, "XAF");
    request.appointment_id = Some(Uuid::new_v4());

    let result = ctx.state.intents.create(Uuid::new_v4(), request).await;

    assert!(matches!(result, Err(PaymentError::NotFound("appointment"))));
}
