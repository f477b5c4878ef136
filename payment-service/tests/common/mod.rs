//! Shared fixtures for engine tests.
#![allow(dead_code)]

use chrono::Utc;
use payment_service::api::AppState;
use payment_service::InMemoryStore;
use shared::{
    Actor, CreateIntentRequest, LoyaltyAccount, LoyaltyTier, PaymentIntent, PaymentStatus, Role,
    UpdateStatusRequest,
};
use std::sync::Arc;
use uuid::Uuid;

pub const PLATFORM_FEE_PCT: u32 = 10;

/// In-memory store with every engine component wired to it.
pub struct TestContext {
    pub store: InMemoryStore,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let state = AppState::new(Arc::new(store.clone()), PLATFORM_FEE_PCT);
        Self { store, state }
    }

    pub async fn create(&self, user_id: Uuid, request: CreateIntentRequest) -> PaymentIntent {
        self.state
            .intents
            .create(user_id, request)
            .await
            .expect("intent should be created")
    }

    /// Creates an intent and moves it to PENDING as its owner.
    pub async fn pending_intent(&self, owner: &Actor, request: CreateIntentRequest) -> PaymentIntent {
        let intent = self.create(owner.user_id, request).await;
        self.state
            .coordinator
            .update_status(owner, intent.id, UpdateStatusRequest::to(PaymentStatus::Pending))
            .await
            .expect("CREATED -> PENDING should be allowed")
    }

    pub async fn settle(&self, owner: &Actor, intent_id: Uuid) -> PaymentIntent {
        self.state
            .coordinator
            .update_status(owner, intent_id, UpdateStatusRequest::to(PaymentStatus::Succeeded))
            .await
            .expect("PENDING -> SUCCEEDED should be allowed")
    }

    /// Seeds a loyalty account with the given balance and pending discount.
    pub async fn seed_account(
        &self,
        user_id: Uuid,
        lifetime_points: i64,
        pending_discount: Option<(i64, LoyaltyTier)>,
    ) -> LoyaltyAccount {
        let mut account = LoyaltyAccount::new(user_id, Utc::now());
        account.current_points = lifetime_points;
        account.lifetime_points = lifetime_points;
        account.tier = LoyaltyTier::for_lifetime_points(lifetime_points);
        if let Some((amount, tier)) = pending_discount {
            account.pending_discount_amount = amount;
            account.pending_discount_tier = Some(tier);
            account.pending_discount_issued_at = Some(Utc::now());
        }
        self.store.put_loyalty_account(account.clone()).await;
        account
    }

    /// Places an intent directly in `status`, skipping the state machine.
    pub async fn intent_in_status(&self, owner: &Actor, status: PaymentStatus) -> PaymentIntent {
        let mut intent = self.create(owner.user_id, CreateIntentRequest::new(5_000, "XAF")).await;
        intent.status = status;
        self.store.put_intent(intent.clone()).await;
        intent
    }
}

pub fn professional() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Professional)
}

pub fn client() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Client)
}
