use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    LoyaltyAccount, LoyaltyTier, LoyaltyTransaction, PaymentIntent, MINOR_UNITS_PER_POINT,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::store::{PaymentStore, UnitOfWork};

/// Ledger entries returned with a loyalty summary.
pub const SUMMARY_TRANSACTION_LIMIT: i64 = 20;

/// Discount that the next priced intent would receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingDiscount {
    pub amount: i64,
    pub tier: Option<LoyaltyTier>,
}

/// What a settlement did to a loyalty account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub earned_points: i64,
    pub previous_tier: LoyaltyTier,
    pub tier: LoyaltyTier,
    pub discount_consumed: bool,
    pub discount_issued: Option<i64>,
}

impl SettlementOutcome {
    pub fn tier_up(&self) -> bool {
        self.tier != self.previous_tier
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoyaltySummary {
    pub account: LoyaltyAccount,
    pub recent_transactions: Vec<LoyaltyTransaction>,
}

pub fn earned_points(payable: i64) -> i64 {
    if payable <= 0 {
        return 0;
    }
    payable / MINOR_UNITS_PER_POINT
}

/// Applies a successful payment to an account in place.
///
/// The intent's own discount is consumed before issuance is considered, so a payment
/// that spends a discount and crosses a tier threshold is granted the new tier's
/// reward in the same call.
pub fn apply_settlement(
    account: &mut LoyaltyAccount,
    intent: &PaymentIntent,
    earned: i64,
    now: DateTime<Utc>,
) -> SettlementOutcome {
    let previous_tier = account.tier;
    let current_points = account.current_points + earned;
    let lifetime_points = account.lifetime_points + earned;
    let tier = LoyaltyTier::for_lifetime_points(lifetime_points);
    let tier_up = tier != previous_tier;

    let discount_consumed = intent.carries_discount();
    if discount_consumed {
        account.pending_discount_amount = 0;
        account.pending_discount_tier = None;
        account.pending_discount_consumed_at = Some(now);
        account.pending_discount_consumed_intent_id = Some(intent.id);
    }

    let mut discount_issued = None;
    let reward = tier.discount_reward();
    if tier_up && !account.has_pending_discount() && reward > 0 {
        account.pending_discount_amount = reward;
        account.pending_discount_tier = Some(tier);
        account.pending_discount_issued_at = Some(now);
        discount_issued = Some(reward);
    }

    account.current_points = current_points;
    account.lifetime_points = lifetime_points;
    account.tier = tier;
    account.updated_at = now;

    SettlementOutcome {
        earned_points: earned,
        previous_tier,
        tier,
        discount_consumed,
        discount_issued,
    }
}

/// Per-user loyalty accounts and their append-only point history.
pub struct LoyaltyLedger {
    store: Arc<dyn PaymentStore>,
}

impl LoyaltyLedger {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    /// Read-only preview of the user's pending discount. Nothing is reserved.
    pub async fn pending_discount(&self, user_id: Uuid) -> Result<PendingDiscount, PaymentError> {
        let discount = match self.store.find_loyalty_account(user_id).await? {
            Some(account) => PendingDiscount {
                amount: account.pending_discount_amount.max(0),
                tier: account.pending_discount_tier,
            },
            None => PendingDiscount::default(),
        };
        Ok(discount)
    }

    /// The user's account and latest entries.
    ///
    /// A user without an account gets an unsaved BRONZE view with the nil id; no
    /// row is created until their first settlement.
    pub async fn summary(&self, user_id: Uuid) -> Result<LoyaltySummary, PaymentError> {
        let Some(account) = self.store.find_loyalty_account(user_id).await? else {
            return Ok(LoyaltySummary {
                account: LoyaltyAccount {
                    id: Uuid::nil(),
                    ..LoyaltyAccount::new(user_id, Utc::now())
                },
                recent_transactions: Vec::new(),
            });
        };

        let recent_transactions = self
            .store
            .recent_loyalty_transactions(account.id, SUMMARY_TRANSACTION_LIMIT)
            .await?;

        Ok(LoyaltySummary {
            account,
            recent_transactions,
        })
    }

    /// Credits a succeeded intent to its owner's account inside `uow`. The account
    /// row stays locked until the unit of work ends.
    pub async fn record_settlement(
        &self,
        uow: &mut dyn UnitOfWork,
        intent: &PaymentIntent,
    ) -> Result<SettlementOutcome, PaymentError> {
        let now = Utc::now();
        let payable = intent.settlement_basis();
        let earned = earned_points(payable);

        let mut account = uow.lock_loyalty_account(intent.user_id, now).await?;

        if earned > 0 {
            let entry = LoyaltyTransaction::booking(account.id, earned, intent.id, payable, now);
            uow.append_loyalty_transaction(&entry).await?;
        }

        let outcome = apply_settlement(&mut account, intent, earned, now);
        uow.save_loyalty_account(&account).await?;

        info!(
            "Loyalty account {} credited {} points for intent {} (lifetime {})",
            account.id, outcome.earned_points, intent.id, account.lifetime_points
        );
        if outcome.tier_up() {
            info!(
                "Loyalty account {} moved from {} to {}",
                account.id, outcome.previous_tier, outcome.tier
            );
        }
        if outcome.discount_consumed {
            info!("Pending discount of account {} consumed by intent {}", account.id, intent.id);
        }
        if let Some(amount) = outcome.discount_issued {
            info!("Issued {} {} discount to account {}", amount, outcome.tier, account.id);
        }

        Ok(outcome)
    }
}
