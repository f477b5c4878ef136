use chrono::Utc;
use shared::{Actor, CreateIntentRequest, PaymentIntent, PaymentStatus};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::ledger::{LoyaltyLedger, PendingDiscount};
use crate::store::PaymentStore;

/// Most intents returned by a listing.
pub const LIST_LIMIT: i64 = 50;

/// Provider label when neither the request nor a payment method names one.
pub const DEFAULT_PROVIDER: &str = "manual";

pub const DEFAULT_PLATFORM_FEE_PCT: u32 = 10;

/// Economic fields of an intent, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub discount_amount: i64,
    pub payable_amount: i64,
    pub platform_fee_amount: i64,
    pub provider_fee_amount: i64,
    pub net_amount: i64,
}

impl Pricing {
    pub fn compute(amount: i64, pending_discount: i64, platform_fee_pct: u32) -> Self {
        let discount_amount = pending_discount.max(0).min(amount);
        let payable_amount = amount - discount_amount;
        let platform_fee_amount = percent_of(payable_amount, platform_fee_pct);
        let provider_fee_amount = 0;
        let net_amount = (payable_amount - platform_fee_amount - provider_fee_amount).max(0);

        Self {
            discount_amount,
            payable_amount,
            platform_fee_amount,
            provider_fee_amount,
            net_amount,
        }
    }
}

// Floors for non-negative amounts; widened so large amounts cannot overflow.
fn percent_of(amount: i64, pct: u32) -> i64 {
    let fee = i128::from(amount) * i128::from(pct) / 100;
    i64::try_from(fee).unwrap_or(amount)
}

/// Trims and upper-cases a three-letter currency code.
pub fn normalize_currency(raw: &str) -> Result<String, PaymentError> {
    let code = raw.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(PaymentError::InvalidCurrency(raw.to_string()));
    }
    Ok(code.to_ascii_uppercase())
}

/// Creates and reads payment intents.
pub struct PaymentIntentStore {
    store: Arc<dyn PaymentStore>,
    ledger: Arc<LoyaltyLedger>,
    platform_fee_pct: u32,
}

impl PaymentIntentStore {
    pub fn new(store: Arc<dyn PaymentStore>, ledger: Arc<LoyaltyLedger>, platform_fee_pct: u32) -> Self {
        Self {
            store,
            ledger,
            platform_fee_pct,
        }
    }

    /// Prices and persists a new CREATED intent for `user_id`.
    ///
    /// A pending loyalty discount is priced in but not reserved; it is consumed only
    /// when an intent carrying it succeeds.
    pub async fn create(
        &self,
        user_id: Uuid,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        if request.amount <= 0 {
            return Err(PaymentError::InvalidAmount);
        }
        let currency = normalize_currency(&request.currency)?;

        let PendingDiscount {
            amount: pending_amount,
            tier: pending_tier,
        } = self.ledger.pending_discount(user_id).await?;
        let pricing = Pricing::compute(request.amount, pending_amount, self.platform_fee_pct);
        let applied_discount_tier = if pricing.discount_amount > 0 {
            pending_tier
        } else {
            None
        };

        let mut provider = request.provider.filter(|p| !p.trim().is_empty());
        if let Some(method_id) = request.payment_method_id {
            let method = self
                .store
                .find_payment_method(method_id)
                .await?
                .filter(|method| method.is_active)
                .ok_or(PaymentError::NotFound("payment method"))?;
            if method.user_id != user_id {
                return Err(PaymentError::Forbidden("payment method belongs to another user"));
            }
            provider.get_or_insert(method.provider);
        }

        let now = Utc::now();
        let intent = PaymentIntent {
            id: Uuid::new_v4(),
            user_id,
            salon_id: request.salon_id,
            appointment_id: request.appointment_id,
            payment_method_id: request.payment_method_id,
            amount: request.amount,
            currency,
            discount_amount: pricing.discount_amount,
            payable_amount: pricing.payable_amount,
            platform_fee_amount: pricing.platform_fee_amount,
            provider_fee_amount: pricing.provider_fee_amount,
            net_amount: pricing.net_amount,
            applied_discount_tier,
            provider: provider.unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            provider_ref: None,
            provider_data: None,
            status: PaymentStatus::Created,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_intent(&intent).await?;
        info!(
            "Payment intent {} created for user {}: {} {} (discount {})",
            intent.id, user_id, intent.payable_amount, intent.currency, intent.discount_amount
        );

        Ok(intent)
    }

    /// The user's most recent intents, newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PaymentIntent>, PaymentError> {
        Ok(self.store.list_intents_for_user(user_id, LIST_LIMIT).await?)
    }

    pub async fn get(&self, actor: &Actor, intent_id: Uuid) -> Result<PaymentIntent, PaymentError> {
        let intent = self
            .store
            .find_intent(intent_id)
            .await?
            .ok_or(PaymentError::NotFound("payment intent"))?;
        if intent.user_id != actor.user_id {
            return Err(PaymentError::Forbidden("payment intent belongs to another user"));
        }
        Ok(intent)
    }
}
