use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared::{
    LoyaltyAccount, LoyaltyTier, LoyaltyTransaction, ParseEnumError, PaymentIntent,
    PaymentMethod,
};
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::payment_intents)]
pub struct PaymentIntentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub salon_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub discount_amount: i64,
    pub payable_amount: i64,
    pub platform_fee_amount: i64,
    pub provider_fee_amount: i64,
    pub net_amount: i64,
    pub applied_discount_tier: Option<String>,
    pub provider: String,
    pub provider_ref: Option<String>,
    pub provider_data: Option<serde_json::Value>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::loyalty_accounts)]
pub struct LoyaltyAccountRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: String,
    pub current_points: i64,
    pub lifetime_points: i64,
    pub pending_discount_amount: i64,
    pub pending_discount_tier: Option<String>,
    pub pending_discount_issued_at: Option<DateTime<Utc>>,
    pub pending_discount_consumed_at: Option<DateTime<Utc>>,
    pub pending_discount_consumed_intent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable columns of a loyalty account. Cleared discount fields are written as NULL.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::loyalty_accounts)]
#[diesel(treat_none_as_null = true)]
pub struct LoyaltyAccountChanges {
    pub tier: String,
    pub current_points: i64,
    pub lifetime_points: i64,
    pub pending_discount_amount: i64,
    pub pending_discount_tier: Option<String>,
    pub pending_discount_issued_at: Option<DateTime<Utc>>,
    pub pending_discount_consumed_at: Option<DateTime<Utc>>,
    pub pending_discount_consumed_intent_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::loyalty_transactions)]
pub struct LoyaltyTransactionRow {
    pub id: Uuid,
    pub loyalty_account_id: Uuid,
    pub delta_points: i64,
    pub reason: String,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable)]
pub struct PaymentMethodRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub is_active: bool,
}

fn corrupt(err: ParseEnumError) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn parse_tier(value: Option<String>) -> Result<Option<LoyaltyTier>, StoreError> {
    value.map(|tier| tier.parse().map_err(corrupt)).transpose()
}

impl TryFrom<PaymentIntentRow> for PaymentIntent {
    type Error = StoreError;

    fn try_from(row: PaymentIntentRow) -> Result<Self, Self::Error> {
        Ok(PaymentIntent {
            id: row.id,
            user_id: row.user_id,
            salon_id: row.salon_id,
            appointment_id: row.appointment_id,
            payment_method_id: row.payment_method_id,
            amount: row.amount,
            currency: row.currency,
            discount_amount: row.discount_amount,
            payable_amount: row.payable_amount,
            platform_fee_amount: row.platform_fee_amount,
            provider_fee_amount: row.provider_fee_amount,
            net_amount: row.net_amount,
            applied_discount_tier: parse_tier(row.applied_discount_tier)?,
            provider: row.provider,
            provider_ref: row.provider_ref,
            provider_data: row.provider_data,
            status: row.status.parse().map_err(corrupt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&PaymentIntent> for PaymentIntentRow {
    fn from(intent: &PaymentIntent) -> Self {
        PaymentIntentRow {
            id: intent.id,
            user_id: intent.user_id,
            salon_id: intent.salon_id,
            appointment_id: intent.appointment_id,
            payment_method_id: intent.payment_method_id,
            amount: intent.amount,
            currency: intent.currency.clone(),
            discount_amount: intent.discount_amount,
            payable_amount: intent.payable_amount,
            platform_fee_amount: intent.platform_fee_amount,
            provider_fee_amount: intent.provider_fee_amount,
            net_amount: intent.net_amount,
            applied_discount_tier: intent.applied_discount_tier.map(|t| t.as_str().to_string()),
            provider: intent.provider.clone(),
            provider_ref: intent.provider_ref.clone(),
            provider_data: intent.provider_data.clone(),
            status: intent.status.as_str().to_string(),
            created_at: intent.created_at,
            updated_at: intent.updated_at,
        }
    }
}

impl TryFrom<LoyaltyAccountRow> for LoyaltyAccount {
    type Error = StoreError;

    fn try_from(row: LoyaltyAccountRow) -> Result<Self, Self::Error> {
        Ok(LoyaltyAccount {
            id: row.id,
            user_id: row.user_id,
            tier: row.tier.parse().map_err(corrupt)?,
            current_points: row.current_points,
            lifetime_points: row.lifetime_points,
            pending_discount_amount: row.pending_discount_amount,
            pending_discount_tier: parse_tier(row.pending_discount_tier)?,
            pending_discount_issued_at: row.pending_discount_issued_at,
            pending_discount_consumed_at: row.pending_discount_consumed_at,
            pending_discount_consumed_intent_id: row.pending_discount_consumed_intent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&LoyaltyAccount> for LoyaltyAccountRow {
    fn from(account: &LoyaltyAccount) -> Self {
        LoyaltyAccountRow {
            id: account.id,
            user_id: account.user_id,
            tier: account.tier.as_str().to_string(),
            current_points: account.current_points,
            lifetime_points: account.lifetime_points,
            pending_discount_amount: account.pending_discount_amount,
            pending_discount_tier: account.pending_discount_tier.map(|t| t.as_str().to_string()),
            pending_discount_issued_at: account.pending_discount_issued_at,
            pending_discount_consumed_at: account.pending_discount_consumed_at,
            pending_discount_consumed_intent_id: account.pending_discount_consumed_intent_id,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

impl From<&LoyaltyAccount> for LoyaltyAccountChanges {
    fn from(account: &LoyaltyAccount) -> Self {
        LoyaltyAccountChanges {
            tier: account.tier.as_str().to_string(),
            current_points: account.current_points,
            lifetime_points: account.lifetime_points,
            pending_discount_amount: account.pending_discount_amount,
            pending_discount_tier: account.pending_discount_tier.map(|t| t.as_str().to_string()),
            pending_discount_issued_at: account.pending_discount_issued_at,
            pending_discount_consumed_at: account.pending_discount_consumed_at,
            pending_discount_consumed_intent_id: account.pending_discount_consumed_intent_id,
            updated_at: account.updated_at,
        }
    }
}

impl TryFrom<LoyaltyTransactionRow> for LoyaltyTransaction {
    type Error = StoreError;

    fn try_from(row: LoyaltyTransactionRow) -> Result<Self, Self::Error> {
        Ok(LoyaltyTransaction {
            id: row.id,
            loyalty_account_id: row.loyalty_account_id,
            delta_points: row.delta_points,
            reason: row.reason.parse().map_err(corrupt)?,
            meta: row.meta,
            created_at: row.created_at,
        })
    }
}

impl From<&LoyaltyTransaction> for LoyaltyTransactionRow {
    fn from(entry: &LoyaltyTransaction) -> Self {
        LoyaltyTransactionRow {
            id: entry.id,
            loyalty_account_id: entry.loyalty_account_id,
            delta_points: entry.delta_points,
            reason: entry.reason.as_str().to_string(),
            meta: entry.meta.clone(),
            created_at: entry.created_at,
        }
    }
}

impl From<PaymentMethodRow> for PaymentMethod {
    fn from(row: PaymentMethodRow) -> Self {
        PaymentMethod {
            id: row.id,
            user_id: row.user_id,
            provider: row.provider,
            is_active: row.is_active,
        }
    }
}
