use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Minor currency units per loyalty point earned.
pub const MINOR_UNITS_PER_POINT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Created,
    Pending,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Created,
        PaymentStatus::Pending,
        PaymentStatus::Succeeded,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "CREATED",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Succeeded => "SUCCEEDED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(PaymentStatus::Created),
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCEEDED" => Ok(PaymentStatus::Succeeded),
            "FAILED" => Ok(PaymentStatus::Failed),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(ParseEnumError::new("payment status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Client,
    Professional,
    Employee,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Client, Role::Professional, Role::Employee, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "CLIENT",
            Role::Professional => "PROFESSIONAL",
            Role::Employee => "EMPLOYEE",
            Role::Admin => "ADMIN",
        }
    }

    /// Salon-side roles allowed to settle and refund payments.
    pub fn is_staff(&self) -> bool {
        match self {
            Role::Client => false,
            Role::Professional | Role::Employee | Role::Admin => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CLIENT" => Ok(Role::Client),
            "PROFESSIONAL" => Ok(Role::Professional),
            "EMPLOYEE" => Ok(Role::Employee),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(ParseEnumError::new("role", s)),
        }
    }
}

/// Authenticated principal supplied by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoyaltyTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoyaltyTier::Bronze => "BRONZE",
            LoyaltyTier::Silver => "SILVER",
            LoyaltyTier::Gold => "GOLD",
            LoyaltyTier::Platinum => "PLATINUM",
        }
    }

    /// Tier reached with the given cumulative points.
    pub fn for_lifetime_points(points: i64) -> Self {
        match points {
            p if p >= 5000 => LoyaltyTier::Platinum,
            p if p >= 2000 => LoyaltyTier::Gold,
            p if p >= 500 => LoyaltyTier::Silver,
            _ => LoyaltyTier::Bronze,
        }
    }

    /// One-time discount, in minor units, granted on reaching this tier.
    pub fn discount_reward(&self) -> i64 {
        match self {
            LoyaltyTier::Bronze => 0,
            LoyaltyTier::Silver => 1000,
            LoyaltyTier::Gold => 3000,
            LoyaltyTier::Platinum => 5000,
        }
    }
}

impl fmt::Display for LoyaltyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoyaltyTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BRONZE" => Ok(LoyaltyTier::Bronze),
            "SILVER" => Ok(LoyaltyTier::Silver),
            "GOLD" => Ok(LoyaltyTier::Gold),
            "PLATINUM" => Ok(LoyaltyTier::Platinum),
            other => Err(ParseEnumError::new("loyalty tier", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoyaltyReason {
    Booking,
}

impl LoyaltyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoyaltyReason::Booking => "BOOKING",
        }
    }
}

impl FromStr for LoyaltyReason {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOOKING" => Ok(LoyaltyReason::Booking),
            other => Err(ParseEnumError::new("loyalty reason", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AppointmentStatus::Pending),
            "CONFIRMED" => Ok(AppointmentStatus::Confirmed),
            "CANCELLED" => Ok(AppointmentStatus::Cancelled),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            other => Err(ParseEnumError::new("appointment status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
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
    pub applied_discount_tier: Option<LoyaltyTier>,
    pub provider: String,
    pub provider_ref: Option<String>,
    pub provider_data: Option<serde_json::Value>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// Amount loyalty points accrue on. Falls back to the gross amount for
    /// records whose payable amount was never populated.
    pub fn settlement_basis(&self) -> i64 {
        if self.payable_amount > 0 {
            self.payable_amount
        } else {
            self.amount
        }
    }

    pub fn carries_discount(&self) -> bool {
        self.discount_amount > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: LoyaltyTier,
    pub current_points: i64,
    pub lifetime_points: i64,
    pub pending_discount_amount: i64,
    pub pending_discount_tier: Option<LoyaltyTier>,
    pub pending_discount_issued_at: Option<DateTime<Utc>>,
    pub pending_discount_consumed_at: Option<DateTime<Utc>>,
    pub pending_discount_consumed_intent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyAccount {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            tier: LoyaltyTier::default(),
            current_points: 0,
            lifetime_points: 0,
            pending_discount_amount: 0,
            pending_discount_tier: None,
            pending_discount_issued_at: None,
            pending_discount_consumed_at: None,
            pending_discount_consumed_intent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_pending_discount(&self) -> bool {
        self.pending_discount_amount > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyTransaction {
    pub id: Uuid,
    pub loyalty_account_id: Uuid,
    pub delta_points: i64,
    pub reason: LoyaltyReason,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl LoyaltyTransaction {
    pub fn booking(
        loyalty_account_id: Uuid,
        delta_points: i64,
        payment_intent_id: Uuid,
        payable_amount: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loyalty_account_id,
            delta_points,
            reason: LoyaltyReason::Booking,
            meta: serde_json::json!({
                "payment_intent_id": payment_intent_id,
                "payable_amount": payable_amount,
            }),
            created_at: now,
        }
    }
}

/// Payment instrument as seen through the payment-method registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    pub amount: i64,
    pub currency: String,
    pub provider: Option<String>,
    pub payment_method_id: Option<Uuid>,
    pub salon_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
}

impl CreateIntentRequest {
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            provider: None,
            payment_method_id: None,
            salon_id: None,
            appointment_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: PaymentStatus,
    pub provider_ref: Option<String>,
    pub provider_data: Option<serde_json::Value>,
}

impl UpdateStatusRequest {
    pub fn to(status: PaymentStatus) -> Self {
        Self {
            status,
            provider_ref: None,
            provider_data: None,
        }
    }
}
