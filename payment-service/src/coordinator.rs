use chrono::Utc;
use shared::{Actor, AppointmentStatus, PaymentIntent, PaymentStatus, UpdateStatusRequest};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::PaymentError;
use crate::ledger::LoyaltyLedger;
use crate::state_machine::PaymentStateMachine;
use crate::store::{PaymentStore, UnitOfWork};

/// Applies status changes to payment intents, running the settlement cascade
/// (appointment confirmation and loyalty accrual) in the same unit of work when
/// an intent succeeds.
pub struct TransactionCoordinator {
    store: Arc<dyn PaymentStore>,
    ledger: Arc<LoyaltyLedger>,
}

impl TransactionCoordinator {
    pub fn new(store: Arc<dyn PaymentStore>, ledger: Arc<LoyaltyLedger>) -> Self {
        Self { store, ledger }
    }

    /// Validates and applies a status change. Either every write commits or none do.
    pub async fn update_status(
        &self,
        actor: &Actor,
        intent_id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut uow = self.store.begin().await?;

        let result = self.apply(uow.as_mut(), actor, intent_id, request).await;
        match result {
            Ok(intent) => {
                uow.commit().await?;
                info!("Payment intent {} is now {}", intent.id, intent.status);
                Ok(intent)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    error!("Rollback failed for payment intent {}: {}", intent_id, rollback_err);
                }
                if err.is_client_error() {
                    warn!("Status change on payment intent {} rejected: {}", intent_id, err);
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        uow: &mut dyn UnitOfWork,
        actor: &Actor,
        intent_id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        // The row lock makes the status check and write below a single step per intent.
        let current = uow
            .lock_intent(intent_id)
            .await?
            .ok_or(PaymentError::NotFound("payment intent"))?;

        PaymentStateMachine::validate(actor, &current, request.status)?;

        let mut updated = current;
        updated.status = request.status;
        if let Some(provider_ref) = request.provider_ref {
            updated.provider_ref = Some(provider_ref);
        }
        if let Some(provider_data) = request.provider_data {
            updated.provider_data = Some(provider_data);
        }
        updated.updated_at = Utc::now();
        uow.update_intent_status(&updated).await?;

        if updated.status == PaymentStatus::Succeeded {
            self.settle(uow, actor, &updated).await?;
        }

        Ok(updated)
    }

    async fn settle(
        &self,
        uow: &mut dyn UnitOfWork,
        actor: &Actor,
        intent: &PaymentIntent,
    ) -> Result<(), PaymentError> {
        if intent.user_id != actor.user_id {
            return Err(PaymentError::Forbidden("payment intent belongs to another user"));
        }

        // Unconditional: the appointment's current status is not consulted.
        if let Some(appointment_id) = intent.appointment_id {
            uow.set_appointment_status(appointment_id, AppointmentStatus::Confirmed)
                .await?;
            info!("Appointment {} confirmed by payment intent {}", appointment_id, intent.id);
        }

        self.ledger.record_settlement(uow, intent).await?;
        Ok(())
    }
}
