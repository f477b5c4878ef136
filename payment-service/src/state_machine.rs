use shared::{Actor, PaymentIntent, PaymentStatus, Role};

use crate::error::PaymentError;

/// Payment intent lifecycle rules.
#[derive(Debug, Clone)]
pub struct PaymentStateMachine;

impl PaymentStateMachine {
    /// Statuses reachable in one step from `from`.
    pub fn valid_transitions(from: PaymentStatus) -> &'static [PaymentStatus] {
        match from {
            PaymentStatus::Created => &[PaymentStatus::Pending, PaymentStatus::Cancelled],
            PaymentStatus::Pending => &[
                PaymentStatus::Succeeded,
                PaymentStatus::Failed,
                PaymentStatus::Cancelled,
            ],
            PaymentStatus::Succeeded => &[PaymentStatus::Refunded],
            PaymentStatus::Failed => &[],
            PaymentStatus::Cancelled => &[],
            PaymentStatus::Refunded => &[],
        }
    }

    pub fn can_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
        Self::valid_transitions(from).contains(&to)
    }

    pub fn check_transition(from: PaymentStatus, to: PaymentStatus) -> Result<(), PaymentError> {
        if Self::can_transition(from, to) {
            Ok(())
        } else {
            Err(PaymentError::InvalidTransition { from, to })
        }
    }

    /// Checks that `actor` may move `intent` to `target`. Runs before the
    /// transition table so an unauthorized caller learns nothing about the
    /// intent's current status.
    pub fn authorize(
        actor: &Actor,
        intent: &PaymentIntent,
        target: PaymentStatus,
    ) -> Result<(), PaymentError> {
        if intent.user_id != actor.user_id {
            return Err(PaymentError::Forbidden("payment intent belongs to another user"));
        }

        match (target, actor.role) {
            (PaymentStatus::Succeeded, Role::Client) => Err(PaymentError::Forbidden(
                "clients cannot mark a payment as succeeded",
            )),
            (PaymentStatus::Refunded, role) if !role.is_staff() => {
                Err(PaymentError::Forbidden("only staff can refund a payment"))
            }
            _ => Ok(()),
        }
    }

    /// Authorization followed by the transition table.
    pub fn validate(
        actor: &Actor,
        intent: &PaymentIntent,
        target: PaymentStatus,
    ) -> Result<(), PaymentError> {
        Self::authorize(actor, intent, target)?;
        Self::check_transition(intent.status, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn intent_owned_by(user_id: Uuid, status: PaymentStatus) -> PaymentIntent {
        let now = Utc::now();
        PaymentIntent {
            id: Uuid::new_v4(),
            user_id,
            salon_id: None,
            appointment_id: None,
            payment_method_id: None,
            amount: 10_000,
            currency: "XAF".to_string(),
            discount_amount: 0,
            payable_amount: 10_000,
            platform_fee_amount: 1_000,
            provider_fee_amount: 0,
            net_amount: 9_000,
            applied_discount_tier: None,
            provider: "manual".to_string(),
            provider_ref: None,
            provider_data: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    const TABLE: [(PaymentStatus, PaymentStatus); 6] = [
        (PaymentStatus::Created, PaymentStatus::Pending),
        (PaymentStatus::Created, PaymentStatus::Cancelled),
        (PaymentStatus::Pending, PaymentStatus::Succeeded),
        (PaymentStatus::Pending, PaymentStatus::Failed),
        (PaymentStatus::Pending, PaymentStatus::Cancelled),
        (PaymentStatus::Succeeded, PaymentStatus::Refunded),
    ];

    #[test]
    fn only_listed_pairs_are_transitions() {
        for from in PaymentStatus::ALL {
            for to in PaymentStatus::ALL {
                let listed = TABLE.contains(&(from, to));
                assert_eq!(
                    PaymentStateMachine::can_transition(from, to),
                    listed,
                    "{from} -> {to}"
                );
                if !listed {
                    assert!(matches!(
                        PaymentStateMachine::check_transition(from, to),
                        Err(PaymentError::InvalidTransition { from: f, to: t }) if f == from && t == to
                    ));
                }
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in PaymentStatus::ALL.into_iter().filter(PaymentStatus::is_terminal) {
            assert!(PaymentStateMachine::valid_transitions(status).is_empty());
        }
    }

    #[test]
    fn created_cannot_skip_pending() {
        assert!(matches!(
            PaymentStateMachine::check_transition(PaymentStatus::Created, PaymentStatus::Succeeded),
            Err(PaymentError::InvalidTransition {
                from: PaymentStatus::Created,
                to: PaymentStatus::Succeeded
            })
        ));
    }

    #[test]
    fn non_owner_is_forbidden_whatever_the_role() {
        let intent = intent_owned_by(Uuid::new_v4(), PaymentStatus::Pending);
        for role in Role::ALL {
            let stranger = Actor::new(Uuid::new_v4(), role);
            assert!(matches!(
                PaymentStateMachine::authorize(&stranger, &intent, PaymentStatus::Cancelled),
                Err(PaymentError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn client_can_never_mark_succeeded() {
        let user_id = Uuid::new_v4();
        let client = Actor::new(user_id, Role::Client);
        for status in PaymentStatus::ALL {
            let intent = intent_owned_by(user_id, status);
            assert!(matches!(
                PaymentStateMachine::validate(&client, &intent, PaymentStatus::Succeeded),
                Err(PaymentError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn only_staff_can_refund() {
        let user_id = Uuid::new_v4();
        let intent = intent_owned_by(user_id, PaymentStatus::Succeeded);
        for role in Role::ALL {
            let result =
                PaymentStateMachine::validate(&Actor::new(user_id, role), &intent, PaymentStatus::Refunded);
            match role {
                Role::Client => assert!(matches!(result, Err(PaymentError::Forbidden(_)))),
                Role::Professional | Role::Employee | Role::Admin => assert!(result.is_ok()),
            }
        }
    }

    #[test]
    fn authorization_is_checked_before_the_table() {
        let user_id = Uuid::new_v4();
        let intent = intent_owned_by(user_id, PaymentStatus::Created);
        let client = Actor::new(user_id, Role::Client);
        // CREATED -> SUCCEEDED is also an invalid transition; the role check wins.
        assert!(matches!(
            PaymentStateMachine::validate(&client, &intent, PaymentStatus::Succeeded),
            Err(PaymentError::Forbidden(_))
        ));
    }

    #[test]
    fn client_may_cancel_own_pending_intent() {
        let user_id = Uuid::new_v4();
        let intent = intent_owned_by(user_id, PaymentStatus::Pending);
        let client = Actor::new(user_id, Role::Client);
        assert!(PaymentStateMachine::validate(&client, &intent, PaymentStatus::Cancelled).is_ok());
    }
}
