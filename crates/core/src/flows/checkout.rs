use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::session::{ContactField, ConversationMode, Session};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutPhase {
    Idle,
    Collecting,
    Confirming,
    Placing,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutEvent {
    ContactIncomplete,
    ContactComplete,
    Affirmed,
    OrderPlaced,
    OrderFailed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CheckoutContext {
    pub cart_empty: bool,
    pub missing_fields: Vec<ContactField>,
}

impl CheckoutContext {
    pub fn from_session(session: &Session) -> Self {
        Self {
            cart_empty: session.cart.is_empty(),
            missing_fields: session.contact.missing_fields(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutAction {
    PromptForContact,
    PresentSummary,
    SubmitOrder,
    RememberOrder,
    ClearCart,
    ClearContact,
    ReportFailure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: CheckoutPhase,
    pub to: CheckoutPhase,
    pub event: CheckoutEvent,
    pub actions: Vec<CheckoutAction>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("checkout requires a non-empty cart")]
    EmptyCart,
    #[error("missing contact fields before {phase:?}: {missing_fields:?}")]
    MissingContactFields { phase: CheckoutPhase, missing_fields: Vec<ContactField> },
    #[error("invalid transition from {phase:?} using event {event:?}")]
    InvalidTransition { phase: CheckoutPhase, event: CheckoutEvent },
}

/// Table-driven checkout flow. Pure: callers perform the returned actions.
#[derive(Clone, Debug, Default)]
pub struct CheckoutFlow;

impl CheckoutFlow {
    /// Phase implied by a stored session between turns.
    pub fn phase_of(&self, session: &Session) -> CheckoutPhase {
        match session.mode {
            ConversationMode::CheckoutPending if session.contact.is_complete() => {
                CheckoutPhase::Confirming
            }
            ConversationMode::CheckoutPending => CheckoutPhase::Collecting,
            _ => CheckoutPhase::Idle,
        }
    }

    pub fn apply(
        &self,
        current: CheckoutPhase,
        event: CheckoutEvent,
        context: &CheckoutContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_checkout(current, event, context)
    }
}

fn transition_checkout(
    current: CheckoutPhase,
    event: CheckoutEvent,
    context: &CheckoutContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use CheckoutAction::{
        ClearCart, ClearContact, PresentSummary, PromptForContact, RememberOrder, ReportFailure,
        SubmitOrder,
    };
    use CheckoutEvent::{
        Affirmed, ContactComplete, ContactIncomplete, OrderFailed, OrderPlaced,
    };
    use CheckoutPhase::{Collecting, Completed, Confirming, Idle, Placing};

    let entering = matches!(event, ContactIncomplete | ContactComplete | Affirmed);
    if entering && context.cart_empty {
        return Err(FlowTransitionError::EmptyCart);
    }

    let (to, actions) = match (current, event) {
        (Idle | Collecting | Confirming, ContactIncomplete) => (Collecting, vec![PromptForContact]),
        (Idle | Collecting | Confirming, ContactComplete) => (Confirming, vec![PresentSummary]),
        (Idle | Collecting | Confirming, Affirmed) => {
            if !context.missing_fields.is_empty() {
                return Err(FlowTransitionError::MissingContactFields {
                    phase: current,
                    missing_fields: context.missing_fields.clone(),
                });
            }
            (Placing, vec![SubmitOrder])
        }
        (Placing, OrderPlaced) => (Completed, vec![RememberOrder, ClearCart, ClearContact]),
        (Placing, OrderFailed) => (Confirming, vec![ReportFailure]),
        _ => return Err(FlowTransitionError::InvalidTransition { phase: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}

#[cfg(test)]
mod tests {
    use crate::domain::session::{ContactDraft, ContactField, ConversationMode, Session, SessionId};

    use super::{
        CheckoutAction, CheckoutContext, CheckoutEvent, CheckoutFlow, CheckoutPhase,
        FlowTransitionError,
    };

    fn ready() -> CheckoutContext {
        CheckoutContext { cart_empty: false, missing_fields: Vec::new() }
    }

    #[test]
    fn happy_path_collects_confirms_places_and_completes() {
        let flow = CheckoutFlow;
        let incomplete = CheckoutContext {
            cart_empty: false,
            missing_fields: vec![ContactField::Name, ContactField::Email, ContactField::Phone],
        };

        let collecting = flow
            .apply(CheckoutPhase::Idle, CheckoutEvent::ContactIncomplete, &incomplete)
            .expect("idle -> collecting");
        assert_eq!(collecting.to, CheckoutPhase::Collecting);
        assert_eq!(collecting.actions, vec![CheckoutAction::PromptForContact]);

        let confirming = flow
            .apply(collecting.to, CheckoutEvent::ContactComplete, &ready())
            .expect("collecting -> confirming");
        assert_eq!(confirming.to, CheckoutPhase::Confirming);

        let placing = flow
            .apply(confirming.to, CheckoutEvent::Affirmed, &ready())
            .expect("confirming -> placing");
        assert_eq!(placing.actions, vec![CheckoutAction::SubmitOrder]);

        let completed = flow
            .apply(placing.to, CheckoutEvent::OrderPlaced, &ready())
            .expect("placing -> completed");
        assert_eq!(completed.to, CheckoutPhase::Completed);
        assert!(completed.actions.contains(&CheckoutAction::ClearCart));
        assert!(completed.actions.contains(&CheckoutAction::RememberOrder));
    }

    #[test]
    fn failed_placement_returns_to_confirming_without_clearing() {
        let outcome = CheckoutFlow
            .apply(CheckoutPhase::Placing, CheckoutEvent::OrderFailed, &ready())
            .expect("placing -> confirming");

        assert_eq!(outcome.to, CheckoutPhase::Confirming);
        assert_eq!(outcome.actions, vec![CheckoutAction::ReportFailure]);
    }

    #[test]
    fn empty_cart_blocks_every_entry_event() {
        let context = CheckoutContext { cart_empty: true, missing_fields: Vec::new() };
        let events =
            [CheckoutEvent::ContactIncomplete, CheckoutEvent::ContactComplete, CheckoutEvent::Affirmed];
        for event in events {
            for phase in [CheckoutPhase::Idle, CheckoutPhase::Collecting, CheckoutPhase::Confirming]
            {
                assert_eq!(
                    CheckoutFlow.apply(phase, event, &context),
                    Err(FlowTransitionError::EmptyCart)
                );
            }
        }
    }

    #[test]
    fn affirmation_with_missing_fields_is_rejected() {
        let context =
            CheckoutContext { cart_empty: false, missing_fields: vec![ContactField::Phone] };
        let error = CheckoutFlow
            .apply(CheckoutPhase::Collecting, CheckoutEvent::Affirmed, &context)
            .expect_err("must not place with incomplete contact");

        assert!(matches!(error, FlowTransitionError::MissingContactFields { .. }));
    }

    #[test]
    fn completed_checkout_cannot_be_placed_again() {
        let error = CheckoutFlow
            .apply(CheckoutPhase::Completed, CheckoutEvent::OrderPlaced, &ready())
            .expect_err("completed is terminal");

        assert_eq!(
            error,
            FlowTransitionError::InvalidTransition {
                phase: CheckoutPhase::Completed,
                event: CheckoutEvent::OrderPlaced,
            }
        );
    }

    #[test]
    fn phase_of_reads_mode_and_contact() {
        let mut session = Session::new(SessionId::from("s-1"));
        assert_eq!(CheckoutFlow.phase_of(&session), CheckoutPhase::Idle);

        session.mode = ConversationMode::CheckoutPending;
        assert_eq!(CheckoutFlow.phase_of(&session), CheckoutPhase::Collecting);

        session.contact = ContactDraft {
            name: "Jane Roe".to_owned(),
            email: "jane@example.com".to_owned(),
            phone: "+15550001111".to_owned(),
        };
        assert_eq!(CheckoutFlow.phase_of(&session), CheckoutPhase::Confirming);
    }
}
