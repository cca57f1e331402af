pub mod checkout;

pub use checkout::{
    CheckoutAction, CheckoutContext, CheckoutEvent, CheckoutFlow, CheckoutPhase,
    FlowTransitionError, TransitionOutcome,
};
