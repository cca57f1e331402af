use cartline_core::domain::money::format_money;
use cartline_core::domain::order::{
    CustomerIdentity, OrderPlacement, OrderRequest, PlacedOrder,
};
use cartline_core::domain::session::{ContactDraft, ContactField, ConversationMode, Session};
use cartline_core::flows::{
    CheckoutAction, CheckoutContext, CheckoutEvent, CheckoutFlow, CheckoutPhase,
    FlowTransitionError,
};
use cartline_core::ports::OrderGateway;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::shortcuts::is_affirmative;

pub const EMPTY_CART_MESSAGE: &str = "🛒 Your cart is empty! Let me help you find something great.";
pub const CHECKOUT_FAILED_MESSAGE: &str = "❌ Sorry, checkout failed. Please try again.";

/// Reads `"<name>, <email>, <phone>"`. Needs an `@` and at least two commas.
pub fn parse_contact(text: &str) -> Option<ContactDraft> {
    let text = text.trim().trim_matches(|c| c == '\'' || c == '"');
    if !text.contains('@') || text.matches(',').count() < 2 {
        return None;
    }

    let parts: Vec<&str> =
        text.split(',').map(|part| part.trim().trim_matches(|c| c == '\'' || c == '"')).collect();
    match parts.as_slice() {
        [name, email, phone, ..] => Some(ContactDraft {
            name: (*name).to_owned(),
            email: (*email).to_owned(),
            phone: (*phone).to_owned(),
        }),
        _ => None,
    }
}

pub fn mask_email(email: &str) -> String {
    let parts: Vec<&str> = email.split('@').collect();
    match parts.as_slice() {
        [local, domain] => {
            let visible: String = local.chars().take(2).collect();
            format!("{visible}***@{domain}")
        }
        _ => email.to_owned(),
    }
}

pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() < 4 {
        return phone.to_owned();
    }
    let last_four: String = chars[chars.len() - 4..].iter().collect();
    format!("***{last_four}")
}

pub async fn run(
    orders: &dyn OrderGateway,
    checkout_source: &str,
    command: &str,
    session: &mut Session,
    correlation_id: &str,
) -> String {
    let flow = CheckoutFlow;
    if session.cart.is_empty() {
        return EMPTY_CART_MESSAGE.to_owned();
    }

    let phase = flow.phase_of(session);
    if let Some(contact) = parse_contact(command) {
        session.contact = contact;
    }

    let context = CheckoutContext::from_session(session);
    let event = if !context.missing_fields.is_empty() {
        CheckoutEvent::ContactIncomplete
    } else if is_affirmative(command) {
        CheckoutEvent::Affirmed
    } else {
        CheckoutEvent::ContactComplete
    };

    let outcome = match flow.apply(phase, event, &context) {
        Ok(outcome) => outcome,
        Err(error) => return rejected_transition(&error, session, correlation_id),
    };

    for action in outcome.actions {
        return match action {
            CheckoutAction::PromptForContact => {
                session.mode = ConversationMode::CheckoutPending;
                collecting_prompt(session, &context.missing_fields)
            }
            CheckoutAction::PresentSummary => {
                session.mode = ConversationMode::CheckoutPending;
                confirmation_summary(session)
            }
            CheckoutAction::SubmitOrder => {
                place_order(&flow, orders, checkout_source, session, &context, correlation_id)
                    .await
            }
            CheckoutAction::RememberOrder
            | CheckoutAction::ClearCart
            | CheckoutAction::ClearContact
            | CheckoutAction::ReportFailure => continue,
        };
    }
    CHECKOUT_FAILED_MESSAGE.to_owned()
}

fn rejected_transition(
    error: &FlowTransitionError,
    session: &Session,
    correlation_id: &str,
) -> String {
    warn!(
        event_name = "agent.checkout.transition_rejected",
        correlation_id,
        session_id = %session.id,
        error = %error,
        "checkout transition rejected"
    );
    match error {
        FlowTransitionError::EmptyCart => EMPTY_CART_MESSAGE.to_owned(),
        _ => CHECKOUT_FAILED_MESSAGE.to_owned(),
    }
}

fn field_icon(field: ContactField) -> &'static str {
    match field {
        ContactField::Name => "📝",
        ContactField::Email => "📧",
        ContactField::Phone => "📱",
    }
}

fn collecting_prompt(session: &Session, missing: &[ContactField]) -> String {
    let missing = missing
        .iter()
        .map(|field| format!("{} {}", field_icon(*field), field.label()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Great! Let's complete your order 🎉\n\n\
         **Your Cart:** {} item(s) - {}\n\n\
         To proceed, I need:\n\n{missing}\n\n\
         Provide like:\n\"John Doe, john@email.com, +1234567890\"",
        session.cart.len(),
        format_money(session.cart.total())
    )
}

fn confirmation_summary(session: &Session) -> String {
    let mut text = String::from("📋 **Order Confirmation**\n\n**Items:**\n");
    for line in session.cart.lines() {
        text.push_str(&format!(
            "• {} - {} × {}\n",
            line.name,
            format_money(line.unit_price),
            line.quantity
        ));
    }
    text.push_str(&format!(
        "\n💵 **Total: {}**\n\n**Delivery Details:**\n👤 Name: {}\n📧 Email: {}\n📱 Phone: {}\n\n\
         Say 'Yes' or 'Confirm' to complete your order ✅",
        format_money(session.cart.total()),
        session.contact.name,
        mask_email(&session.contact.email),
        mask_phone(&session.contact.phone)
    ));
    text
}

async fn place_order(
    flow: &CheckoutFlow,
    orders: &dyn OrderGateway,
    checkout_source: &str,
    session: &mut Session,
    context: &CheckoutContext,
    correlation_id: &str,
) -> String {
    let customer = CustomerIdentity {
        name: session.contact.name.trim().to_owned(),
        email: session.contact.email.trim().to_owned(),
        phone: session.contact.phone.trim().to_owned(),
    };
    let request = OrderRequest::from_cart(customer, &session.cart, checkout_source);
    let total = session.cart.total();

    info!(
        event_name = "agent.checkout.order_submitted",
        correlation_id,
        session_id = %session.id,
        lines = request.items.len(),
        total = %total,
        "submitting order"
    );

    let failure = match orders.create_order(&request).await {
        Ok(OrderPlacement::Placed(placed)) => {
            return complete_order(flow, session, context, placed, total, correlation_id);
        }
        Ok(OrderPlacement::Rejected { reason }) => {
            warn!(
                event_name = "agent.checkout.order_rejected",
                correlation_id,
                session_id = %session.id,
                reason = %reason,
                "order backend rejected the order; cart kept"
            );
            format!("❌ Order failed: {reason}\n\nPlease try again or contact support.")
        }
        Err(error) => {
            warn!(
                event_name = "agent.checkout.order_failed",
                correlation_id,
                session_id = %session.id,
                error = %error,
                "order backend unavailable; cart kept"
            );
            CHECKOUT_FAILED_MESSAGE.to_owned()
        }
    };

    let outcome = match flow.apply(CheckoutPhase::Placing, CheckoutEvent::OrderFailed, context) {
        Ok(outcome) => outcome,
        Err(error) => return rejected_transition(&error, session, correlation_id),
    };
    let mut reply = CHECKOUT_FAILED_MESSAGE.to_owned();
    for action in outcome.actions {
        match action {
            CheckoutAction::ReportFailure => reply = failure.clone(),
            CheckoutAction::PromptForContact
            | CheckoutAction::PresentSummary
            | CheckoutAction::SubmitOrder
            | CheckoutAction::RememberOrder
            | CheckoutAction::ClearCart
            | CheckoutAction::ClearContact => {}
        }
    }
    reply
}

fn complete_order(
    flow: &CheckoutFlow,
    session: &mut Session,
    context: &CheckoutContext,
    placed: PlacedOrder,
    total: Decimal,
    correlation_id: &str,
) -> String {
    let completion =
        match flow.apply(CheckoutPhase::Placing, CheckoutEvent::OrderPlaced, context) {
            Ok(completion) => completion,
            Err(error) => return rejected_transition(&error, session, correlation_id),
        };
    for action in completion.actions {
        match action {
            CheckoutAction::RememberOrder => {
                let email = session.contact.email.trim().to_owned();
                session.order_memory.remember(placed.order_number.clone(), email);
            }
            CheckoutAction::ClearCart => session.cart.clear(),
            CheckoutAction::ClearContact => session.contact.clear(),
            CheckoutAction::PromptForContact
            | CheckoutAction::PresentSummary
            | CheckoutAction::SubmitOrder
            | CheckoutAction::ReportFailure => {}
        }
    }
    session.mode = ConversationMode::Browsing;

    info!(
        event_name = "agent.checkout.order_placed",
        correlation_id,
        session_id = %session.id,
        order_number = %placed.order_number,
        order_id = %placed.order_id,
        "order placed"
    );

    format!(
        "🎉 **Order Confirmed!**\n\n\
         ✅ Order Number: #{}\n💵 Total: {}\n\n\
         Your order will arrive in 3-5 business days! 🚚\n\n\
         Thanks for shopping! 😊\n\n\
         💡 You can track your order anytime by saying \"track my order\" or \"order status\".",
        placed.order_number,
        format_money(total)
    )
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use cartline_core::catalog::demo_products;
    use cartline_core::domain::order::{
        OrderLookup, OrderPlacement, OrderQuery, OrderRequest,
    };
    use cartline_core::domain::session::{ContactDraft, ConversationMode, Session, SessionId};
    use cartline_core::orders::InMemoryOrderGateway;
    use cartline_core::ports::{OrderGateway, PortError};

    use super::{
        mask_email, mask_phone, parse_contact, run, CHECKOUT_FAILED_MESSAGE, EMPTY_CART_MESSAGE,
    };

    struct RejectingOrders;

    #[async_trait]
    impl OrderGateway for RejectingOrders {
        async fn create_order(&self, _: &OrderRequest) -> Result<OrderPlacement, PortError> {
            Ok(OrderPlacement::Rejected { reason: "Pricebook entry inactive".to_owned() })
        }

        async fn lookup_order(&self, _: &OrderQuery) -> Result<OrderLookup, PortError> {
            Ok(OrderLookup::NotFound)
        }
    }

    struct OfflineOrders;

    #[async_trait]
    impl OrderGateway for OfflineOrders {
        async fn create_order(&self, _: &OrderRequest) -> Result<OrderPlacement, PortError> {
            Err(PortError::Unavailable("crm down".to_owned()))
        }

        async fn lookup_order(&self, _: &OrderQuery) -> Result<OrderLookup, PortError> {
            Err(PortError::Unavailable("crm down".to_owned()))
        }
    }

    fn session_with_cart() -> Session {
        let mut session = Session::new(SessionId::from("session-checkout"));
        let products = demo_products();
        session.cart.add_product(&products[0]);
        session.cart.add_product(&products[0]);
        session
    }

    fn complete_contact() -> ContactDraft {
        ContactDraft {
            name: "John Doe".to_owned(),
            email: "john@x.com".to_owned(),
            phone: "555-1234".to_owned(),
        }
    }

    #[test]
    fn contact_triple_is_parsed_and_trimmed() {
        let parsed = parse_contact("'John Doe, \"john@x.com\" , 555-1234'").expect("triple");
        assert_eq!(parsed, complete_contact());

        assert_eq!(parse_contact("John Doe, 555-1234, more"), None);
        assert_eq!(parse_contact("john@x.com, 555-1234"), None);
    }

    #[test]
    fn masking_hides_most_of_email_and_phone() {
        assert_eq!(mask_email("john@x.com"), "jo***@x.com");
        assert_eq!(mask_email("not-an-email"), "not-an-email");
        assert_eq!(mask_phone("555-1234"), "***1234");
        assert_eq!(mask_phone("12"), "12");
    }

    #[tokio::test]
    async fn empty_cart_never_reaches_checkout() {
        let orders = InMemoryOrderGateway::default();
        for mode in [ConversationMode::Browsing, ConversationMode::CheckoutPending] {
            let mut session = Session::new(SessionId::from("session-empty"));
            session.mode = mode;
            session.contact = complete_contact();
            let before = session.clone();

            let text = run(&orders, "WhatsApp Bot", "yes", &mut session, "c-1").await;

            assert_eq!(text, EMPTY_CART_MESSAGE);
            assert_eq!(session, before);
        }
        assert_eq!(orders.order_count(), 0);
    }

    #[tokio::test]
    async fn missing_contact_prompts_for_fields() {
        let orders = InMemoryOrderGateway::default();
        let mut session = session_with_cart();

        let text = run(&orders, "WhatsApp Bot", "checkout", &mut session, "c-2").await;

        assert!(text.contains("**Your Cart:** 1 item(s) - $259.98"));
        assert!(text.contains("📝 Full Name\n📧 Email Address\n📱 Phone Number"));
        assert_eq!(session.mode, ConversationMode::CheckoutPending);
    }

    #[tokio::test]
    async fn complete_contact_without_affirmative_shows_masked_summary() {
        let orders = InMemoryOrderGateway::default();
        let mut session = session_with_cart();

        let text =
            run(&orders, "WhatsApp Bot", "John Doe, john@x.com, 555-1234", &mut session, "c-3")
                .await;

        assert!(text.starts_with("📋 **Order Confirmation**"));
        assert!(text.contains("📧 Email: jo***@x.com"));
        assert!(text.contains("📱 Phone: ***1234"));
        assert_eq!(session.contact, complete_contact());
        assert_eq!(orders.order_count(), 0);
    }

    #[tokio::test]
    async fn affirmative_places_order_and_resets_session() {
        let orders = InMemoryOrderGateway::default();
        let mut session = session_with_cart();
        session.contact = complete_contact();
        session.mode = ConversationMode::CheckoutPending;

        let text = run(&orders, "WhatsApp Bot", "yes", &mut session, "c-4").await;

        assert!(text.contains("✅ Order Number: #00000100"));
        assert!(text.contains("💵 Total: $259.98"));
        assert!(session.cart.is_empty());
        assert_eq!(session.contact, ContactDraft::default());
        assert_eq!(session.order_memory.last_order_number.as_deref(), Some("00000100"));
        assert_eq!(session.order_memory.last_order_email.as_deref(), Some("john@x.com"));
        assert_eq!(session.mode, ConversationMode::Browsing);
    }

    #[tokio::test]
    async fn rejected_order_keeps_cart_contact_and_mode() {
        let mut session = session_with_cart();
        session.contact = complete_contact();
        session.mode = ConversationMode::CheckoutPending;
        let before = session.clone();

        let text = run(&RejectingOrders, "WhatsApp Bot", "confirm", &mut session, "c-5").await;

        assert_eq!(
            text,
            "❌ Order failed: Pricebook entry inactive\n\nPlease try again or contact support."
        );
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn unreachable_backend_reports_failure_and_keeps_everything() {
        let mut session = session_with_cart();
        session.contact = complete_contact();
        session.mode = ConversationMode::CheckoutPending;
        let before = session.clone();

        let text = run(&OfflineOrders, "WhatsApp Bot", "yes", &mut session, "c-6").await;

        assert_eq!(text, CHECKOUT_FAILED_MESSAGE);
        assert_eq!(session, before);
        assert_eq!(session.order_memory.last_order_number, None);
    }
}
