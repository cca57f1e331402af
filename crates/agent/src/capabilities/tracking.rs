use cartline_core::domain::money::format_money;
use cartline_core::domain::order::{OrderLookup, OrderQuery, OrderStatusReport};
use cartline_core::domain::session::{ConversationMode, Session};
use cartline_core::ports::OrderGateway;
use tracing::{info, warn};

pub const IDENTIFIER_PROMPT: &str =
    "To track your order, provide:\n• Order number (e.g., #00000123)\n• OR your email";
pub const ORDER_NOT_FOUND_MESSAGE: &str = "❌ Order not found. Check the order number/email.";
pub const LOOKUP_FAILED_MESSAGE: &str = "❌ Couldn't retrieve order status.";

/// Email if the text has an `@`, else an order number after stripping `#`,
/// else the text itself when it is all digits.
pub fn extract_query(text: &str) -> Option<OrderQuery> {
    let trimmed = text.trim();
    if trimmed.contains('@') {
        return Some(OrderQuery::ByEmail(trimmed.to_owned()));
    }
    if trimmed.contains('#') {
        let number = trimmed.replace('#', "");
        let number = number.trim();
        return (!number.is_empty()).then(|| OrderQuery::ByNumber(number.to_owned()));
    }
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(OrderQuery::ByNumber(trimmed.to_owned()));
    }
    None
}

pub async fn run(
    orders: &dyn OrderGateway,
    text: &str,
    session: &mut Session,
    correlation_id: &str,
) -> String {
    let remembered = || {
        OrderQuery::from_parts(
            session.order_memory.last_order_number.clone(),
            session.order_memory.last_order_email.clone(),
        )
    };
    let Some(query) = extract_query(text).or_else(remembered) else {
        session.mode = ConversationMode::Tracking;
        return IDENTIFIER_PROMPT.to_owned();
    };

    match orders.lookup_order(&query).await {
        Ok(OrderLookup::Found(report)) => {
            session.mode = ConversationMode::Tracking;
            info!(
                event_name = "agent.tracking.order_found",
                correlation_id,
                session_id = %session.id,
                order_number = %report.order_number,
                status = %report.status,
                "order status retrieved"
            );
            render_status(&report)
        }
        Ok(OrderLookup::NotFound) => {
            session.mode = ConversationMode::Tracking;
            ORDER_NOT_FOUND_MESSAGE.to_owned()
        }
        Err(error) => {
            warn!(
                event_name = "agent.tracking.lookup_failed",
                correlation_id,
                session_id = %session.id,
                error = %error,
                "order lookup failed; session left unchanged"
            );
            LOOKUP_FAILED_MESSAGE.to_owned()
        }
    }
}

fn render_status(report: &OrderStatusReport) -> String {
    let mut text = format!(
        "📦 **Order Status**\n\n📄 Order: #{}\n📅 Date: {}\n✅ Status: **{}**\n\n**Items:**\n",
        report.order_number, report.order_date, report.status
    );
    for item in &report.items {
        text.push_str(&format!("• {} × {}\n", item.product_name, item.quantity));
    }
    text.push_str(&format!(
        "\n💵 Total: {}\nExpected delivery: 3-5 business days",
        format_money(report.total_amount)
    ));
    text
}
