//! WhatsApp transport: inbound webhook payloads, outbound delivery with
//! truncation and bounded retry, and the Twilio REST sender.

pub mod inbound;
pub mod outbound;
pub mod twilio;

pub use inbound::{InboundError, InboundMessage, WebhookForm, EMPTY_TWIML};
pub use outbound::{
    truncate_message, DeliveryError, DeliveryPolicy, DeliveryReport, Deliverer, MessageSender,
    TransportError, CONTINUATION_NOTICE, FALLBACK_MESSAGE, TURN_FAILURE_MESSAGE,
};
pub use twilio::TwilioSender;
