//! Deterministic fast path evaluated before the planner. Rules run in a fixed
//! order and the first match wins.

use cartline_core::domain::session::{ConversationMode, Session};

use crate::capabilities::CapabilityKind;

pub const AFFIRMATIVE_TOKENS: &[&str] = &["yes", "confirm", "proceed", "ok", "place order"];
const CHECKOUT_WORDS: &[&str] = &["checkout", "buy", "order", "purchase"];
const TRACKING_PHRASES: &[&str] =
    &["track my order", "order status", "where is my order", "check my order", "my order"];
const GREETING_PREFIXES: &[&str] = &["hi", "hello", "hey"];
const THANKS_PHRASES: &[&str] = &["thanks", "thank you"];
const HELP_WORDS: &[&str] = &["help", "options"];

pub const GREETING_REPLY: &str = "Hey! 👋 I'm your shopping assistant!\n\n\
I can help you:\n🔍 Find products\n🛒 Manage cart\n✅ Checkout\n📦 Track orders\n\n\
What interests you?";
pub const THANKS_REPLY: &str = "You're welcome! Need anything else? 😊";
pub const HELP_REPLY: &str = "I can help you with:\n\n\
🔍 Search: \"Show me watches\"\n🛒 Cart: \"Add option 2\"\n💳 Checkout: \"Checkout\"\n📦 Track: \"Track my order\"\n\n\
What would you like?";

/// Case-insensitive substring match against the affirmative vocabulary.
pub fn is_affirmative(text: &str) -> bool {
    let text = text.to_lowercase();
    AFFIRMATIVE_TOKENS.iter().any(|token| text.contains(token))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CannedReply {
    Greeting,
    Thanks,
    Help,
}

impl CannedReply {
    pub fn text(self) -> &'static str {
        match self {
            Self::Greeting => GREETING_REPLY,
            Self::Thanks => THANKS_REPLY,
            Self::Help => HELP_REPLY,
        }
    }

    /// A greeting starts the conversation over in browsing mode.
    pub fn resets_mode(self) -> bool {
        matches!(self, Self::Greeting)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shortcut {
    Invoke(CapabilityKind),
    Reply(CannedReply),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ShortcutResolver;

impl ShortcutResolver {
    pub fn resolve(&self, utterance: &str, session: &Session) -> Option<Shortcut> {
        let text = utterance.trim().to_lowercase();
        let contains_any = |words: &[&str]| words.iter().any(|word| text.contains(word));

        if session.mode == ConversationMode::CheckoutPending && is_affirmative(&text) {
            return Some(Shortcut::Invoke(CapabilityKind::Checkout));
        }
        if !session.cart.is_empty() && contains_any(CHECKOUT_WORDS) {
            return Some(Shortcut::Invoke(CapabilityKind::Checkout));
        }
        if contains_any(TRACKING_PHRASES) && session.order_memory.has_any() {
            return Some(Shortcut::Invoke(CapabilityKind::Tracking));
        }
        if GREETING_PREFIXES.iter().any(|prefix| text.starts_with(prefix)) {
            return Some(Shortcut::Reply(CannedReply::Greeting));
        }
        if contains_any(THANKS_PHRASES) {
            return Some(Shortcut::Reply(CannedReply::Thanks));
        }
        if HELP_WORDS.contains(&text.as_str()) {
            return Some(Shortcut::Reply(CannedReply::Help));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use cartline_core::catalog::demo_products;
    use cartline_core::domain::session::{ConversationMode, Session, SessionId};

    use super::{is_affirmative, CannedReply, Shortcut, ShortcutResolver};
    use crate::capabilities::CapabilityKind;

    fn session() -> Session {
        Session::new(SessionId::from("session-shortcuts"))
    }

    #[test]
    fn affirmative_matching_is_substring_and_case_insensitive() {
        assert!(is_affirmative("YES please"));
        assert!(is_affirmative("go ahead and place order"));
        assert!(is_affirmative("okay"));
        assert!(!is_affirmative("not now"));
    }

    #[test]
    fn pending_checkout_affirmative_goes_to_checkout() {
        let mut session = session();
        session.mode = ConversationMode::CheckoutPending;

        assert_eq!(
            ShortcutResolver.resolve("Confirm", &session),
            Some(Shortcut::Invoke(CapabilityKind::Checkout))
        );
    }

    #[test]
    fn checkout_words_need_a_non_empty_cart() {
        let mut session = session();
        assert_eq!(ShortcutResolver.resolve("I want to buy", &session), None);

        session.cart.add_product(&demo_products()[0]);
        assert_eq!(
            ShortcutResolver.resolve("checkout", &session),
            Some(Shortcut::Invoke(CapabilityKind::Checkout))
        );
    }

    #[test]
    fn tracking_phrases_need_order_memory() {
        let mut session = session();
        assert_eq!(ShortcutResolver.resolve("where is my order", &session), None);

        session.order_memory.remember("00000100", "john@x.com");
        assert_eq!(
            ShortcutResolver.resolve("Where is my order?", &session),
            Some(Shortcut::Invoke(CapabilityKind::Tracking))
        );
    }

    #[test]
    fn canned_replies_cover_greeting_thanks_and_help() {
        let session = session();
        assert_eq!(
            ShortcutResolver.resolve("Hello there", &session),
            Some(Shortcut::Reply(CannedReply::Greeting))
        );
        assert_eq!(
            ShortcutResolver.resolve("thank you!", &session),
            Some(Shortcut::Reply(CannedReply::Thanks))
        );
        assert_eq!(
            ShortcutResolver.resolve(" HELP ", &session),
            Some(Shortcut::Reply(CannedReply::Help))
        );
        assert_eq!(ShortcutResolver.resolve("help me find a belt", &session), None);
        assert_eq!(ShortcutResolver.resolve("show me watches", &session), None);
    }

    #[test]
    fn cart_checkout_rule_wins_over_greeting() {
        let mut session = session();
        session.cart.add_product(&demo_products()[0]);

        assert_eq!(
            ShortcutResolver.resolve("hey, let me order now", &session),
            Some(Shortcut::Invoke(CapabilityKind::Checkout))
        );
    }
}
