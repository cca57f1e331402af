use cartline_core::domain::cart::Cart;
use cartline_core::domain::money::format_money;
use cartline_core::domain::session::{ConversationMode, Session};
use cartline_core::errors::DomainError;

pub const SEARCH_FIRST_MESSAGE: &str = "🛒 Please search for products first!";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartCommand {
    Add { position: Option<usize> },
    View,
    Remove { position: Option<usize> },
    Clear,
}

impl CartCommand {
    /// Keyword priority: add, view/show, remove/delete, clear/empty, else view.
    pub fn parse(command: &str) -> Self {
        let command = command.trim().to_lowercase();
        if command.contains("add") {
            Self::Add { position: first_number(&command) }
        } else if command.contains("view") || command.contains("show") {
            Self::View
        } else if command.contains("remove") || command.contains("delete") {
            Self::Remove { position: first_number(&command) }
        } else if command.contains("clear") || command.contains("empty") {
            Self::Clear
        } else {
            Self::View
        }
    }
}

fn first_number(text: &str) -> Option<usize> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..].chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

pub fn run(command: &str, session: &mut Session) -> String {
    session.mode = ConversationMode::Cart;

    match CartCommand::parse(command) {
        CartCommand::Add { position } => {
            if session.search_results().is_empty() {
                return SEARCH_FIRST_MESSAGE.to_owned();
            }
            let product = match session.search_result(position.unwrap_or(0)) {
                Ok(product) => product.clone(),
                Err(error) => return invalid_option(&error),
            };
            session.cart.add_product(&product);
            format!("✅ **Added {} to cart!**\n\n{}", product.name, render_cart(&session.cart))
        }
        CartCommand::View => render_cart(&session.cart),
        CartCommand::Remove { position } => {
            if session.cart.is_empty() {
                return render_cart(&session.cart);
            }
            let product_id = match session.cart.line_at(position.unwrap_or(0)) {
                Ok(line) => line.product_id.clone(),
                Err(error) => {
                    return format!("{}\n\n{}", invalid_item(&error), render_cart(&session.cart))
                }
            };
            match session.cart.remove(&product_id) {
                Some(line) => {
                    format!("🗑️ **Removed {} from cart.**\n\n{}", line.name, render_cart(&session.cart))
                }
                None => render_cart(&session.cart),
            }
        }
        CartCommand::Clear => {
            session.cart.clear();
            format!("🧹 **Cart cleared.**\n\n{}", render_cart(&session.cart))
        }
    }
}

fn invalid_option(error: &DomainError) -> String {
    match error {
        DomainError::InvalidPosition { available, .. } => {
            format!("❌ Invalid option. Please choose 1-{available}.")
        }
        other => format!("❌ {other}"),
    }
}

fn invalid_item(error: &DomainError) -> String {
    match error {
        DomainError::InvalidPosition { available, .. } => {
            format!("❌ Invalid item. Please choose 1-{available} from your cart.")
        }
        other => format!("❌ {other}"),
    }
}

/// Itemized cart with line subtotals and a freshly computed total.
pub fn render_cart(cart: &Cart) -> String {
    let mut text = String::from("🛒 **Your Cart:**\n\n");
    if cart.is_empty() {
        text.push_str("Your cart is empty!\n\nLet's find something great! 🛍️");
        return text;
    }

    for (index, line) in cart.lines().iter().enumerate() {
        text.push_str(&format!(
            "{}. **{}** - {} × {} = {}\n",
            index + 1,
            line.name,
            format_money(line.unit_price),
            line.quantity,
            format_money(line.subtotal())
        ));
    }
    let total = format_money(cart.total());
    text.push_str(&format!("\n💰 **Total: {total}**\n\nReady to checkout? 🎉"));
    text
}

#[cfg(test)]
mod tests {
    use cartline_core::catalog::demo_products;
    use cartline_core::domain::session::{ConversationMode, Session, SessionId};
    use rust_decimal::Decimal;

    use super::{render_cart, run, CartCommand, SEARCH_FIRST_MESSAGE};

    fn browsing_session() -> Session {
        let mut session = Session::new(SessionId::from("session-cart"));
        let watches: Vec<_> =
            demo_products().into_iter().filter(|p| p.family == "Watches").collect();
        session.replace_search_results(watches);
        session
    }

    #[test]
    fn parse_follows_keyword_priority() {
        assert_eq!(CartCommand::parse("add option 3"), CartCommand::Add { position: Some(3) });
        assert_eq!(CartCommand::parse("Add it"), CartCommand::Add { position: None });
        assert_eq!(CartCommand::parse("show my cart"), CartCommand::View);
        assert_eq!(CartCommand::parse("remove 12"), CartCommand::Remove { position: Some(12) });
        assert_eq!(CartCommand::parse("please empty it"), CartCommand::Clear);
        assert_eq!(CartCommand::parse("what's in there"), CartCommand::View);
        assert_eq!(CartCommand::parse("add and remove 2"), CartCommand::Add { position: Some(2) });
    }

    #[test]
    fn repeated_add_increments_single_line() {
        let mut session = browsing_session();

        let first = run("add option 1", &mut session);
        let second = run("add option 1", &mut session);

        assert!(first.starts_with("✅ **Added Classic Silver Watch to cart!**"));
        assert!(second.contains("× 2 = $259.98"));
        assert_eq!(session.cart.len(), 1);
        assert_eq!(session.cart.lines()[0].quantity, 2);
        assert_eq!(session.mode, ConversationMode::Cart);
    }

    #[test]
    fn add_without_results_or_out_of_range_is_rejected() {
        let mut empty = Session::new(SessionId::from("session-empty"));
        assert_eq!(run("add 1", &mut empty), SEARCH_FIRST_MESSAGE);

        let mut session = browsing_session();
        assert_eq!(run("add option 9", &mut session), "❌ Invalid option. Please choose 1-5.");
        assert_eq!(run("add that one", &mut session), "❌ Invalid option. Please choose 1-5.");
        assert!(session.cart.is_empty());
    }

    #[test]
    fn remove_uses_cart_position_then_product_identity() {
        let mut session = browsing_session();
        run("add 1", &mut session);
        run("add 2", &mut session);

        let text = run("remove 1", &mut session);

        assert!(text.starts_with("🗑️ **Removed Classic Silver Watch from cart.**"));
        assert_eq!(session.cart.len(), 1);
        assert_eq!(session.cart.lines()[0].name, "Silver Diver Watch");

        let invalid = run("remove 4", &mut session);
        assert!(invalid.starts_with("❌ Invalid item. Please choose 1-1 from your cart."));
        assert_eq!(session.cart.len(), 1);
    }

    #[test]
    fn total_is_recomputed_from_lines() {
        let mut session = browsing_session();
        run("add 1", &mut session);
        run("add 1", &mut session);
        run("add 4", &mut session);

        let expected: Decimal = session
            .cart
            .lines()
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum();
        assert_eq!(session.cart.total(), expected);
        assert!(render_cart(&session.cart).contains("💰 **Total: $508.98**"));
    }

    #[test]
    fn clear_empties_cart_and_renders_empty_message() {
        let mut session = browsing_session();
        run("add 2", &mut session);

        let text = run("clear cart", &mut session);

        assert!(session.cart.is_empty());
        assert!(text.ends_with("Your cart is empty!\n\nLet's find something great! 🛍️"));
    }
}
