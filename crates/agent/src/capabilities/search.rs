use std::collections::BTreeSet;

use cartline_core::domain::money::format_money;
use cartline_core::domain::product::{CatalogFilters, Product};
use cartline_core::domain::session::{ConversationMode, Session};
use cartline_core::ports::CatalogSearch;
use tracing::{info, warn};

use crate::llm::LlmClient;

pub const NOT_FOUND_MESSAGE: &str = "Hmm, I couldn't find that. Try being more specific! 🔍";
pub const SEARCH_FAILED_MESSAGE: &str = "Sorry, search error. Please try again! 😊";

/// Products rendered in a listing; the session window still keeps five.
pub const LISTING_SIZE: usize = 3;
const DESCRIPTION_WORDS: usize = 10;
const SUMMARY_COLORS: usize = 4;

const FILLER_PHRASES: &[&str] = &["show all", "show me", "i want", "just"];
const COLOR_VOCABULARY: &[&str] = &[
    "silver", "black", "brown", "white", "blue", "red", "gold", "navy", "tan", "green", "grey",
    "gray",
];
const PRICE_CUES: &[&str] = &["under", "below", "cheap", "expensive", "price"];
const GENERIC_KEYWORDS: &[(&str, &str)] = &[
    ("watch", "Watches"),
    ("watches", "Watches"),
    ("belt", "Accessories"),
    ("belts", "Accessories"),
    ("wallet", "Accessories"),
    ("wallets", "Accessories"),
    ("shoe", "Footwear"),
    ("shoes", "Footwear"),
    ("footwear", "Footwear"),
    ("footwears", "Footwear"),
];

/// How a free-text query is turned into a catalog call and in-process filters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPlan {
    pub cleaned: String,
    pub base_term: String,
    pub target_family: Option<&'static str>,
    pub color: Option<&'static str>,
    pub generic: bool,
    pub specific: bool,
}

impl SearchPlan {
    pub fn parse(query: &str) -> Self {
        let mut cleaned = query.trim().to_lowercase();
        for filler in FILLER_PHRASES {
            cleaned = cleaned.replace(filler, "");
        }
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        let words: Vec<&str> = cleaned.split_whitespace().collect();

        let color = COLOR_VOCABULARY.iter().copied().find(|color| cleaned.contains(color));
        let has_price_cue = PRICE_CUES.iter().any(|cue| cleaned.contains(cue));
        let specific = color.is_some() || has_price_cue || words.len() > 2;

        let target_family = GENERIC_KEYWORDS
            .iter()
            .find(|(keyword, _)| *keyword == cleaned)
            .map(|(_, family)| *family);

        let base_term = if cleaned.contains("watch") {
            "watch".to_owned()
        } else if cleaned.contains("shoe") || cleaned.contains("footwear") {
            "shoe".to_owned()
        } else if cleaned.contains("belt") {
            "belt".to_owned()
        } else if cleaned.contains("wallet") {
            "wallet".to_owned()
        } else if let Some(first) = words.first() {
            first.trim_end_matches('s').to_owned()
        } else {
            query.trim().to_lowercase()
        };

        Self {
            generic: target_family.is_some(),
            cleaned,
            base_term,
            target_family,
            color,
            specific,
        }
    }

    pub fn wants_color_summary(&self) -> bool {
        self.generic && !self.specific
    }

    /// Family filter first, then color, never narrowing a non-empty set to nothing by color.
    pub fn narrow(&self, mut products: Vec<Product>) -> Vec<Product> {
        if let Some(family) = self.target_family {
            products.retain(|product| product.family.eq_ignore_ascii_case(family));
        }
        if let Some(color) = self.color {
            let colored: Vec<Product> = products
                .iter()
                .filter(|product| product.color.to_lowercase().contains(color))
                .cloned()
                .collect();
            if !colored.is_empty() {
                products = colored;
            }
        }
        products
    }
}

pub async fn run(
    catalog: &dyn CatalogSearch,
    listing_writer: Option<&dyn LlmClient>,
    query: &str,
    session: &mut Session,
    correlation_id: &str,
) -> String {
    let plan = SearchPlan::parse(query);

    let found = match catalog.search(&plan.base_term, &CatalogFilters::default()).await {
        Ok(found) => found,
        Err(error) => {
            warn!(
                event_name = "agent.search.catalog_failed",
                correlation_id,
                session_id = %session.id,
                term = %plan.base_term,
                error = %error,
                "catalog search failed; session left unchanged"
            );
            return SEARCH_FAILED_MESSAGE.to_owned();
        }
    };

    session.mode = ConversationMode::Browsing;
    let products = plan.narrow(found);
    info!(
        event_name = "agent.search.completed",
        correlation_id,
        session_id = %session.id,
        term = %plan.base_term,
        color = plan.color.unwrap_or("none"),
        results = products.len(),
        "catalog search completed"
    );

    if products.is_empty() {
        session.clear_search_results();
        return NOT_FOUND_MESSAGE.to_owned();
    }

    if plan.wants_color_summary() {
        if let Some(summary) = color_summary(&products) {
            session.replace_search_results(products);
            return summary;
        }
    }

    session.replace_search_results(products);
    let shown = &session.search_results()[..session.search_results().len().min(LISTING_SIZE)];

    match listing_writer {
        Some(llm) => match write_listing(llm, shown).await {
            Some(listing) => listing,
            None => {
                warn!(
                    event_name = "agent.search.listing_fallback",
                    correlation_id,
                    session_id = %session.id,
                    "listing writer unavailable; using plain listing"
                );
                plain_listing(shown)
            }
        },
        None => plain_listing(shown),
    }
}

fn category_label(products: &[Product]) -> String {
    products
        .first()
        .map(|product| product.family.to_lowercase())
        .filter(|family| !family.is_empty())
        .unwrap_or_else(|| "products".to_owned())
}

/// `None` when the results carry no colors at all.
pub fn color_summary(products: &[Product]) -> Option<String> {
    let colors: BTreeSet<&str> = products
        .iter()
        .map(|product| product.color.trim())
        .filter(|color| !color.is_empty())
        .collect();
    let colors: Vec<&str> = colors.into_iter().take(SUMMARY_COLORS).collect();
    let first = colors.first()?;
    let category = category_label(products);

    let mut text = format!("Great! I found several types of {category}:\n\n**Popular Colors:**\n");
    for color in &colors {
        text.push_str(&format!("• {color} {category}\n"));
    }
    text.push_str(&format!("\n💡 Say **\"{first} {category}\"** to see options!"));
    Some(text)
}

pub fn plain_listing(products: &[Product]) -> String {
    let category = category_label(products);
    let mut text = format!("Here are {} great {category} for you:\n\n", products.len());
    for (index, product) in products.iter().enumerate() {
        text.push_str(&format!(
            "{}. **{}** - {}\n",
            index + 1,
            product.name,
            format_money(product.price)
        ));
        let description = product.short_description(DESCRIPTION_WORDS);
        if !description.is_empty() {
            text.push_str(&format!("   {description}\n"));
        }
        if !product.image_url.is_empty() {
            text.push_str(&format!("   ![Product]({})\n", product.image_url));
        }
        text.push('\n');
    }
    text.push_str("💡 Like one? Say \"add option X\" to add to cart!");
    text
}

async fn write_listing(llm: &dyn LlmClient, products: &[Product]) -> Option<String> {
    let payload = serde_json::to_string_pretty(products).ok()?;
    let prompt = format!(
        "Format these products conversationally.\n\n**PRODUCTS:**\n{payload}\n\n**FORMAT:**\n\
         Here are {count} great [category] for you:\n\n\
         1️⃣ **[Name]** - $[price]\n   [Very short description - max 10 words]\n   ![Product]([image_url])\n\n\
         💡 Like one? Say \"add option X\" to add to cart!\n\n\
         RULES: Keep the numbering and order of the products. Max 10 words per description.",
        count = products.len()
    );
    let listing = llm.complete(&prompt).await.ok()?;
    let listing = listing.trim();
    (!listing.is_empty()).then(|| listing.to_owned())
}
