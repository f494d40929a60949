//! Website signal extraction.
//!
//! Pulls the title, visible text, and short lists of product and career
//! mentions (picked out by class/href hints) from a parsed homepage, and
//! assembles them into [`WebsiteData`].

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

use duediligence_shared::text::{collapse_whitespace, dedup_capped, truncate_chars};
use duediligence_shared::{DueDiligenceError, Result, WebsiteData};

use crate::fetch::FetchedPage;

/// Maximum number of product mentions kept.
pub const MAX_PRODUCTS: usize = 5;

/// Maximum number of career mentions kept.
pub const MAX_CAREERS: usize = 3;

/// Elements whose text never renders.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector"));

static PRODUCT_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[class*="product"], [href*="product"], [class*="service"]"#)
        .expect("product selector")
});

static CAREER_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[href*="career"], [href*="job"], [class*="career"]"#)
        .expect("career selector")
});

/// Build [`WebsiteData`] from an already parsed page.
pub fn analyze_website(page: &FetchedPage, content_char_limit: usize) -> WebsiteData {
    WebsiteData {
        title: page.title.clone(),
        content: truncate_chars(&page.text, content_char_limit).to_string(),
        products: page.products.clone(),
        careers: page.careers.clone(),
    }
}

/// Up to [`MAX_PRODUCTS`] distinct product and service mentions.
pub fn product_mentions(doc: &Html) -> Vec<String> {
    dedup_capped(element_texts(doc, &PRODUCT_SEL), MAX_PRODUCTS)
}

/// Up to [`MAX_CAREERS`] distinct career and job mentions.
pub fn career_mentions(doc: &Html) -> Vec<String> {
    dedup_capped(element_texts(doc, &CAREER_SEL), MAX_CAREERS)
}

/// Text of the `<title>` element, if present and non-empty.
pub fn page_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SEL)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|title| !title.is_empty())
}

/// All rendered text in document order, whitespace-collapsed.
pub fn visible_text(doc: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in doc.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(el) => HIDDEN_TAGS.contains(&el.name()),
            _ => false,
        });
        if !hidden {
            parts.push(text);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

/// Texts of all elements matching a caller-supplied CSS selector, in document order.
///
/// Unlike the built-in product/career extraction, nothing is deduplicated or
/// capped.
pub fn select_texts(html: &str, selector: &str) -> Result<Vec<String>> {
    let sel = Selector::parse(selector)
        .map_err(|e| DueDiligenceError::parse(format!("invalid selector '{selector}': {e}")))?;
    let doc = Html::parse_document(html);
    Ok(doc.select(&sel).map(|el| element_text(&el)).collect())
}

/// Non-empty, whitespace-collapsed texts of matching elements.
fn element_texts(doc: &Html, selector: &Selector) -> Vec<String> {
    doc.select(selector)
        .map(|el| element_text(&el))
        .filter(|text| !text.is_empty())
        .collect()
}

fn element_text(el: &ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}
