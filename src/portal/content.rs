//! Text extraction from extranet pages.
//!
//! The extranet has no API: values are read off the rendered HTML by looking
//! for a label such as `Available:` and collecting the text that follows it.
//! The markup around those labels changes from time to time, so each lookup
//! walks the tree loosely and returns `None` instead of failing when a step
//! of the walk is missing.

use crate::models::UsageReport;
use crate::utils::join_trimmed;
use chrono::Utc;
use ego_tree::NodeRef;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, instrument};

/// Label preceding the remaining data on the Internet > Traffic page.
pub const AVAILABLE_LABEL: &str = "Available";
/// Label preceding the consumed data on the Internet > Traffic page.
pub const USED_LABEL: &str = "Used";

static SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span").expect("valid selector"));

/// A page retrieved from the extranet.
#[derive(Debug)]
pub struct Content {
    document: Html,
}

impl Content {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// Visible text of the page, one trimmed text node per line.
    pub fn text(&self) -> String {
        self.text_nodes()
            .map(|(_, text)| join_trimmed([text]))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// First visible text node containing `needle`.
    fn find_text(&self, needle: &str) -> Option<(NodeRef<'_, Node>, &str)> {
        self.text_nodes().find(|(_, text)| text.contains(needle))
    }

    /// Text nodes in document order, skipping scripts and styles.
    fn text_nodes(&self) -> impl Iterator<Item = (NodeRef<'_, Node>, &str)> {
        self.document.root_element().descendants().filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .parent()
                .and_then(ElementRef::wrap)
                .is_some_and(|parent| matches!(parent.value().name(), "script" | "style"));
            (!hidden).then_some((node, &**text))
        })
    }
}

/// The Internet > Traffic page.
#[derive(Debug)]
pub struct InternetTraffic {
    content: Content,
}

impl From<Content> for InternetTraffic {
    fn from(content: Content) -> Self {
        Self { content }
    }
}

impl InternetTraffic {
    /// The value written after `label:` on the page.
    ///
    /// On `<p>Available: <b>60.3</b> Gb</p>` the label `Available` gives
    /// `60.3 Gb`. The value is whatever follows the colon in the label's own
    /// text node plus the text of every following sibling of that node.
    ///
    /// # Arguments
    ///
    /// * `label` - Text written before the colon, matched literally
    ///
    /// # Returns
    ///
    /// The trimmed pieces joined with single spaces, or `None` if the label
    /// is not on the page or nothing follows it.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let page = InternetTraffic::from(Content::parse("<p>Available: <b>60.3</b> Gb</p>"));
    /// assert_eq!(page.string_after_colon("Available").as_deref(), Some("60.3 Gb"));
    /// ```
    pub fn string_after_colon(&self, label: &str) -> Option<String> {
        let (node, text) = self.content.find_text(label)?;

        let after_label = &text[text.find(label)? + label.len()..];
        let inline = after_label
            .split_once(':')
            .map_or("", |(_, rest)| rest)
            .to_string();

        let following = node.next_siblings().map(node_text);
        let value = join_trimmed(std::iter::once(inline).chain(following));
        (!value.is_empty()).then_some(value)
    }

    /// Remaining data for the current billing period, e.g. `60.3 Gb`.
    ///
    /// The `Available:` label disappears once less than about 15 Gb remain.
    /// The remaining amount is then only shown in a `<span>` inside the
    /// `<div>` that follows the block holding the `Used:` label.
    #[instrument(level = "debug", skip_all)]
    pub fn available(&self) -> Option<String> {
        if let Some(available) = self.string_after_colon(AVAILABLE_LABEL) {
            return Some(available);
        }
        debug!("'{AVAILABLE_LABEL}' label missing; falling back to the block after '{USED_LABEL}'");
        self.available_after_used_block()
    }

    /// Data consumed in the current billing period.
    pub fn used(&self) -> Option<String> {
        self.string_after_colon(USED_LABEL)
    }

    pub fn report(&self) -> UsageReport {
        UsageReport {
            available: self.available(),
            used: self.used(),
            retrieved_at: Utc::now(),
        }
    }

    fn available_after_used_block(&self) -> Option<String> {
        let (used, _) = self.content.find_text(USED_LABEL)?;
        let block = used.parent()?.parent()?;
        let next_div = block
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|sibling| sibling.value().name() == "div")?;
        let span = next_div.select(&SPAN).next()?;

        let value = join_trimmed(span.text());
        (!value.is_empty()).then_some(value)
    }
}

fn node_text(node: NodeRef<'_, Node>) -> String {
    match node.value() {
        Node::Text(text) => String::from(&**text),
        Node::Element(_) => ElementRef::wrap(node)
            .map(|element| join_trimmed(element.text()))
            .unwrap_or_default(),
        _ => String::new(),
    }
}
