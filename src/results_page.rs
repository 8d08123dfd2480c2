//! Reads search results out of the rendered registry page.
//!
//! Markup: every result is a `.res-row` holding a `.res-caption` (entity
//! name) and a `.res-text` (free-form description). The pager is a list of
//! links carrying a `data-page` attribute.

use scraper::{ElementRef, Html, Selector};

use crate::records::RawResultBlock;

pub const ROW_SELECTOR: &str = ".res-row";
pub const CAPTION_SELECTOR: &str = ".res-caption";
pub const TEXT_SELECTOR: &str = ".res-text";
pub const PAGER_SELECTOR: &str = "[data-page]";

pub fn parse_blocks(html: &str) -> Vec<RawResultBlock> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse(ROW_SELECTOR).expect("row selector is valid");
    let caption_selector = Selector::parse(CAPTION_SELECTOR).expect("caption selector is valid");
    let text_selector = Selector::parse(TEXT_SELECTOR).expect("text selector is valid");

    document
        .select(&row_selector)
        .filter_map(|row| {
            let body = row.select(&text_selector).next().map(collapsed_text)?;
            let caption = row.select(&caption_selector).next().map(collapsed_text).unwrap_or_default();
            Some(RawResultBlock::new(caption, body))
        })
        .collect()
}

/// Highest `data-page` in the pager, `None` without a pager.
pub fn parse_total_pages(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(PAGER_SELECTOR).expect("pager selector is valid");
    document
        .select(&selector)
        .filter_map(|link| link.value().attr("data-page"))
        .filter_map(|page| page.trim().parse::<u32>().ok())
        .max()
}

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
