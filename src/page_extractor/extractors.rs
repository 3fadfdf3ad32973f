//! Rendered markup to [`ExtractedRecord`].

use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use super::record::ExtractedRecord;
use super::selectors::{
    DIALOG, DOCUMENT_LINK, FIELD_CONTAINER, FIELD_LABEL, FIELD_ROW, FIELD_VALUE, INNER_DIV,
    LIST_ITEM, SelectorPair, TITLE,
};
use crate::utils::{normalize_text, resolve_link};

/// Pure, synchronous extraction of a tender detail page.
///
/// Missing elements never fail extraction: the field is left empty and
/// the caller decides whether the record is usable.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    origin: String,
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new(crate::utils::DEFAULT_SITE_ORIGIN)
    }
}

impl PageExtractor {
    /// `origin` is used to resolve relative document links.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn extract(&self, markup: &str) -> ExtractedRecord {
        let document = Html::parse_document(markup);
        let root = document.root_element();

        let name = first_match(root, &TITLE)
            .map(|h1| element_text(h1, ""))
            .unwrap_or_default();
        let fields = extract_fields(root);
        let details = extract_details(root);
        let document_links = links_in(root, &self.origin);

        debug!(
            name = %name,
            fields = fields.len(),
            details = details.len(),
            documents = document_links.len(),
            "Extracted detail page"
        );

        ExtractedRecord {
            name,
            fields,
            details,
            document_links,
            ..ExtractedRecord::default()
        }
    }
}

/// Absolute URLs of every document link on the page, duplicates removed.
#[must_use]
pub fn extract_document_links(markup: &str, origin: &str) -> Vec<String> {
    let document = Html::parse_document(markup);
    links_in(document.root_element(), origin)
}

fn links_in(root: ElementRef<'_>, origin: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for anchor in select_all(root, &DOCUMENT_LINK) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        match resolve_link(origin, href) {
            Some(link) if !links.contains(&link) => links.push(link),
            Some(_) => {}
            None => trace!("Skipping unusable document href {href:?}"),
        }
    }
    links
}

fn extract_fields(root: ElementRef<'_>) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let Some(container) = first_match(root, &FIELD_CONTAINER) else {
        return fields;
    };

    for row in select_all(container, &FIELD_ROW) {
        let Some(label_el) = first_match(row, &FIELD_LABEL) else {
            continue;
        };
        let label = element_text(label_el, "");
        if label.is_empty() {
            continue;
        }

        // The label cell carries `text-sm` too; the value is the other one.
        let value = row
            .select(&FIELD_VALUE)
            .find(|el| el.id() != label_el.id())
            .map(|value_el| match value_el.select(&INNER_DIV).next() {
                Some(inner) => element_text(inner, ""),
                None => element_text(value_el, ""),
            })
            .unwrap_or_default();

        fields.insert(label, value);
    }
    fields
}

fn extract_details(root: ElementRef<'_>) -> Vec<String> {
    let Some(dialog) = first_match(root, &DIALOG) else {
        return Vec::new();
    };
    dialog
        .select(&LIST_ITEM)
        .map(|li| element_text(li, " "))
        .filter(|text| !text.is_empty())
        .collect()
}

fn first_match<'a>(scope: ElementRef<'a>, pair: &SelectorPair) -> Option<ElementRef<'a>> {
    scope.select(&pair.primary).next().or_else(|| {
        pair.fallback
            .as_ref()
            .and_then(|fallback| scope.select(fallback).next())
    })
}

fn select_all<'a>(scope: ElementRef<'a>, pair: &SelectorPair) -> Vec<ElementRef<'a>> {
    let primary: Vec<_> = scope.select(&pair.primary).collect();
    if !primary.is_empty() {
        return primary;
    }
    match &pair.fallback {
        Some(fallback) => scope.select(fallback).collect(),
        None => primary,
    }
}

fn element_text(element: ElementRef<'_>, separator: &str) -> String {
    normalize_text(&element.text().collect::<Vec<_>>().join(separator))
}
