//! CSS selectors for the tender detail page.
//!
//! The portal is a Tailwind/HeroUI app, so the only hooks are utility class
//! names. Every field gets a primary selector matching the current markup
//! and a looser fallback that survives class churn.

use scraper::Selector;
use std::sync::LazyLock;

/// Announcement dialog opened by the reveal control. Also waited on after the click.
pub const DETAIL_DIALOG: &str = "div.flex.flex-1.flex-col.gap-3";

/// Primary selector with an optional fallback tried when it matches nothing.
pub struct SelectorPair {
    pub primary: Selector,
    pub fallback: Option<Selector>,
}

impl SelectorPair {
    fn new(primary: &str, fallback: Option<&str>) -> Self {
        Self {
            primary: Selector::parse(primary)
                .expect("BUG: hardcoded primary selector is statically valid"),
            fallback: fallback.map(|s| {
                Selector::parse(s).expect("BUG: hardcoded fallback selector is statically valid")
            }),
        }
    }
}

pub static TITLE: LazyLock<SelectorPair> =
    LazyLock::new(|| SelectorPair::new("h1.text-2xl.font-bold", Some("h1")));

pub static FIELD_CONTAINER: LazyLock<SelectorPair> = LazyLock::new(|| {
    SelectorPair::new("div.p-4.rounded-lg.bg-default-100", Some("main"))
});

pub static FIELD_ROW: LazyLock<SelectorPair> = LazyLock::new(|| {
    SelectorPair::new("div.grid.grid-cols-1.items-center", Some("div.grid"))
});

pub static FIELD_LABEL: LazyLock<SelectorPair> =
    LazyLock::new(|| SelectorPair::new("div.text-default-500", Some("div.font-light")));

pub static FIELD_VALUE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.text-sm")
        .expect("BUG: hardcoded selector 'div.text-sm' is statically valid")
});

pub static INNER_DIV: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div").expect("BUG: hardcoded selector 'div' is statically valid")
});

pub static DIALOG: LazyLock<SelectorPair> =
    LazyLock::new(|| SelectorPair::new(DETAIL_DIALOG, Some("[role=dialog]")));

pub static LIST_ITEM: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("ol li, ul li")
        .expect("BUG: hardcoded selector 'ol li, ul li' is statically valid")
});

pub static DOCUMENT_LINK: LazyLock<SelectorPair> = LazyLock::new(|| {
    SelectorPair::new("div.w-full.px-0 a.rounded-lg.border[href]", Some("a[download][href]"))
});
