//! HTML extraction for traineeship index and detail pages.
//!
//! Every field is looked up through an ordered list of CSS selectors. The first
//! selector that matches anything wins; when none match, the field falls back to
//! [`NOT_SPECIFIED`]. Only the title is mandatory: a fragment without one is
//! dropped.

use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::listing::{Details, Listing, NOT_SPECIFIED};

/// Selector candidates for one field, tried in order.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub selectors: &'static [&'static str],
    /// Leading label stripped from the matched text, e.g. `"Duration:"`.
    pub label: Option<&'static str>,
}

/// Repeated listing container, primary then fallback.
pub const CONTAINER_SELECTORS: &[&str] = &[".media-list-items", ".view-content > div"];

pub const TITLE: FieldRule = FieldRule {
    name: "title",
    selectors: &[".field-name-title a, h3.dot-title a", "h3.title a, .media-body a"],
    label: None,
};

pub const COMPANY: FieldRule = FieldRule {
    name: "company",
    selectors: &[".field-name-recruiter-name .field-item a"],
    label: None,
};

pub const COUNTRY: FieldRule = FieldRule {
    name: "country",
    selectors: &[".field-name-field-traineeship-location-count .field-item"],
    label: None,
};

pub const CITY: FieldRule = FieldRule {
    name: "city",
    selectors: &[".field-name-field-traineeship-location-city .field-item"],
    label: None,
};

pub const DURATION: FieldRule = FieldRule {
    name: "duration",
    selectors: &[
        ".ds-top-footer .field-name-field-traineeship-duration .field-items .field-item",
        ".ds-top-footer .field-name-field-traineeship-duration",
        ".field-name-field-traineeship-duration .field-item",
        ".field-type-taxonomy-term-reference.field-name-field-traineeship-duration .field-items .field-item",
    ],
    label: Some("Duration:"),
};

pub const POST_DATE: FieldRule = FieldRule {
    name: "post_date",
    selectors: &[
        ".ds-top-footer .field-name-post-date .field-items .field-item",
        ".ds-top-footer .field-name-post-date",
        ".field-name-post-date .field-item",
        ".field-type-ds.field-name-post-date .field-items .field-item",
    ],
    label: Some("Post date:"),
};

pub const DEADLINE: FieldRule = FieldRule {
    name: "deadline",
    selectors: &[
        ".ds-top-footer .field-name-field-traineeship-apply-deadline .field-items .field-item .date-display-single",
        ".ds-top-footer .field-name-field-traineeship-apply-deadline .field-items .field-item",
    ],
    label: None,
};

pub const FIELD: FieldRule = FieldRule {
    name: "field",
    selectors: &[".ds-top-content h5"],
    label: None,
};

// Detail page table. Any "Label:" prefix is dropped from these.
pub const DETAIL_POST_DATE: &[&str] = &[".field-name-field-date-posted .field-item, .date-posted"];
pub const DETAIL_DURATION: &[&str] = &[".field-name-field-duration .field-item, .duration"];
pub const DETAIL_DESCRIPTION: &[&str] = &[".field-name-body .field-item, .description"];

const PAGER_LAST: &str = ".pager-last a";
const PAGER_ITEMS: &str = ".pager-item a, .pager-current";

/// Compiles a selector literal, logging instead of panicking on bad CSS.
fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("Invalid selector {:?}: {:?}", css, e);
            None
        }
    }
}

/// Whitespace-normalised text of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Removes a leading label, then surrounding whitespace.
pub fn strip_label(text: &str, label: &str) -> String {
    let text = text.trim();
    text.strip_prefix(label).unwrap_or(text).trim().to_string()
}

/// First element matched by the first selector that matches anything.
pub fn select_first<'a>(
    scope: ElementRef<'a>,
    selectors: &[&str],
) -> Option<(ElementRef<'a>, usize)> {
    selectors.iter().enumerate().find_map(|(i, css)| {
        let sel = selector(css)?;
        let found = scope.select(&sel).next();
        found.map(|el| (el, i))
    })
}

/// Text for `rule` inside `fragment`, or `None` when nothing matched.
pub fn find_field(fragment: ElementRef<'_>, rule: &FieldRule) -> Option<String> {
    let (element, idx) = select_first(fragment, rule.selectors)?;
    let raw = element_text(element);
    let text = match rule.label {
        Some(label) => strip_label(&raw, label),
        None => raw.trim().to_string(),
    };
    debug!("{} = {:?} via selector #{}", rule.name, text, idx + 1);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Like [`find_field`] but degrades to the placeholder.
pub fn extract_field(fragment: ElementRef<'_>, rule: &FieldRule) -> String {
    find_field(fragment, rule).unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

/// "City, Country", just the country, or the placeholder.
fn extract_location(fragment: ElementRef<'_>) -> String {
    match (find_field(fragment, &CITY), find_field(fragment, &COUNTRY)) {
        (Some(city), Some(country)) => format!("{}, {}", city, country),
        (_, Some(country)) => country,
        _ => NOT_SPECIFIED.to_string(),
    }
}

/// Resolves `href` against the site so stored URLs are always absolute.
pub fn absolute_url(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match base.join(href) {
        Ok(u) => u.to_string(),
        Err(_) => format!("{}{}", base.origin().ascii_serialization(), href),
    }
}

/// Builds one listing from a fragment. Returns `None` if no title is found.
pub fn extract_listing(fragment: ElementRef<'_>, page_number: u32, base: &Url) -> Option<Listing> {
    let (title_el, _) = select_first(fragment, TITLE.selectors)?;
    let title = element_text(title_el);
    if title.is_empty() {
        return None;
    }
    let href = title_el.value().attr("href").unwrap_or("");
    let url = absolute_url(base, href);
    debug!("Found link: {}", url);

    let mut listing = Listing::new(title, url, page_number);
    listing.company = extract_field(fragment, &COMPANY);
    listing.location = extract_location(fragment);
    listing.duration = extract_field(fragment, &DURATION);
    listing.post_date = extract_field(fragment, &POST_DATE);
    listing.deadline = extract_field(fragment, &DEADLINE);
    listing.field = extract_field(fragment, &FIELD);
    Some(listing)
}

/// All listings on one index page, tagged with `page_number`.
pub fn parse_listing_page(html: &str, page_number: u32, base: &Url) -> Vec<Listing> {
    let document = Html::parse_document(html);

    let mut fragments = Vec::new();
    for (i, css) in CONTAINER_SELECTORS.iter().enumerate() {
        if let Some(sel) = selector(css) {
            fragments = document.select(&sel).collect();
        }
        if !fragments.is_empty() {
            break;
        }
        if i + 1 < CONTAINER_SELECTORS.len() {
            debug!("No containers for {:?}, trying fallback", css);
        }
    }
    debug!("Found {} listing containers on page {}", fragments.len(), page_number);

    let mut listings = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        match extract_listing(fragment, page_number, base) {
            Some(listing) => listings.push(listing),
            None => debug!("Skipping item without a title"),
        }
    }
    listings
}

/// Supplementary fields from a detail page.
pub fn parse_details(html: &str) -> Details {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let lookup = |selectors: &[&str]| -> Option<String> {
        let (el, _) = select_first(root, selectors)?;
        let text = element_text(el);
        let text = match text.split_once(':') {
            Some((_, rest)) => rest.trim().to_string(),
            None => text,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    };

    Details {
        post_date: lookup(DETAIL_POST_DATE),
        duration: lookup(DETAIL_DURATION),
        description: lookup(DETAIL_DESCRIPTION),
    }
}

static PAGE_PARAM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[?&]page=(\d+)").ok());

/// Zero-based `page=` value of a pager link.
fn page_param(href: &str) -> Option<usize> {
    let re = PAGE_PARAM.as_ref()?;
    re.captures(href)?.get(1)?.as_str().parse().ok()
}

/// Page count for a zero-based `page=` value. `None` when it does not fit.
fn pages_through(zero_based: usize) -> Option<usize> {
    zero_based.checked_add(1)
}

/// Total number of index pages according to the pager. Defaults to 1.
pub fn parse_total_pages(html: &str) -> usize {
    let document = Html::parse_document(html);

    if let Some(sel) = selector(PAGER_LAST) {
        let last = document
            .select(&sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(page_param)
            .and_then(pages_through);
        if let Some(total) = last {
            return total;
        }
    }

    let Some(sel) = selector(PAGER_ITEMS) else {
        return 1;
    };
    let highest = document
        .select(&sel)
        .filter_map(|item| match item.value().attr("href") {
            Some(href) => page_param(href).and_then(pages_through),
            None => element_text(item).parse::<usize>().ok(),
        })
        .max();
    highest.unwrap_or(1)
}
