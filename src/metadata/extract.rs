use crate::metadata::normalize::normalize;
use crate::metadata::types::PartialPreview;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    Image,
    SiteName,
    Favicon,
}

/// One place a field value can come from: a selector and the attribute to
/// read (`None` reads the element text).
struct Candidate {
    selector: &'static str,
    attr: Option<&'static str>,
}

const fn meta(selector: &'static str) -> Candidate {
    Candidate { selector, attr: Some("content") }
}

const fn link(selector: &'static str) -> Candidate {
    Candidate { selector, attr: Some("href") }
}

const fn text(selector: &'static str) -> Candidate {
    Candidate { selector, attr: None }
}

/// Ordered candidates per field; the first usable value wins. For images and
/// favicons usable means it resolves to an absolute URL.
const RULES: &[(Field, &[Candidate])] = &[
    (
        Field::Title,
        &[
            meta(r#"meta[property="og:title"], meta[name="og:title"]"#),
            meta(r#"meta[name="twitter:title"], meta[property="twitter:title"]"#),
            text("head > title"),
            text("title"),
        ],
    ),
    (
        Field::Description,
        &[
            meta(r#"meta[property="og:description"], meta[name="og:description"]"#),
            meta(r#"meta[name="description"], meta[name="Description"]"#),
            meta(r#"meta[name="twitter:description"], meta[property="twitter:description"]"#),
        ],
    ),
    (
        Field::Image,
        &[
            meta(r#"meta[property="og:image"], meta[name="og:image"]"#),
            meta(r#"meta[name="twitter:image"], meta[property="twitter:image"]"#),
            meta(r#"meta[name="twitter:image:src"], meta[property="twitter:image:src"]"#),
        ],
    ),
    (
        Field::SiteName,
        &[meta(r#"meta[property="og:site_name"], meta[name="og:site_name"]"#)],
    ),
    (
        Field::Favicon,
        &[
            link(r#"link[rel="icon"]"#),
            link(r#"link[rel="shortcut icon"]"#),
            link(r#"link[rel="apple-touch-icon"]"#),
        ],
    ),
];

struct CompiledCandidate {
    selector: Selector,
    attr: Option<&'static str>,
}

static COMPILED_RULES: Lazy<Vec<(Field, Vec<CompiledCandidate>)>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|(field, candidates)| {
            let compiled = candidates
                .iter()
                .map(|c| CompiledCandidate {
                    selector: Selector::parse(c.selector).expect("Failed to compile selector"),
                    attr: c.attr,
                })
                .collect();
            (*field, compiled)
        })
        .collect()
});

static JSON_LD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("Failed to compile selector")
});

/// Pull preview fields out of a page. Malformed markup just yields fewer fields.
///
/// Image and favicon references are resolved against `base_url`; ones that
/// cannot be made absolute are skipped in favor of the next candidate.
pub fn extract(html: &str, base_url: &str) -> PartialPreview {
    let document = Html::parse_document(html);
    let mut partial = PartialPreview::default();

    for (field, candidates) in COMPILED_RULES.iter() {
        let base = matches!(field, Field::Image | Field::Favicon).then_some(base_url);
        let value = candidates.iter().find_map(|c| first_value(&document, c, base));
        match field {
            Field::Title => partial.title = value,
            Field::Description => partial.description = value,
            Field::Image => partial.image_url = value,
            Field::SiteName => partial.site_name = value,
            Field::Favicon => partial.favicon_url = value,
        }
    }

    if partial.title.is_none() || partial.description.is_none() || partial.image_url.is_none() {
        for element in document.select(&JSON_LD_SELECTOR) {
            let json_text = element.text().collect::<String>();
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&json_text) {
                extract_from_json_ld(&json, base_url, &mut partial);
            }
        }
    }

    partial
}

/// First value for `candidate`, resolved against `base_url` when given.
fn first_value(document: &Html, candidate: &CompiledCandidate, base_url: Option<&str>) -> Option<String> {
    document
        .select(&candidate.selector)
        .filter(|element| !inside_svg(*element))
        .filter_map(|element| read_value(element, candidate.attr))
        .find_map(|value| match base_url {
            Some(base) => resolve_resource(&value, base),
            None => Some(value),
        })
}

/// Inline `<svg>` carries its own `<title>`, which names the icon, not the page.
fn inside_svg(element: ElementRef) -> bool {
    element
        .ancestors()
        .any(|node| node.value().as_element().is_some_and(|el| el.name() == "svg"))
}

fn read_value(element: ElementRef, attr: Option<&str>) -> Option<String> {
    let raw = match attr {
        Some(attr) => element.value().attr(attr)?.to_string(),
        None => element.text().collect::<String>(),
    };
    clean_text(&raw)
}

/// Trim and collapse whitespace runs; empty means absent.
fn clean_text(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn resolve_resource(candidate: &str, base_url: &str) -> Option<String> {
    let lowered = candidate.trim_start().to_ascii_lowercase();
    if lowered.starts_with("data:") || lowered.starts_with("javascript:") {
        log::debug!("inline resource references are not supported");
        return None;
    }
    normalize(candidate, base_url)
}

fn extract_from_json_ld(json: &serde_json::Value, base_url: &str, partial: &mut PartialPreview) {
    if let Some(graph) = json.get("@graph").and_then(|g| g.as_array()) {
        for item in graph {
            extract_from_json_ld(item, base_url, partial);
        }
        return;
    }
    if let Some(arr) = json.as_array() {
        for item in arr {
            extract_from_json_ld(item, base_url, partial);
        }
        return;
    }

    if partial.title.is_none() {
        partial.title = json
            .get("name")
            .or_else(|| json.get("headline"))
            .and_then(|v| v.as_str())
            .and_then(clean_text);
    }
    if partial.description.is_none() {
        partial.description = json
            .get("description")
            .and_then(|v| v.as_str())
            .and_then(clean_text);
    }
    if partial.image_url.is_none() {
        if let Some(img) = json.get("image").or_else(|| json.get("thumbnailUrl")) {
            let first = img.as_array().and_then(|arr| arr.first()).unwrap_or(img);
            partial.image_url = first
                .as_str()
                .or_else(|| first.get("url").and_then(|v| v.as_str()))
                .and_then(|candidate| resolve_resource(candidate, base_url));
        }
    }
}
