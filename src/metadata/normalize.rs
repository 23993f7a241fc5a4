use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// `scheme:` prefix per RFC 3986.
static SCHEME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("Failed to compile scheme regex")
});

const TRACKING_PARAMS: [&str; 10] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "mc_cid",
    "mc_eid",
];

/// Resolve a resource reference found on a page against the page URL.
///
/// Rules, in order:
/// - a candidate that already carries a scheme is returned as is
/// - protocol-relative (`//host/...`) takes the base scheme
/// - root-relative (`/path`) takes the base scheme, host and port
/// - anything else resolves against the base path
///
/// Returns `None` when the base or the candidate cannot be parsed.
pub fn normalize(candidate: &str, base_url: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    let base = Url::parse(base_url).ok()?;

    if SCHEME_REGEX.is_match(candidate) {
        return Url::parse(candidate).ok().map(|_| candidate.to_string());
    }

    if candidate.starts_with("//") {
        let absolute = format!("{}:{candidate}", base.scheme());
        return Url::parse(&absolute).ok().map(|u| u.to_string());
    }

    // root-relative and path-relative both go through the standard join
    base.join(candidate).ok().map(|u| u.to_string())
}

/// Host part of a URL, if it parses and has one.
pub fn hostname(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .filter(|h| !h.is_empty())
}

/// Clean a submitted URL before fetching it.
///
/// Applies the following transformations:
/// - Strips known tracking query parameters (utm_*, fbclid, gclid, ref, mc_*)
/// - Lowercases the hostname
/// - Converts protocol-relative URLs to https
///
/// The path is kept as is: `/blog` and `/blog/` resolve relative references
/// differently. Returns the original string if the URL cannot be parsed.
pub fn clean_url(url: &str) -> String {
    let url_to_parse = if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    };

    let mut parsed = match Url::parse(&url_to_parse) {
        Ok(u) => u,
        Err(_) => return url.to_string(),
    };

    if let Some(host) = parsed.host_str() {
        let lowercased = host.to_lowercase();
        if parsed.set_host(Some(&lowercased)).is_err() {
            return url.to_string();
        }
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    parsed.set_query(None);
    if !kept.is_empty() {
        parsed.query_pairs_mut().extend_pairs(kept);
    }

    parsed.to_string()
}
