use crate::metadata::normalize::hostname;
use crate::metadata::types::{ContentRecord, PartialPreview, Preview};

pub const DEFAULT_FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons?domain={host}";
const HOST_PLACEHOLDER: &str = "{host}";

/// Third-party favicon lookup, e.g. `https://www.google.com/s2/favicons?domain={host}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaviconService {
    template: String,
}

impl Default for FaviconService {
    fn default() -> Self {
        Self::new(DEFAULT_FAVICON_SERVICE)
    }
}

impl FaviconService {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn is_valid_template(template: &str) -> bool {
        template.contains(HOST_PLACEHOLDER) && url::Url::parse(template).is_ok()
    }

    pub fn url_for(&self, host: &str) -> String {
        self.template.replace(HOST_PLACEHOLDER, host)
    }
}

/// What stands in for the host when the record URL has none.
struct Origin {
    label: String,
    host: Option<String>,
}

fn origin(url: &str) -> Origin {
    match hostname(url) {
        Some(host) => Origin {
            label: host.clone(),
            host: Some(host),
        },
        None => {
            let trimmed = url.trim();
            Origin {
                label: if trimmed.is_empty() { "link".to_string() } else { trimmed.to_string() },
                host: None,
            }
        }
    }
}

/// Minimal card built from the record alone. Never fails.
pub fn synthesize(record: &ContentRecord, favicons: &FaviconService) -> Preview {
    let origin = origin(&record.url);

    Preview {
        title: record
            .title()
            .map(str::to_owned)
            .unwrap_or_else(|| origin.label.clone()),
        description: Some(format!("Visit {}", origin.label)),
        image_url: None,
        site_name: origin.label,
        favicon_url: origin.host.as_deref().map(|h| favicons.url_for(h)),
        source_url: record.url.clone(),
    }
}

/// Turn a successful extraction into a full card, filling the site name and
/// favicon from the host when the page did not declare them.
///
/// The caller guarantees `partial` has a title.
pub fn complete(record: &ContentRecord, partial: PartialPreview, favicons: &FaviconService) -> Preview {
    let origin = origin(&record.url);

    Preview {
        title: partial.title.unwrap_or_else(|| origin.label.clone()),
        description: partial.description,
        image_url: partial.image_url,
        favicon_url: partial
            .favicon_url
            .or_else(|| origin.host.as_deref().map(|h| favicons.url_for(h))),
        site_name: partial.site_name.unwrap_or(origin.label),
        source_url: record.url.clone(),
    }
}
