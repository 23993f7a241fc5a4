use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Declared kind of a stored link, as the vault records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Article,
    Video,
    Social,
    Other,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown content type `{0}`")]
pub struct UnknownContentType(pub String);

impl FromStr for ContentType {
    type Err = UnknownContentType;

    /// Accepts the current names plus the names older vault entries were saved with.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "article" => Ok(ContentType::Article),
            "video" | "youtube" => Ok(ContentType::Video),
            "social" | "twitter" | "reddit" => Ok(ContentType::Social),
            "other" | "link" => Ok(ContentType::Other),
            _ => Err(UnknownContentType(s.to_string())),
        }
    }
}

/// Bookmark entry handed over by the persistence layer. Never written back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub url: String,
    #[serde(default)]
    pub declared_type: ContentType,
    #[serde(default)]
    pub declared_title: Option<String>,
}

impl ContentRecord {
    pub fn new(url: impl Into<String>, declared_type: ContentType) -> Self {
        Self {
            url: url.into(),
            declared_type,
            declared_title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.declared_title = Some(title.into());
        self
    }

    /// Declared title, if it has any visible characters.
    pub fn title(&self) -> Option<&str> {
        self.declared_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Display-ready card for a link.
///
/// `title` and `site_name` are never empty; `image_url` and `favicon_url`
/// are absolute when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub site_name: String,
    pub favicon_url: Option<String>,
    pub source_url: String,
}

/// What the extractor managed to find on a page. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialPreview {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub site_name: Option<String>,
    pub favicon_url: Option<String>,
}

impl PartialPreview {
    pub fn has_title(&self) -> bool {
        self.title.is_some()
    }

    /// Describe which fields are present (for logging)
    pub fn describe_fields(&self) -> String {
        let mut fields = Vec::new();
        if self.title.is_some() { fields.push("title"); }
        if self.description.is_some() { fields.push("description"); }
        if self.image_url.is_some() { fields.push("image_url"); }
        if self.site_name.is_some() { fields.push("site_name"); }
        if self.favicon_url.is_some() { fields.push("favicon_url"); }
        fields.join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Twitter,
    Reddit,
    Instagram,
    TikTok,
    Facebook,
    Threads,
    LinkedIn,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specialized {
    Video {
        id: String,
    },
    Social {
        platform: SocialPlatform,
        post_id: Option<String>,
    },
}

/// Classifier decision for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Specialized(Specialized),
    Generic,
}

/// Outcome of resolving one record. Every variant carries a renderable card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resolution {
    #[serde(rename_all = "camelCase")]
    Video {
        video_id: String,
        embed_url: String,
        preview: Preview,
    },
    #[serde(rename_all = "camelCase")]
    Social {
        platform: SocialPlatform,
        post_id: Option<String>,
        preview: Preview,
    },
    Page {
        preview: Preview,
        /// The card was synthesized because fetching or extraction failed.
        degraded: bool,
    },
}

impl Resolution {
    pub fn preview(&self) -> &Preview {
        match self {
            Resolution::Video { preview, .. }
            | Resolution::Social { preview, .. }
            | Resolution::Page { preview, .. } => preview,
        }
    }

    pub fn into_preview(self) -> Preview {
        match self {
            Resolution::Video { preview, .. }
            | Resolution::Social { preview, .. }
            | Resolution::Page { preview, .. } => preview,
        }
    }
}
