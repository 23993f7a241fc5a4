pub mod classify;
pub mod extract;
pub mod normalize;
pub mod synthesize;
pub mod types;

pub use types::{ContentRecord, ContentType, Preview, Resolution, Route, Specialized};

use crate::config::Config;
use crate::scrape::{Fetcher, HtmlResult};
use anyhow::Context;
use synthesize::FaviconService;

/// Turns content records into preview cards.
///
/// Holds only read-only state, so one instance serves any number of
/// concurrent resolutions.
pub struct Resolver {
    fetcher: Fetcher,
    favicons: FaviconService,
}

impl Resolver {
    pub fn new(fetcher: Fetcher, favicons: FaviconService) -> Self {
        Self { fetcher, favicons }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher = Fetcher::from_config(&config.preview, &config.scrape)
            .context("failed to build http client")?;
        Ok(Self::new(fetcher, config.preview.favicons()))
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Always produces a card; failures along the way only degrade it.
    pub async fn resolve(&self, record: &ContentRecord) -> Resolution {
        match classify::classify(record) {
            Route::Specialized(Specialized::Video { id }) => {
                log::debug!("{}: video {id}, skipping scrape", record.url);
                let mut preview = synthesize::synthesize(record, &self.favicons);
                preview.image_url = Some(classify::video_thumbnail_url(&id));
                Resolution::Video {
                    embed_url: classify::video_embed_url(&id),
                    video_id: id,
                    preview,
                }
            }
            Route::Specialized(Specialized::Social { platform, post_id }) => {
                log::debug!("{}: social link ({platform:?}), skipping scrape", record.url);
                Resolution::Social {
                    platform,
                    post_id,
                    preview: synthesize::synthesize(record, &self.favicons),
                }
            }
            Route::Generic => {
                let (preview, degraded) = self.resolve_page(record).await;
                Resolution::Page { preview, degraded }
            }
        }
    }

    /// Fetching -> Extracting -> Normalizing, with synthesis as the exit on
    /// any failure. Returns whether the card is synthesized.
    async fn resolve_page(&self, record: &ContentRecord) -> (Preview, bool) {
        let target = normalize::clean_url(&record.url);

        log::debug!("{target}: fetching");
        let (html, transport, page_url) = match self.fetcher.fetch(&target).await {
            HtmlResult::Fetched { html, transport, url } => (html, transport, url),
            HtmlResult::Failed => {
                log::debug!("{target}: fetch failed, synthesizing");
                return (synthesize::synthesize(record, &self.favicons), true);
            }
        };

        log::debug!("{page_url}: extracting ({} bytes via {transport})", html.len());
        let partial = extract::extract(&html, &page_url);
        if !partial.has_title() {
            log::debug!("{target}: no title found, synthesizing");
            return (synthesize::synthesize(record, &self.favicons), true);
        }

        log::debug!("{target}: extracted fields=[{}]", partial.describe_fields());
        (synthesize::complete(record, partial, &self.favicons), false)
    }
}
