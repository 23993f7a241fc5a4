use crate::metadata::types::{ContentRecord, ContentType, Route, SocialPlatform, Specialized};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Compile video id regex once
static VIDEO_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:youtu\.be/|/embed/|/shorts/|/live/|/v/|[?&]v=)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
    )
    .expect("Failed to compile video id regex")
});

static TWEET_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/status(?:es)?/(\d+)").expect("Failed to compile tweet regex"));

static REDDIT_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/comments/([A-Za-z0-9]+)").expect("Failed to compile reddit regex")
});

/// Decide how a record is rendered.
///
/// Social links are never scraped: those platforms block non-interactive
/// fetches or need scripts, the card links out instead.
pub fn classify(record: &ContentRecord) -> Route {
    match record.declared_type {
        ContentType::Video => match video_id(&record.url) {
            Some(id) => Route::Specialized(Specialized::Video { id }),
            None => {
                log::debug!("{}: no video id, using generic pipeline", record.url);
                Route::Generic
            }
        },
        ContentType::Social => {
            let platform = social_platform(&record.url);
            Route::Specialized(Specialized::Social {
                platform,
                post_id: social_post_id(platform, &record.url),
            })
        }
        ContentType::Article | ContentType::Other => Route::Generic,
    }
}

fn is_youtube_host(url: &str) -> bool {
    let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
        Some(h) => h,
        None => return false,
    };
    ["youtube.com", "youtu.be", "youtube-nocookie.com"]
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

/// Video id of a YouTube link. Other hosts never yield an id.
pub fn video_id(url: &str) -> Option<String> {
    if !is_youtube_host(url) {
        return None;
    }
    VIDEO_ID_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
}

pub fn video_thumbnail_url(id: &str) -> String {
    format!("https://img.youtube.com/vi/{id}/maxresdefault.jpg")
}

pub fn video_embed_url(id: &str) -> String {
    format!("https://www.youtube-nocookie.com/embed/{id}")
}

fn social_platform(url: &str) -> SocialPlatform {
    let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
        Some(h) => h,
        None => return SocialPlatform::Other,
    };
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let is = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

    if is("twitter.com") || is("x.com") {
        SocialPlatform::Twitter
    } else if is("reddit.com") || is("redd.it") {
        SocialPlatform::Reddit
    } else if is("instagram.com") {
        SocialPlatform::Instagram
    } else if is("tiktok.com") {
        SocialPlatform::TikTok
    } else if is("facebook.com") || is("fb.com") {
        SocialPlatform::Facebook
    } else if is("threads.net") {
        SocialPlatform::Threads
    } else if is("linkedin.com") {
        SocialPlatform::LinkedIn
    } else {
        SocialPlatform::Other
    }
}

fn social_post_id(platform: SocialPlatform, url: &str) -> Option<String> {
    let regex = match platform {
        SocialPlatform::Twitter => &TWEET_ID_REGEX,
        SocialPlatform::Reddit => &REDDIT_ID_REGEX,
        _ => return None,
    };
    regex
        .captures(url)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
}
