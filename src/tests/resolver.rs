use super::*;
use crate::metadata::types::SocialPlatform;
use crate::metadata::{ContentRecord, ContentType, Preview, Resolution};
use crate::scrape::transport::TransportEndpoint;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn article(url: &str) -> ContentRecord {
    ContentRecord::new(url, ContentType::Article)
}

fn all_transports() -> Vec<TransportEndpoint> {
    vec![
        TransportEndpoint::direct(),
        relay("relay1"),
        relay("relay2"),
        relay("relay3"),
    ]
}

#[tokio::test]
async fn test_first_successful_relay_wins() {
    let source = Arc::new(
        ScriptedSource::new()
            .on("direct", Script::Fail)
            .on("relay1", Script::Fail)
            .on("relay2", Script::Html(page(r#"<meta property="og:title" content="From relay 2">"#)))
            .on("relay3", Script::Html(page(r#"<meta property="og:title" content="From relay 3">"#))),
    );
    let resolver = scripted_resolver(source.clone(), preview_config(all_transports()));

    let resolution = resolver.resolve(&article("https://ex.com/post")).await;

    match resolution {
        Resolution::Page { preview, degraded } => {
            assert!(!degraded);
            assert_eq!(preview.title, "From relay 2");
        }
        other => panic!("unexpected resolution {other:?}"),
    }
    assert_eq!(source.names(), vec!["direct", "relay1", "relay2"]);
}

#[tokio::test]
async fn test_full_degradation() {
    let source = Arc::new(ScriptedSource::new());
    let resolver = scripted_resolver(source.clone(), preview_config(all_transports()));

    let resolution = resolver.resolve(&article("https://news.example/story")).await;

    assert_eq!(
        resolution,
        Resolution::Page {
            preview: Preview {
                title: "news.example".to_string(),
                description: Some("Visit news.example".to_string()),
                image_url: None,
                site_name: "news.example".to_string(),
                favicon_url: Some("https://www.google.com/s2/favicons?domain=news.example".to_string()),
                source_url: "https://news.example/story".to_string(),
            },
            degraded: true,
        }
    );
    assert_eq!(source.names().len(), 4);
}

#[tokio::test]
async fn test_video_short_circuits_fetching() {
    let source = Arc::new(ScriptedSource::new().on("direct", Script::Panic));
    let resolver = scripted_resolver(source.clone(), preview_config(all_transports()));

    let record = ContentRecord::new("https://youtu.be/dQw4w9WgXcQ", ContentType::Video);
    let resolution = resolver.resolve(&record).await;

    match resolution {
        Resolution::Video { video_id, embed_url, preview } => {
            assert_eq!(video_id, "dQw4w9WgXcQ");
            assert_eq!(embed_url, "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ");
            assert_eq!(
                preview.image_url.as_deref(),
                Some("https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg")
            );
            assert_eq!(preview.site_name, "youtu.be");
        }
        other => panic!("unexpected resolution {other:?}"),
    }
    assert!(source.names().is_empty());
}

#[tokio::test]
async fn test_video_without_id_is_scraped() {
    let source = Arc::new(
        ScriptedSource::new().on("direct", Script::Html(page("<title>Some clip</title>"))),
    );
    let resolver = scripted_resolver(source.clone(), preview_config(all_transports()));

    let record = ContentRecord::new("https://vimeo.com/76979871", ContentType::Video);
    let resolution = resolver.resolve(&record).await;

    assert_eq!(resolution.preview().title, "Some clip");
    assert_eq!(source.names(), vec!["direct"]);
}

#[tokio::test]
async fn test_social_is_never_scraped() {
    let source = Arc::new(ScriptedSource::new().on("direct", Script::Panic));
    let resolver = scripted_resolver(source.clone(), preview_config(all_transports()));

    let record = ContentRecord::new("https://twitter.com/rustlang/status/123456789", ContentType::Social)
        .with_title("Rust 2024 is out");
    let resolution = resolver.resolve(&record).await;

    match resolution {
        Resolution::Social { platform, post_id, preview } => {
            assert_eq!(platform, SocialPlatform::Twitter);
            assert_eq!(post_id.as_deref(), Some("123456789"));
            assert_eq!(preview.title, "Rust 2024 is out");
            assert_eq!(preview.site_name, "twitter.com");
            assert_eq!(preview.image_url, None);
        }
        other => panic!("unexpected resolution {other:?}"),
    }
    assert!(source.names().is_empty());
}

#[tokio::test]
async fn test_page_without_title_is_synthesized() {
    let source = Arc::new(ScriptedSource::new().on(
        "direct",
        Script::Html(page(r#"<meta property="og:image" content="/hero.png">"#)),
    ));
    let resolver = scripted_resolver(source, preview_config(all_transports()));

    let record = article("https://ex.com/untitled").with_title("My saved link");
    let resolution = resolver.resolve(&record).await;

    match resolution {
        Resolution::Page { preview, degraded } => {
            assert!(degraded);
            assert_eq!(preview.title, "My saved link");
            assert_eq!(preview.description.as_deref(), Some("Visit ex.com"));
            assert_eq!(preview.image_url, None);
        }
        other => panic!("unexpected resolution {other:?}"),
    }
}

#[tokio::test]
async fn test_extracted_page_is_normalized_and_completed() {
    let html = page(
        r#"<title>Post one</title>
        <meta name="description" content="About things">
        <meta property="og:image" content="/img/a.png">
        <link rel="icon" href="//cdn.ex.com/favicon.png">"#,
    );
    let source = Arc::new(ScriptedSource::new().on("direct", Script::Html(html)));
    let resolver = scripted_resolver(source, preview_config(all_transports()));

    let preview = resolver
        .resolve(&article("https://ex.com/posts/1"))
        .await
        .into_preview();

    assert_eq!(
        preview,
        Preview {
            title: "Post one".to_string(),
            description: Some("About things".to_string()),
            image_url: Some("https://ex.com/img/a.png".to_string()),
            site_name: "ex.com".to_string(),
            favicon_url: Some("https://cdn.ex.com/favicon.png".to_string()),
            source_url: "https://ex.com/posts/1".to_string(),
        }
    );
}

#[tokio::test]
async fn test_tracking_params_stripped_before_fetch() {
    let source = Arc::new(ScriptedSource::new());
    let resolver = scripted_resolver(source.clone(), preview_config(vec![TransportEndpoint::direct()]));

    let resolution = resolver
        .resolve(&article("https://EX.com/post/?utm_source=feed&id=7"))
        .await;

    assert_eq!(source.urls(), vec!["https://ex.com/post/?id=7"]);
    assert_eq!(resolution.preview().source_url, "https://EX.com/post/?utm_source=feed&id=7");
}

#[tokio::test]
async fn test_relative_image_on_trailing_slash_page() {
    let html = page(r#"<title>Blog</title><meta property="og:image" content="img/a.png">"#);
    let source = Arc::new(ScriptedSource::new().on("direct", Script::Html(html)));
    let resolver = scripted_resolver(source.clone(), preview_config(all_transports()));

    let preview = resolver
        .resolve(&article("https://ex.com/blog/"))
        .await
        .into_preview();

    assert_eq!(source.urls(), vec!["https://ex.com/blog/"]);
    assert_eq!(preview.image_url.as_deref(), Some("https://ex.com/blog/img/a.png"));
}

#[tokio::test]
async fn test_timeout_advances_to_next_transport() {
    let source = Arc::new(
        ScriptedSource::new()
            .on("direct", Script::Hang)
            .on("relay1", Script::Html(page("<title>Relayed</title>"))),
    );
    let resolver = scripted_resolver(source.clone(), preview_config(all_transports()));

    let started = Instant::now();
    let resolution = resolver.resolve(&article("https://slow.example/")).await;

    assert_eq!(resolution.preview().title, "Relayed");
    assert_eq!(source.names(), vec!["direct", "relay1"]);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_direct_retries_before_relays() {
    let source = Arc::new(
        ScriptedSource::new()
            .on("direct", Script::Fail)
            .on("relay1", Script::Html(page("<title>Relayed</title>"))),
    );
    let mut config = preview_config(all_transports());
    config.retries = 2;
    let resolver = scripted_resolver(source.clone(), config);

    resolver.resolve(&article("https://ex.com/")).await;

    assert_eq!(source.names(), vec!["direct", "direct", "direct", "relay1"]);
}

#[tokio::test]
async fn test_policy_blocks_private_hosts_without_fetching() {
    let source = Arc::new(ScriptedSource::new().on("direct", Script::Panic));
    let preview = preview_config(all_transports());
    let fetcher = Fetcher::new(source.clone(), &preview, &crate::config::ScrapeConfig::default());
    let resolver = Resolver::new(fetcher, FaviconService::default());

    let resolution = resolver.resolve(&article("http://127.0.0.1:9000/admin")).await;

    assert!(matches!(resolution, Resolution::Page { degraded: true, .. }));
    assert_eq!(resolution.preview().site_name, "127.0.0.1");
    assert!(source.names().is_empty());
}

#[tokio::test]
async fn test_totality() {
    let source = Arc::new(
        ScriptedSource::new()
            .on("direct", Script::Hang)
            .on("relay1", Script::Html("\u{0}\u{1}\u{2} binary junk".to_string()))
            .on("relay2", Script::Html("<html><head><title>   </title></head></html>".to_string())),
    );
    let resolver = scripted_resolver(source, preview_config(all_transports()));

    let urls = [
        "https://ex.com",
        "http://a.b.c.example/deep/path?q=1#frag",
        "https://xn--bcher-kva.example/",
        "http://93.184.216.34/",
        "https://[2606:4700:4700::1111]/",
        "https://ex.com:8443/with%20space",
    ];
    for url in urls {
        let preview = resolver.resolve(&article(url)).await.into_preview();
        assert!(!preview.title.is_empty(), "empty title for {url}");
        assert!(!preview.site_name.is_empty(), "empty site name for {url}");
        if let Some(favicon) = preview.favicon_url {
            assert!(favicon.starts_with("https://"), "relative favicon for {url}");
        }
    }
}

#[tokio::test]
async fn test_deterministic_output() {
    let html = page(
        r#"<meta property="og:title" content="Same">
        <meta property="og:site_name" content="Site">
        <meta property="og:image" content="a.png">"#,
    );
    let source = Arc::new(ScriptedSource::new().on("direct", Script::Html(html)));
    let resolver = scripted_resolver(source, preview_config(all_transports()));

    let record = article("https://ex.com/x/y");
    let first = serde_json::to_string(&resolver.resolve(&record).await).unwrap();
    let second = serde_json::to_string(&resolver.resolve(&record).await).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_concurrent_resolutions_are_independent() {
    let source = Arc::new(
        ScriptedSource::new().on("direct", Script::Html(page("<title>Shared page</title>"))),
    );
    let resolver = Arc::new(scripted_resolver(source.clone(), preview_config(all_transports())));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let resolver = resolver.clone();
        tasks.spawn(async move {
            let record = article(&format!("https://site{i}.example/"));
            resolver.resolve(&record).await.into_preview()
        });
    }

    let mut sites = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let preview = result.unwrap();
        assert_eq!(preview.title, "Shared page");
        sites.push(preview.site_name);
    }
    sites.sort();
    assert_eq!(sites.len(), 8);
    assert_eq!(sites[0], "site0.example");
    assert_eq!(source.names().len(), 8);
}
