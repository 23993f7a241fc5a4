use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod errors;
mod metadata;
mod scrape;
#[cfg(test)]
mod tests;
mod web;

use config::Config;
use metadata::{ContentRecord, ContentType, Resolver, Route, Specialized};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_type(content_type: &str) -> anyhow::Result<ContentType> {
    Ok(content_type.parse::<ContentType>()?)
}

fn describe_route(route: &Route) -> serde_json::Value {
    match route {
        Route::Specialized(Specialized::Video { id }) => {
            serde_json::json!({ "route": "video", "id": id })
        }
        Route::Specialized(Specialized::Social { platform, post_id }) => {
            serde_json::json!({ "route": "social", "platform": platform, "id": post_id })
        }
        Route::Generic => serde_json::json!({ "route": "generic" }),
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Daemon { listen } => {
            let mut config = Config::load()?;
            if let Some(listen) = listen {
                config.listen = listen;
            }
            web::start_daemon(config)
        }

        cli::Command::Preview {
            url,
            content_type,
            title,
            full,
        } => {
            let config = Config::load()?;
            let mut record = ContentRecord::new(url, parse_type(&content_type)?);
            if let Some(title) = title {
                record = record.with_title(title);
            }

            let resolver = Resolver::from_config(&config)?;
            let resolution = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to build runtime")?
                .block_on(resolver.resolve(&record));

            let output = if full {
                serde_json::to_string_pretty(&resolution)?
            } else {
                serde_json::to_string_pretty(&web::PreviewResponse::from(resolution.into_preview()))?
            };
            println!("{output}");
            Ok(())
        }

        cli::Command::Classify { url, content_type } => {
            let record = ContentRecord::new(url, parse_type(&content_type)?);
            let route = metadata::classify::classify(&record);
            println!("{}", serde_json::to_string_pretty(&describe_route(&route))?);
            Ok(())
        }
    }
}
