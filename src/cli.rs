use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve previews over http
    Daemon {
        /// Address to listen on (overrides config)
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Resolve a single link and print its card
    Preview {
        url: String,

        /// Declared content type (article, video, social, other)
        #[clap(short = 't', long = "type", default_value = "article")]
        content_type: String,

        /// Title saved with the bookmark
        #[clap(long)]
        title: Option<String>,

        /// Print the whole resolution (route and card) instead of the card
        #[clap(long, default_value = "false")]
        full: bool,
    },

    /// Show how a link would be routed, without fetching anything
    Classify {
        url: String,

        #[clap(short = 't', long = "type", default_value = "article")]
        content_type: String,
    },
}
