use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "econbot")]
#[command(author, version, about = "Multi-tenant Telegram economy bot with a dashboard API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Serve the webhook and dashboard API
    Run {
        /// Port to listen on (overrides WEB_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Give a dashboard user the admin role
    GrantAdmin {
        /// Dashboard user id
        user_id: String,
    },

    /// Register the Telegram webhook of a bot at PUBLIC_URL
    SetWebhook {
        /// Bot id as stored in the database
        bot_id: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
