use clap::{Parser, Subcommand};

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    name = "minipass",
    version,
    about = "Minipass admin client toolkit",
    long_about = "Client-side toolkit for the Minipass admin dashboard.\n\
                  \n\
                  Subscribes to the server's live notification stream with automatic\n\
                  reconnection, manages web-push subscriptions, and drives the offline\n\
                  asset cache (pre-caching, policy-based fetching, cache clearing)."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the Minipass server
    #[arg(
        short,
        long,
        global = true,
        default_value = "http://localhost:5000",
        help = "Base URL of the Minipass server"
    )]
    pub server: String,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable detailed debug logging")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen to the live notification stream
    Listen {
        /// Maximum notifications displayed at once
        #[arg(
            long,
            default_value = "5",
            help = "Maximum notifications kept on screen; the oldest is evicted beyond this"
        )]
        max_visible: usize,

        /// Auto-dismiss delay in seconds
        #[arg(
            long,
            default_value = "10",
            help = "Seconds before a notification dismisses itself"
        )]
        dismiss_after: u64,

        /// Reconnect attempts before giving up
        #[arg(
            long,
            default_value = "5",
            help = "Reconnect attempts before the stream is abandoned"
        )]
        max_reconnects: u32,
    },

    /// Manage web-push subscriptions
    Push {
        #[command(subcommand)]
        command: PushCommands,
    },

    /// Drive the offline asset cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum PushCommands {
    /// Fetch and print the server's VAPID public key
    VapidKey,

    /// Register a push subscription with the server
    Subscribe {
        /// Push service endpoint URL
        #[arg(long, help = "Push service endpoint URL")]
        endpoint: String,

        /// Client public key (base64url)
        #[arg(long, help = "Client ECDH public key, base64url-encoded")]
        p256dh: String,

        /// Client auth secret (base64url)
        #[arg(long, help = "Client auth secret, base64url-encoded")]
        auth: String,
    },

    /// Remove a push subscription from the server
    Unsubscribe {
        /// Push service endpoint URL to remove
        #[arg(long, help = "Push service endpoint URL to remove")]
        endpoint: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Pre-cache the static asset manifest
    Warm,

    /// Warm the cache, then fetch URLs through the caching policies
    Serve {
        /// URLs to fetch
        #[arg(required = true, help = "URLs to fetch through the cache")]
        urls: Vec<String>,
    },

    /// Delete every cache partition
    Clear,
}
