use std::net::SocketAddr;

/// Tweet feed HTTP service
#[derive(Debug, Clone, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Settings {
    /// Address the HTTP server listens on
    #[clap(long, env = "FEED_BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    #[clap(flatten)]
    pub scylla: ScyllaSettings,

    /// Number of HTTP worker threads (defaults to the number of CPUs)
    #[clap(long, env = "FEED_WORKERS")]
    pub workers: Option<usize>,

    /// Keep everything in memory instead of connecting to ScyllaDB
    #[clap(long, env = "FEED_IN_MEMORY")]
    pub in_memory: bool,

    /// Log level used when RUST_LOG is not set
    #[clap(long, env = "FEED_LOG_LEVEL", default_value = "info", value_parser = parse_level)]
    pub log_level: log::LevelFilter,
}

impl Settings {
    pub fn workers(&self) -> usize {
        self.workers.filter(|n| *n > 0).unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ScyllaSettings {
    /// ScyllaDB contact points
    #[clap(
        long = "scylla-node",
        env = "FEED_SCYLLA_NODES",
        value_delimiter = ',',
        default_value = "127.0.0.1:9042"
    )]
    pub nodes: Vec<String>,

    /// Keyspace holding the feed tables
    #[clap(long, env = "FEED_KEYSPACE", default_value = "twitter_clone")]
    pub keyspace: String,
}

fn parse_level(raw: &str) -> Result<log::LevelFilter, String> {
    raw.parse()
        .map_err(|_| format!("unknown log level `{raw}`"))
}

/// Initializes `env_logger`, letting `RUST_LOG` override `level`.
pub fn init_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_local_development() {
        let settings = Settings::try_parse_from(["tweet_feed"]).expect("settings");
        assert_eq!(settings.bind, "127.0.0.1:8080".parse().expect("addr"));
        assert_eq!(settings.scylla.nodes, ["127.0.0.1:9042"]);
        assert_eq!(settings.scylla.keyspace, "twitter_clone");
        assert!(!settings.in_memory);
        assert!(settings.workers() >= 1);
    }

    #[test]
    fn accepts_node_lists_and_overrides() {
        let settings = Settings::try_parse_from([
            "tweet_feed",
            "--scylla-node",
            "10.0.0.1:9042,10.0.0.2:9042",
            "--keyspace",
            "feed",
            "--workers",
            "3",
            "--in-memory",
            "--log-level",
            "debug",
        ])
        .expect("settings");
        assert_eq!(settings.scylla.nodes, ["10.0.0.1:9042", "10.0.0.2:9042"]);
        assert_eq!(settings.scylla.keyspace, "feed");
        assert_eq!(settings.workers(), 3);
        assert!(settings.in_memory);
        assert_eq!(settings.log_level, log::LevelFilter::Debug);
    }

    #[test]
    fn rejects_unknown_log_levels() {
        assert!(Settings::try_parse_from(["tweet_feed", "--log-level", "loud"]).is_err());
    }
}
