use anyhow::bail;
use clap::{Args, Parser, Subcommand, ValueEnum};
use jiff::{SignedDuration, Timestamp};
use std::fmt::{Display, Formatter};

pub const STORE_BACKEND_ENV: &str = "SHORTIFY_STORE";
pub const SEQUENCE_BACKEND_ENV: &str = "SHORTIFY_SEQUENCE";
pub const CACHE_BACKEND_ENV: &str = "SHORTIFY_CACHE";
pub const MYSQL_DSN_ENV: &str = "SHORTIFY_MYSQL_DSN";
pub const REDIS_URL_ENV: &str = "SHORTIFY_REDIS_URL";
pub const CACHE_CAPACITY_ENV: &str = "SHORTIFY_CACHE_CAPACITY";
pub const CACHE_TTL_ENV: &str = "SHORTIFY_CACHE_TTL";
pub const SEQUENCE_RETRY_ENV: &str = "SHORTIFY_SEQUENCE_RETRY";
pub const MIN_CODE_LENGTH_ENV: &str = "SHORTIFY_MIN_CODE_LENGTH";
pub const BASE_URL_ENV: &str = "SHORTIFY_BASE_URL";
pub const MIGRATE_ENV: &str = "SHORTIFY_MIGRATE";
pub const LOG_FORMAT_ENV: &str = "SHORTIFY_LOG_FORMAT";

pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackendArg {
    #[value(name = "memory")]
    Memory,
    #[value(name = "mysql")]
    Mysql,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SequenceBackendArg {
    #[value(name = "memory")]
    Memory,
    #[value(name = "redis")]
    Redis,
    #[value(name = "mysql")]
    Mysql,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "none")]
    None,
    #[value(name = "moka")]
    Moka,
    #[value(name = "redis")]
    Redis,
    #[value(name = "layered")]
    Layered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetryArg {
    #[value(name = "none")]
    None,
    #[value(name = "fast")]
    Fast,
    #[value(name = "standard")]
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for StoreBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackendArg::Memory => write!(f, "memory"),
            StoreBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

impl Display for SequenceBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceBackendArg::Memory => write!(f, "memory"),
            SequenceBackendArg::Redis => write!(f, "redis"),
            SequenceBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::None => write!(f, "none"),
            CacheBackendArg::Moka => write!(f, "moka"),
            CacheBackendArg::Redis => write!(f, "redis"),
            CacheBackendArg::Layered => write!(f, "layered"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shortify", about = "Create, resolve and administer short links")]
pub struct CLI {
    #[command(flatten)]
    pub backends: BackendArgs,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct BackendArgs {
    #[arg(
        long,
        env = STORE_BACKEND_ENV,
        value_enum,
        default_value_t = StoreBackendArg::Memory
    )]
    pub store: StoreBackendArg,

    #[arg(
        long,
        env = SEQUENCE_BACKEND_ENV,
        value_enum,
        default_value_t = SequenceBackendArg::Memory
    )]
    pub sequence: SequenceBackendArg,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::Moka
    )]
    pub cache: CacheBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV)]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = REDIS_URL_ENV)]
    pub redis_url: Option<String>,

    /// Entries held by the in-process cache.
    #[arg(long, env = CACHE_CAPACITY_ENV, default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: u64,

    /// Bound on how long an in-process cache entry lives (e.g. "5m").
    #[arg(long, env = CACHE_TTL_ENV)]
    pub cache_ttl: Option<SignedDuration>,

    #[arg(long, env = SEQUENCE_RETRY_ENV, value_enum, default_value_t = RetryArg::Fast)]
    pub sequence_retry: RetryArg,

    #[arg(long, env = MIN_CODE_LENGTH_ENV, default_value_t = 0)]
    pub min_code_length: usize,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Create the MySQL tables and sequence row before running the command.
    #[arg(long, env = MIGRATE_ENV)]
    pub migrate: bool,
}

impl BackendArgs {
    /// Rejects backend combinations that would reissue codes.
    ///
    /// The in-process counter restarts at zero with every run, so against a
    /// durable store it hands out sequence values that are already stored.
    pub fn check(&self) -> anyhow::Result<()> {
        if self.sequence == SequenceBackendArg::Memory && self.store != StoreBackendArg::Memory {
            bail!(
                "--sequence memory cannot be used with --store {}; choose a redis or mysql sequence",
                self.store
            );
        }
        Ok(())
    }
}

/// Names one link, by code or by external id.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct LinkRef {
    pub code: Option<String>,
    #[arg(long)]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKey {
    Code(String),
    ExternalId(String),
}

impl LinkRef {
    pub fn key(self) -> anyhow::Result<LinkKey> {
        match (self.code, self.external_id) {
            (Some(code), None) => Ok(LinkKey::Code(code)),
            (None, Some(external_id)) => Ok(LinkKey::ExternalId(external_id)),
            _ => bail!("give either a code or --external-id"),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten a URL and print the short URL.
    Create {
        target: String,
        /// Expire this long after creation (e.g. "90s", "1h 30m").
        #[arg(long, conflicts_with = "expires_at")]
        expires_in: Option<SignedDuration>,
        /// Expire at this instant (RFC 3339).
        #[arg(long)]
        expires_at: Option<Timestamp>,
        #[arg(long)]
        owner: Option<String>,
        /// Key for later lookup or deletion, unique among live links.
        #[arg(long)]
        external_id: Option<String>,
    },
    /// Print the target a code resolves to.
    Resolve { code: String },
    /// Print the stored record for a link as JSON.
    Lookup {
        #[command(flatten)]
        link: LinkRef,
    },
    /// Tombstone a code so it stops resolving.
    Expire { code: String },
    /// Remove a link's data. The code is never reissued.
    Delete {
        #[command(flatten)]
        link: LinkRef,
    },
    /// List links that were not deleted, oldest first.
    List {
        /// Only list this owner's links.
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Run concurrent creates and resolves and report latency.
    Bench {
        #[arg(long, default_value_t = 10_000)]
        creates: usize,
        #[arg(long, default_value_t = 64)]
        concurrency: usize,
        #[arg(long, default_value_t = 4)]
        resolves_per_create: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_in_memory_backends() {
        let cli = CLI::try_parse_from(["shortify", "resolve", "b7"]).unwrap();
        assert_eq!(cli.backends.store, StoreBackendArg::Memory);
        assert_eq!(cli.backends.sequence, SequenceBackendArg::Memory);
        assert_eq!(cli.backends.cache, CacheBackendArg::Moka);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(matches!(cli.command, Command::Resolve { ref code } if code == "b7"));
    }

    #[test]
    fn parses_create_with_duration() {
        let cli = CLI::try_parse_from([
            "shortify",
            "--cache",
            "none",
            "create",
            "https://example.com/a/b",
            "--expires-in",
            "1h",
            "--owner",
            "alice",
        ])
        .unwrap();

        match cli.command {
            Command::Create {
                target,
                expires_in,
                expires_at,
                owner,
                external_id,
            } => {
                assert_eq!(target, "https://example.com/a/b");
                assert_eq!(expires_in, Some(SignedDuration::from_hours(1)));
                assert_eq!(expires_at, None);
                assert_eq!(owner.as_deref(), Some("alice"));
                assert_eq!(external_id, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.backends.cache, CacheBackendArg::None);
    }

    #[test]
    fn expiry_flags_conflict() {
        let parsed = CLI::try_parse_from([
            "shortify",
            "create",
            "https://example.com",
            "--expires-in",
            "1h",
            "--expires-at",
            "2030-01-01T00:00:00Z",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn memory_sequence_is_refused_with_a_durable_store() {
        let cli = CLI::try_parse_from(["shortify", "--store", "mysql", "resolve", "b7"]).unwrap();
        let err = cli.backends.check().unwrap_err();
        assert!(err.to_string().contains("--sequence memory"));

        for sequence in ["redis", "mysql"] {
            let cli = CLI::try_parse_from([
                "shortify", "--store", "mysql", "--sequence", sequence, "resolve", "b7",
            ])
            .unwrap();
            assert!(cli.backends.check().is_ok(), "{sequence} sequence");
        }

        let cli = CLI::try_parse_from(["shortify", "resolve", "b7"]).unwrap();
        assert!(cli.backends.check().is_ok());
    }

    #[test]
    fn links_are_named_by_code_or_external_id() {
        let cli = CLI::try_parse_from(["shortify", "lookup", "b7"]).unwrap();
        match cli.command {
            Command::Lookup { link } => {
                assert_eq!(link.key().unwrap(), LinkKey::Code("b7".to_string()))
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = CLI::try_parse_from(["shortify", "delete", "--external-id", "campaign-7"])
            .unwrap();
        match cli.command {
            Command::Delete { link } => assert_eq!(
                link.key().unwrap(),
                LinkKey::ExternalId("campaign-7".to_string())
            ),
            other => panic!("unexpected command {other:?}"),
        }

        assert!(CLI::try_parse_from(["shortify", "lookup"]).is_err());
        assert!(
            CLI::try_parse_from(["shortify", "lookup", "b7", "--external-id", "campaign-7"])
                .is_err()
        );
    }

    #[test]
    fn list_owner_is_optional() {
        let cli = CLI::try_parse_from(["shortify", "list", "--limit", "10"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::List { owner: None, offset: 0, limit: 10 }
        ));

        let cli = CLI::try_parse_from(["shortify", "list", "--owner", "alice"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::List { owner: Some(ref owner), .. } if owner == "alice"
        ));
    }
}
