mod bench;
mod cli;

use crate::cli::{
    BackendArgs, CacheBackendArg, Command, LinkKey, LogFormat, RetryArg, SequenceBackendArg,
    StoreBackendArg, CLI,
};
use anyhow::{bail, Context};
use clap::Parser;
use shortify_cache::{LayeredCache, MokaCacheConfig, MokaLinkCache, NullCache, RedisLinkCache};
use shortify_core::{LinkCache, MappingStore, Page, SequenceAllocator};
use shortify_engine::{CreateParams, EngineSettings, ExpirationPolicy, ShortenerEngine};
use shortify_sequence::{AtomicSequence, MySqlSequence, RedisSequence, RetryPolicy, Retrying};
use shortify_storage::{InMemoryStore, MySqlStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub(crate) type Engine =
    ShortenerEngine<Arc<dyn SequenceAllocator>, Arc<dyn MappingStore>, Arc<dyn LinkCache>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::try_parse()?;
    init_tracing(config.log_format);

    info!(
        store = %config.backends.store,
        sequence = %config.backends.sequence,
        cache = %config.backends.cache,
        "starting shortify"
    );

    let engine = build_engine(&config.backends).await?;
    let base_url = config.backends.base_url.as_str();

    match config.command {
        Command::Create {
            target,
            expires_in,
            expires_at,
            owner,
            external_id,
        } => {
            let expiration = match (expires_in, expires_at) {
                (Some(duration), _) => ExpirationPolicy::AfterDuration(duration),
                (None, Some(at)) => ExpirationPolicy::AtTimestamp(at),
                (None, None) => ExpirationPolicy::Never,
            };
            let params = CreateParams {
                target,
                expiration,
                owner,
                external_id,
            };
            let code = engine.create(params).await?;
            println!("{}", code.to_url(base_url));
        }
        Command::Resolve { code } => {
            println!("{}", engine.resolve(&code).await?);
        }
        Command::Lookup { link } => {
            let link = match link.key()? {
                LinkKey::Code(code) => engine.lookup(&code).await?,
                LinkKey::ExternalId(external_id) => {
                    engine.lookup_by_external_id(&external_id).await?
                }
            };
            println!("{}", serde_json::to_string_pretty(&link)?);
        }
        Command::Expire { code } => {
            engine.expire(&code).await?;
            println!("expired {code}");
        }
        Command::Delete { link } => match link.key()? {
            LinkKey::Code(code) => {
                engine.delete(&code).await?;
                println!("deleted {code}");
            }
            LinkKey::ExternalId(external_id) => {
                engine.delete_by_external_id(&external_id).await?;
                println!("deleted {external_id}");
            }
        },
        Command::List {
            owner,
            offset,
            limit,
        } => {
            let page = Page::new(offset, limit);
            let links = match owner {
                Some(owner) => engine.links_for_owner(&owner, page).await?,
                None => engine.links(page).await?,
            };
            for link in links {
                println!("{}", serde_json::to_string(&link)?);
            }
        }
        Command::Bench {
            creates,
            concurrency,
            resolves_per_create,
        } => {
            let report = bench::run(engine, creates, concurrency, resolves_per_create).await?;
            println!("{report}");
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

async fn build_engine(args: &BackendArgs) -> anyhow::Result<Engine> {
    args.check()?;

    let allocator = build_allocator(args).await?;
    let store = build_store(args).await?;
    let cache = build_cache(args).await?;

    let settings = EngineSettings::builder()
        .min_code_length(args.min_code_length)
        .build();
    let engine = ShortenerEngine::with_settings(allocator, store, cache, &settings)?;
    Ok(engine)
}

fn retry_policy(arg: RetryArg) -> RetryPolicy {
    match arg {
        RetryArg::None => RetryPolicy::no_retry(),
        RetryArg::Fast => RetryPolicy::fast(),
        RetryArg::Standard => RetryPolicy::standard(),
    }
}

async fn build_allocator(args: &BackendArgs) -> anyhow::Result<Arc<dyn SequenceAllocator>> {
    let policy = retry_policy(args.sequence_retry);

    let allocator: Arc<dyn SequenceAllocator> = match args.sequence {
        SequenceBackendArg::Memory => Arc::new(Retrying::new(AtomicSequence::new(), policy)),
        SequenceBackendArg::Redis => {
            let url = redis_url(args)?;
            let sequence = RedisSequence::connect(url)
                .await
                .context("failed to connect the redis sequence")?;
            Arc::new(Retrying::new(sequence, policy))
        }
        SequenceBackendArg::Mysql => {
            let dsn = mysql_dsn(args)?;
            let sequence = MySqlSequence::connect(dsn)
                .await
                .context("failed to connect the mysql sequence")?;
            if args.migrate {
                sequence
                    .migrate()
                    .await
                    .context("failed to migrate the mysql sequence")?;
            }
            Arc::new(Retrying::new(sequence, policy))
        }
    };
    Ok(allocator)
}

async fn build_store(args: &BackendArgs) -> anyhow::Result<Arc<dyn MappingStore>> {
    let store: Arc<dyn MappingStore> = match args.store {
        StoreBackendArg::Memory => Arc::new(InMemoryStore::new()),
        StoreBackendArg::Mysql => {
            let dsn = mysql_dsn(args)?;
            let store = MySqlStore::connect(dsn)
                .await
                .context("failed to connect the mysql store")?;
            if args.migrate {
                store
                    .migrate()
                    .await
                    .context("failed to migrate the mysql store")?;
            }
            Arc::new(store)
        }
    };
    Ok(store)
}

async fn build_cache(args: &BackendArgs) -> anyhow::Result<Arc<dyn LinkCache>> {
    let cache: Arc<dyn LinkCache> = match args.cache {
        CacheBackendArg::None => Arc::new(NullCache),
        CacheBackendArg::Moka => Arc::new(moka_cache(args)?),
        CacheBackendArg::Redis => Arc::new(redis_cache(args).await?),
        CacheBackendArg::Layered => {
            Arc::new(LayeredCache::new(moka_cache(args)?, redis_cache(args).await?))
        }
    };
    Ok(cache)
}

fn moka_cache(args: &BackendArgs) -> anyhow::Result<MokaLinkCache> {
    let ttl = args
        .cache_ttl
        .map(std::time::Duration::try_from)
        .transpose()
        .context("cache ttl must be positive")?;

    let config = MokaCacheConfig {
        max_capacity: args.cache_capacity,
        ttl,
    };
    Ok(config.into())
}

async fn redis_cache(args: &BackendArgs) -> anyhow::Result<RedisLinkCache> {
    let url = redis_url(args)?;
    RedisLinkCache::connect(url)
        .await
        .context("failed to connect the redis cache")
}

fn mysql_dsn(args: &BackendArgs) -> anyhow::Result<&str> {
    match args.mysql_dsn.as_deref() {
        Some(dsn) => Ok(dsn),
        None => bail!("--mysql-dsn is required when a mysql backend is selected"),
    }
}

fn redis_url(args: &BackendArgs) -> anyhow::Result<&str> {
    match args.redis_url.as_deref() {
        Some(url) => Ok(url),
        None => bail!("--redis-url is required when a redis backend is selected"),
    }
}
