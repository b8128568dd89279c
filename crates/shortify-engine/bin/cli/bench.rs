use crate::Engine;
use anyhow::{anyhow, ensure, Context};
use hdrhistogram::Histogram;
use shortify_engine::CreateParams;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Outcome of a [`run`].
#[derive(Debug)]
pub struct BenchReport {
    pub creates: usize,
    pub distinct_codes: usize,
    pub resolves: usize,
    pub elapsed: Duration,
    pub create_p50: Duration,
    pub create_p99: Duration,
    pub resolve_p50: Duration,
    pub resolve_p99: Duration,
}

impl Display for BenchReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "creates:  {} ({} distinct codes)",
            self.creates, self.distinct_codes
        )?;
        writeln!(f, "resolves: {}", self.resolves)?;
        writeln!(f, "elapsed:  {:?}", self.elapsed)?;
        writeln!(
            f,
            "create   p50 {:?}  p99 {:?}",
            self.create_p50, self.create_p99
        )?;
        write!(
            f,
            "resolve  p50 {:?}  p99 {:?}",
            self.resolve_p50, self.resolve_p99
        )
    }
}

/// Creates `creates` links with at most `concurrency` in flight, resolving
/// each one `resolves_per_create` times right after creation.
///
/// Fails if any operation fails, if two creates returned the same code, or if
/// a resolve returned a target other than the one just written.
pub async fn run(
    engine: Engine,
    creates: usize,
    concurrency: usize,
    resolves_per_create: usize,
) -> anyhow::Result<BenchReport> {
    ensure!(concurrency > 0, "concurrency must be at least 1");

    info!(creates, concurrency, resolves_per_create, "starting bench");
    let permits = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();
    let started = Instant::now();

    for i in 0..creates {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .context("bench semaphore closed")?;
        let engine = engine.clone();

        tasks.spawn(async move {
            let _permit = permit;
            let target = format!("https://bench.example/{i}");

            let t = Instant::now();
            let code = engine.create(CreateParams::new(target.clone())).await?;
            let create_latency = t.elapsed();

            let mut resolve_latencies = Vec::with_capacity(resolves_per_create);
            for _ in 0..resolves_per_create {
                let t = Instant::now();
                let resolved = engine.resolve(code.as_str()).await?;
                resolve_latencies.push(t.elapsed());
                ensure!(resolved == target, "{code} resolved to {resolved}, wrote {target}");
            }

            anyhow::Ok((code, create_latency, resolve_latencies))
        });
    }

    let mut codes = HashSet::with_capacity(creates);
    let mut create_latencies = Latencies::new()?;
    let mut resolve_latencies = Latencies::new()?;
    while let Some(joined) = tasks.join_next().await {
        let (code, create_latency, resolved) = joined.context("bench task panicked")??;
        codes.insert(code);
        create_latencies.record(create_latency);
        for latency in resolved {
            resolve_latencies.record(latency);
        }
    }
    let elapsed = started.elapsed();

    ensure!(
        codes.len() == creates,
        "{} duplicate codes issued",
        creates - codes.len()
    );

    Ok(BenchReport {
        creates,
        distinct_codes: codes.len(),
        resolves: resolve_latencies.count(),
        elapsed,
        create_p50: create_latencies.quantile(0.5),
        create_p99: create_latencies.quantile(0.99),
        resolve_p50: resolve_latencies.quantile(0.5),
        resolve_p99: resolve_latencies.quantile(0.99),
    })
}

/// Microsecond latency histogram with three significant digits.
struct Latencies(Histogram<u64>);

impl Latencies {
    fn new() -> anyhow::Result<Self> {
        Histogram::new(3)
            .map(Self)
            .map_err(|e| anyhow!("failed to create latency histogram: {e:?}"))
    }

    fn record(&mut self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        if let Err(e) = self.0.record(micros) {
            error!("metrics error: {:?}, value: {}", e, micros);
        }
    }

    fn count(&self) -> usize {
        usize::try_from(self.0.len()).unwrap_or(usize::MAX)
    }

    fn quantile(&self, quantile: f64) -> Duration {
        Duration::from_micros(self.0.value_at_quantile(quantile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortify_cache::MokaLinkCache;
    use shortify_core::{LinkCache, MappingStore, SequenceAllocator};
    use shortify_engine::ShortenerEngine;
    use shortify_sequence::AtomicSequence;
    use shortify_storage::InMemoryStore;

    #[test]
    fn latencies_report_quantiles() {
        let mut latencies = Latencies::new().unwrap();
        for ms in 1..=100 {
            latencies.record(Duration::from_millis(ms));
        }

        assert_eq!(latencies.count(), 100);
        assert_close(latencies.quantile(0.5), Duration::from_millis(50));
        assert_close(latencies.quantile(0.99), Duration::from_millis(99));
    }

    /// Within the histogram's three significant digits.
    fn assert_close(actual: Duration, expected: Duration) {
        let slack = expected / 1000;
        assert!(
            actual >= expected && actual <= expected + slack,
            "{actual:?} is not within {slack:?} of {expected:?}"
        );
    }

    #[test]
    fn empty_latencies_report_zero() {
        let latencies = Latencies::new().unwrap();
        assert_eq!(latencies.count(), 0);
        assert_eq!(latencies.quantile(0.99), Duration::ZERO);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bench_issues_distinct_codes() {
        let allocator: Arc<dyn SequenceAllocator> = Arc::new(AtomicSequence::new());
        let store: Arc<dyn MappingStore> = Arc::new(InMemoryStore::new());
        let cache: Arc<dyn LinkCache> = Arc::new(MokaLinkCache::new());
        let engine: Engine = ShortenerEngine::new(allocator, store, cache);

        let report = run(engine, 500, 16, 2).await.unwrap();
        assert_eq!(report.creates, 500);
        assert_eq!(report.distinct_codes, 500);
        assert_eq!(report.resolves, 1000);
        assert!(report.create_p50 <= report.create_p99);
    }
}
