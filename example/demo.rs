use clap::Parser;
use flightcache::{Cache, CacheError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

const SAMPLE_HOSTS: &[&str] = &[
    "www.google.com",
    "www.youtube.com",
    "www.wikipedia.org",
    "www.github.com",
    "www.mozilla.org",
    "www.rust-lang.org",
    "www.cloudflare.com",
    "www.amazon.com",
    "www.microsoft.com",
    "www.apple.com",
    "www.reddit.com",
    "www.stackoverflow.com",
    "www.bbc.co.uk",
    "www.nytimes.com",
    "www.theguardian.com",
    "www.reuters.com",
    "www.arxiv.org",
    "www.python.org",
    "www.gnu.org",
    "www.w3.org",
    "www.ietf.org",
    "www.archive.org",
    "www.docker.com",
    "www.gitlab.com",
];

/// Fetches sample pages concurrently through a single-flight cache and
/// reports which lookups were served from an existing entry.
#[derive(Debug, Parser)]
struct Args {
    /// Lifetime of each cached page, in seconds
    #[arg(long, env = "DEMO_TTL_SECS", default_value_t = 3600)]
    ttl_secs: u64,

    /// Period of the background expiry sweep, in seconds
    #[arg(long, env = "DEMO_SWEEP_SECS", default_value_t = 3600)]
    sweep_secs: u64,

    /// How many times every host is requested, all at once
    #[arg(long, default_value_t = 2)]
    rounds: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let cache = Arc::new(Cache::new(
        move |host: String| {
            let client = client.clone();
            async move {
                let response = client
                    .get(format!("https://{}", host))
                    .send()
                    .await?
                    .error_for_status()?;
                response.bytes().await
            }
        },
        Duration::from_secs(args.sweep_secs),
    )?);

    let ttl = Duration::from_secs(args.ttl_secs);
    let mut tasks = JoinSet::new();
    for _ in 0..args.rounds {
        for &host in SAMPLE_HOSTS {
            let cache = cache.clone();
            tasks.spawn(async move {
                let started = Instant::now();
                let lookup = cache.get(host, ttl).await?;
                if let Err(err) = &lookup.result {
                    tracing::warn!(host, %err, "fetch failed");
                }
                println!(
                    "{}, {:?} ___ coalesced?: {}",
                    host,
                    started.elapsed(),
                    lookup.coalesced
                );
                Ok::<_, CacheError>(lookup.coalesced)
            });
        }
    }

    let (mut hits, mut misses) = (0usize, 0usize);
    while let Some(joined) = tasks.join_next().await {
        if joined?? {
            hits += 1;
        } else {
            misses += 1;
        }
    }

    println!("Lookups: {} coalesced, {} computed", hits, misses);
    println!("Entries cached: {}", cache.size());

    cache.close().await?;
    Ok(())
}
