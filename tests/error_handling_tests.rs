use flightcache::{Cache, CacheConfig, CacheError};
use futures::future::join_all;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const TTL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct CustomError {
    message: String,
}

impl std::fmt::Display for CustomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CustomError: {}", self.message)
    }
}

impl std::error::Error for CustomError {}

#[tokio::test]
async fn test_load_error_handling() {
    let cache = Cache::new(
        |key: String| async move {
            if key == "404" {
                Err(CustomError {
                    message: "Not found".to_string(),
                })
            } else {
                Ok(format!("loaded_{}", key))
            }
        },
        TTL,
    )
    .unwrap();

    let ok = cache.get("200", TTL).await.unwrap();
    assert_eq!(ok.value().map(String::as_str), Some("loaded_200"));

    let failed = cache.get("404", TTL).await.unwrap();
    assert!(!failed.coalesced);
    let err = failed.into_result().unwrap_err();
    assert!(err.to_string().contains("Not found"));
}

#[tokio::test]
async fn test_error_is_cached_without_retry() {
    let call_count = Arc::new(AtomicUsize::new(0));
    let count_clone = call_count.clone();

    let cache = Cache::new(
        move |_key: String| {
            let counter = count_clone.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count == 0 {
                    Err(CustomError {
                        message: "first call failed".to_string(),
                    })
                } else {
                    Ok("recovered".to_string())
                }
            }
        },
        TTL,
    )
    .unwrap();

    let first = cache.get("k", TTL).await.unwrap();
    let second = cache.get("k", TTL).await.unwrap();
    assert!(second.coalesced);
    assert_eq!(call_count.load(Ordering::SeqCst), 1);

    // Both callers get the very same error instance.
    let first_err = first.into_result().unwrap_err();
    let second_err = second.into_result().unwrap_err();
    assert!(Arc::ptr_eq(&first_err, &second_err));

    cache.delete("k").unwrap();
    let retried = cache.get("k", TTL).await.unwrap();
    assert!(!retried.coalesced);
    assert_eq!(retried.result.unwrap(), "recovered");
    assert_eq!(call_count.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_waiters_share_error() {
    let cache = Arc::new(
        Cache::new(
            |key: String| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err::<String, _>(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", key),
                ))
            },
            TTL,
        )
        .unwrap(),
    );

    let handles = (0..5).map(|_| {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get("file", TTL).await.unwrap() })
    });
    let errors: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().into_result().unwrap_err())
        .collect();

    assert!(errors.iter().all(|err| Arc::ptr_eq(err, &errors[0])));
    assert_eq!(errors[0].kind(), std::io::ErrorKind::NotFound);
    assert_eq!(errors[0].to_string(), "file not found");
}

#[tokio::test]
async fn test_cache_with_different_error_types() {
    let cache = Cache::new(
        |key: String| async move {
            match key.as_str() {
                "io_error" => Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "File not found",
                ))
                    as Box<dyn std::error::Error + Send + Sync>),
                "parse_error" => Err(Box::new("123abc".parse::<i32>().unwrap_err())
                    as Box<dyn std::error::Error + Send + Sync>),
                "custom_error" => Err(Box::new(CustomError {
                    message: "Something went wrong".to_string(),
                })
                    as Box<dyn std::error::Error + Send + Sync>),
                _ => Ok(format!("success_{}", key)),
            }
        },
        TTL,
    )
    .unwrap();

    let io_result = cache.get("io_error", TTL).await.unwrap().into_result();
    assert!(io_result.unwrap_err().to_string().contains("File not found"));

    let parse_result = cache.get("parse_error", TTL).await.unwrap().into_result();
    assert!(parse_result.is_err());

    let custom_result = cache.get("custom_error", TTL).await.unwrap().into_result();
    assert!(
        custom_result
            .unwrap_err()
            .to_string()
            .contains("Something went wrong")
    );

    let success_result = cache.get("valid_key", TTL).await.unwrap().into_result();
    assert_eq!(success_result.unwrap(), "success_valid_key");
}

#[tokio::test]
async fn test_invalid_sweep_interval_rejected() {
    let result = Cache::new(
        |_key: String| async { Ok::<u32, Infallible>(1) },
        Duration::ZERO,
    );
    assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_closed_cache_rejects_operations() {
    let cache = Cache::new(
        |key: String| async move { Ok::<_, Infallible>(key) },
        Duration::from_secs(1),
    )
    .unwrap();

    cache.get("k", TTL).await.unwrap();
    cache.close().await.unwrap();

    assert!(cache.is_closed());
    assert_eq!(cache.size(), 0);
    assert_eq!(cache.get("k", TTL).await.unwrap_err(), CacheError::Closed);
    assert_eq!(cache.delete("k").unwrap_err(), CacheError::Closed);
    assert_eq!(cache.delete_all().unwrap_err(), CacheError::Closed);
    assert_eq!(cache.close().await.unwrap_err(), CacheError::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_wait_timeout() {
    let cache = Arc::new(
        Cache::new(
            |key: String| async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, Infallible>(key)
            },
            TTL,
        )
        .unwrap(),
    );

    let creator = tokio::spawn({
        let cache = cache.clone();
        async move { cache.get("slow", TTL).await.unwrap() }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;

    let limit = Duration::from_millis(100);
    let timed_out = cache.get_within("slow", TTL, limit).await;
    assert_eq!(timed_out.unwrap_err(), CacheError::Timeout(limit));

    // The computation is unaffected and later callers still share it.
    assert!(!creator.await.unwrap().coalesced);
    let hit = cache.get_within("slow", TTL, limit).await.unwrap();
    assert!(hit.coalesced);
    assert_eq!(hit.result, Ok("slow".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_configured_wait_timeout_applies_to_get() {
    let config = CacheConfig::new(TTL).with_wait_timeout(Duration::from_secs(1));
    let cache = Arc::new(
        Cache::with_config(
            |key: String| async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, Infallible>(key)
            },
            config,
        )
        .unwrap(),
    );

    let _creator = tokio::spawn({
        let cache = cache.clone();
        async move { cache.get("slow", TTL).await }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(
        cache.get("slow", TTL).await.unwrap_err(),
        CacheError::Timeout(Duration::from_secs(1))
    );
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_computation() {
    let call_count = Arc::new(AtomicUsize::new(0));
    let count_clone = call_count.clone();

    let cache = Arc::new(
        Cache::new(
            move |key: String| {
                let counter = count_clone.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        std::future::pending::<()>().await;
                    }
                    Ok::<_, Infallible>(key)
                }
            },
            TTL,
        )
        .unwrap(),
    );

    let creator = tokio::spawn({
        let cache = cache.clone();
        async move { cache.get("k", TTL).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let waiter = tokio::spawn({
        let cache = cache.clone();
        async move { cache.get("k", TTL).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    creator.abort();
    assert_eq!(waiter.await.unwrap().unwrap_err(), CacheError::Abandoned);
    assert_eq!(cache.size(), 0);

    let retried = cache.get("k", TTL).await.unwrap();
    assert!(!retried.coalesced);
    assert_eq!(retried.result, Ok("k".to_string()));
    assert_eq!(call_count.load(Ordering::SeqCst), 2);
}
