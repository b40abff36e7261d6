//! Connection probe timeouts and retry policies.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use common::{Behavior, ScriptedConnector, healthy_row, server};
use replcheck_core::{
    CheckConfig, ConnectionProbe, ProbeResult, ReplCheckError, RetryPolicy, ServerDescriptor,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn probe(connector: &ScriptedConnector, config: &CheckConfig) -> ConnectionProbe {
    ConnectionProbe::new(Arc::new(connector.clone()), config)
}

#[tokio::test]
async fn test_probe_reachable_closes_connection() {
    let connector = ScriptedConnector::new().with("db1", Behavior::Rows(vec![healthy_row()]));

    let result = probe(&connector, &CheckConfig::default())
        .probe(&server("db1"))
        .await;

    assert_eq!(result, ProbeResult::Reachable);
    assert_eq!(connector.opened(), 1);
    assert_eq!(connector.closed(), 1);
    assert_eq!(connector.status_queries(), 0);
}

#[tokio::test]
async fn test_probe_refused_is_unreachable() {
    let connector = ScriptedConnector::new();

    let result = probe(&connector, &CheckConfig::default())
        .probe(&server("db1"))
        .await;

    match result {
        ProbeResult::Unreachable(reason) => {
            assert!(reason.contains("db1:3306"));
            assert!(reason.contains("connection refused"));
            assert!(!reason.contains("secret"));
        }
        ProbeResult::Reachable => panic!("refused connection reported reachable"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_probe_times_out_after_connect_timeout() {
    let connector = ScriptedConnector::new().with("blackhole", Behavior::Hang);
    let config = CheckConfig::default().with_connect_timeout(Duration::from_secs(5));

    let started = tokio::time::Instant::now();
    let result = probe(&connector, &config).probe(&server("blackhole")).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, ProbeResult::Unreachable(ref reason) if reason.contains("timed out")));
    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_retry_n_times_makes_n_plus_one_attempts() {
    let connector = ScriptedConnector::new();
    let config = CheckConfig::default()
        .with_retry(RetryPolicy::RetryNTimes(2))
        .with_retry_delay(Duration::from_millis(500));

    let started = tokio::time::Instant::now();
    let result = probe(&connector, &config).probe(&server("db1")).await;

    assert!(!result.is_reachable());
    assert_eq!(connector.connect_attempts(), 3);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_declining_ask_caller_stops_after_first_failure() {
    let asked = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&asked);
    let policy = RetryPolicy::ask_caller(move |ctx| {
        seen.fetch_add(1, Ordering::SeqCst);
        assert_eq!(ctx.host, "db1");
        assert_eq!(ctx.attempt, 1);
        assert!(ctx.error.is_connection_phase());
        false
    });
    let connector = ScriptedConnector::new();
    let config = CheckConfig::default().with_retry(policy);

    let error = match probe(&connector, &config).open(&server("db1")).await {
        Ok(_) => panic!("refused connection opened"),
        Err(e) => e,
    };

    assert_eq!(connector.connect_attempts(), 1);
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert!(matches!(error, ReplCheckError::RetryDeclined { attempts: 1, .. }));
    assert!(error.is_connection_phase());
}

#[tokio::test(start_paused = true)]
async fn test_ask_caller_is_consulted_after_every_failure() {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&attempts);
    let policy = RetryPolicy::ask_caller(move |ctx| {
        seen.lock().unwrap().push(ctx.attempt);
        ctx.attempt < 3
    });
    let connector = ScriptedConnector::new();
    let config = CheckConfig::default().with_retry(policy);

    let result = probe(&connector, &config).probe(&server("db1")).await;

    assert!(!result.is_reachable());
    assert_eq!(*attempts.lock().unwrap(), [1, 2, 3]);
    assert_eq!(connector.connect_attempts(), 3);
}

#[tokio::test]
async fn test_probe_never_logs_or_returns_password() {
    let connector = ScriptedConnector::new();
    let target = ServerDescriptor::new("db1", "repl", "hunter2", "app");

    let result = probe(&connector, &CheckConfig::default()).probe(&target).await;

    assert!(!format!("{:?}", result).contains("hunter2"));
    assert!(!format!("{:?}", target).contains("hunter2"));
}

#[cfg(feature = "mysql")]
mod silent_server {
    use super::*;
    use tokio::net::TcpListener;

    /// A listener that accepts connections and never sends the handshake.
    #[tokio::test]
    async fn test_probe_times_out_against_silent_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = CheckConfig::default().with_connect_timeout(Duration::from_secs(1));
        let target = ServerDescriptor::new("127.0.0.1", "repl", "secret", "").with_port(port);

        let started = std::time::Instant::now();
        let result = ConnectionProbe::mysql(&config).probe(&target).await;
        let elapsed = started.elapsed();

        match result {
            ProbeResult::Unreachable(reason) => assert!(reason.contains("timed out"), "{}", reason),
            ProbeResult::Reachable => panic!("silent listener reported reachable"),
        }
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(3));

        accept.abort();
    }
}
