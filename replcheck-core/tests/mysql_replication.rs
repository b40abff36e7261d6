//! Collector and probe against a real MySQL server.
//!
//! The container is a standalone server, not a replica, so the status
//! statements return no rows. That still exercises the full driver path:
//! handshake, `VERSION()`, the text-protocol `SHOW` statement and close.

#![cfg(feature = "mysql")]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use replcheck_core::{
    CheckConfig, ConnectionProbe, ProbeResult, ReplicationStatusCollector, ServerDescriptor,
    ServerOutcome, StatusQuery, TopologyLabel,
};
use std::time::Duration;
use testcontainers_modules::{mysql::Mysql, testcontainers::runners::AsyncRunner};

/// Helper function to wait for MySQL to be ready
async fn wait_for_mysql_ready(server: &ServerDescriptor, max_attempts: u32) {
    let probe = ConnectionProbe::mysql(&CheckConfig::default());
    for attempt in 1..=max_attempts {
        if probe.probe(server).await.is_reachable() {
            return;
        }
        if attempt < max_attempts {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
    panic!("MySQL failed to become ready after {} attempts", max_attempts);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_mysql_standalone_server_has_no_replication() {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    let server = ServerDescriptor::new("127.0.0.1", "root", "", "test").with_port(port);

    wait_for_mysql_ready(&server, 30).await;

    for query in [StatusQuery::Slave, StatusQuery::Replica] {
        let collector =
            ReplicationStatusCollector::mysql(CheckConfig::default().with_status_query(query));
        let outcomes = collector
            .collect(std::slice::from_ref(&server), TopologyLabel::MainToNode)
            .await;

        match outcomes.as_slice() {
            [ServerOutcome::NoReplicationConfigured {
                host,
                server_version,
            }] => {
                assert_eq!(host, "127.0.0.1");
                assert!(server_version.is_some());
            }
            other => panic!("{} on a standalone server: {:?}", query.sql(), other),
        }
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_mysql_wrong_password_is_unreachable() {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    let root = ServerDescriptor::new("127.0.0.1", "root", "", "test").with_port(port);
    wait_for_mysql_ready(&root, 30).await;

    let intruder = ServerDescriptor::new("127.0.0.1", "nobody", "wrong-password", "test")
        .with_port(port);
    let config = CheckConfig::default();

    match ConnectionProbe::mysql(&config).probe(&intruder).await {
        ProbeResult::Unreachable(reason) => {
            assert!(reason.contains(&format!("127.0.0.1:{}", port)));
            assert!(!reason.contains("wrong-password"));
        }
        ProbeResult::Reachable => panic!("bad credentials accepted"),
    }

    let outcomes = ReplicationStatusCollector::mysql(config)
        .collect(&[intruder, root], TopologyLabel::NodeToNode)
        .await;
    assert!(matches!(outcomes[0], ServerOutcome::Unreachable { .. }));
    assert!(matches!(
        outcomes[1],
        ServerOutcome::NoReplicationConfigured { .. }
    ));
}
