//! End-to-end dispatch scenarios over the in-memory transport

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use courier::dispatch::DispatchEngine;
use courier::job::{DirectParams, JobParams, TaskState};
use courier::registry::Account;
use courier::status::StatusBus;
use wireline::{Connector, MemoryConnector, SendError, Target};

async fn accounts_with_targets(
    connector: &MemoryConnector,
    specs: &[(&str, Vec<Target>)],
) -> Vec<Account> {
    let mut accounts = Vec::new();
    for (i, (session, targets)) in specs.iter().enumerate() {
        let conn = connector.connect(session).await.unwrap();
        accounts.push(Account {
            ordinal: i as u32 + 1,
            session: session.to_string(),
            phone: conn.phone,
            outbox: conn.outbox,
            targets: targets.clone(),
        });
    }
    accounts
}

fn engine() -> DispatchEngine {
    DispatchEngine::new(Arc::new(StatusBus::with_default_capacity()))
}

fn broadcast_params(rounds: u32) -> JobParams {
    JobParams {
        message: "hi".to_string(),
        rounds,
        round_delay_secs: 0,
        account_stagger_secs: 0,
    }
}

fn direct_params(rounds: u32) -> DirectParams {
    DirectParams {
        message: "hi".to_string(),
        rounds,
        round_delay_secs: 0,
        target_stagger_secs: 0,
    }
}

fn group_pair() -> Vec<Target> {
    vec![Target::group(1, "g1"), Target::group(2, "g2")]
}

#[tokio::test]
async fn two_accounts_two_rounds_is_eight_sends_in_order() {
    let connector = MemoryConnector::new();
    let accounts = accounts_with_targets(
        &connector,
        &[("acct1", group_pair()), ("acct2", group_pair())],
    )
    .await;

    let mut handle = engine()
        .start_broadcast(broadcast_params(2), &accounts)
        .unwrap();
    let results = handle.join().await;

    assert_eq!(results.len(), 2);
    let total: u32 = results.iter().map(|r| r.sent).sum();
    assert_eq!(total, 8);

    // Each account's own sequence is g1,g2,g1,g2 regardless of interleaving
    for session in ["acct1", "acct2"] {
        let keys = connector.outbox(session).unwrap().sent_keys();
        assert_eq!(keys, vec!["group:1", "group:2", "group:1", "group:2"]);
    }

    // Every message carried the job's text
    for session in ["acct1", "acct2"] {
        assert!(connector
            .outbox(session)
            .unwrap()
            .sent()
            .iter()
            .all(|m| m.message == "hi"));
    }
}

#[tokio::test]
async fn direct_partitions_users_round_robin() {
    let connector = MemoryConnector::new();
    let accounts = accounts_with_targets(
        &connector,
        &[("acct1", vec![]), ("acct2", vec![]), ("acct3", vec![])],
    )
    .await;
    let users: Vec<Target> = (0..5).map(|i| Target::user(format!("@u{}", i))).collect();

    let mut handle = engine()
        .start_direct(direct_params(1), &accounts, users.clone())
        .unwrap();
    let results = handle.join().await;

    assert!(results.iter().all(|r| r.state == TaskState::Completed));

    // Account 0 gets positions {0,3}, account 1 {1,4}, account 2 {2}
    assert_eq!(
        connector.outbox("acct1").unwrap().sent_keys(),
        vec!["user:@u0", "user:@u3"]
    );
    assert_eq!(
        connector.outbox("acct2").unwrap().sent_keys(),
        vec!["user:@u1", "user:@u4"]
    );
    assert_eq!(connector.outbox("acct3").unwrap().sent_keys(), vec!["user:@u2"]);

    // Union: every user exactly once
    let mut counts: HashMap<String, u32> = HashMap::new();
    for session in ["acct1", "acct2", "acct3"] {
        for key in connector.outbox(session).unwrap().sent_keys() {
            *counts.entry(key).or_default() += 1;
        }
    }
    assert_eq!(counts.len(), 5);
    assert!(counts.values().all(|&c| c == 1));
}

#[tokio::test]
async fn direct_multiple_rounds_sends_once_per_user_per_round() {
    let connector = MemoryConnector::new();
    let accounts = accounts_with_targets(&connector, &[("acct1", vec![]), ("acct2", vec![])]).await;
    let users: Vec<Target> = (0..4).map(|i| Target::user(format!("@u{}", i))).collect();

    let mut handle = engine()
        .start_direct(direct_params(2), &accounts, users)
        .unwrap();
    let results = handle.join().await;

    let total: u32 = results.iter().map(|r| r.sent).sum();
    assert_eq!(total, 8);

    let mut counts: HashMap<String, u32> = HashMap::new();
    for session in ["acct1", "acct2"] {
        for key in connector.outbox(session).unwrap().sent_keys() {
            *counts.entry(key).or_default() += 1;
        }
    }
    // Each user exactly once per round
    assert!(counts.values().all(|&c| c == 2));
}

#[tokio::test]
async fn account_penalty_leaves_siblings_unaffected() {
    let connector = MemoryConnector::new();
    let accounts = accounts_with_targets(
        &connector,
        &[("victim", group_pair()), ("healthy", group_pair())],
    )
    .await;

    // Penalty lands on victim's round-2 hit of g1 (its third send overall)
    connector
        .outbox("victim")
        .unwrap()
        .fail_send_attempt(&Target::group(1, "g1"), 2, SendError::PeerFlood);

    let mut handle = engine()
        .start_broadcast(broadcast_params(2), &accounts)
        .unwrap();
    let results = handle.join().await;

    let victim = results.iter().find(|r| r.session == "victim").unwrap();
    let healthy = results.iter().find(|r| r.session == "healthy").unwrap();

    assert_eq!(victim.state, TaskState::Failed);
    assert!(victim.aborted.is_some());
    assert_eq!(victim.sent, 2); // round 1 only

    assert_eq!(healthy.state, TaskState::Completed);
    assert_eq!(healthy.sent, 4);
    assert_eq!(
        connector.outbox("healthy").unwrap().sent_keys(),
        vec!["group:1", "group:2", "group:1", "group:2"]
    );
}

#[tokio::test]
async fn cancellation_stops_new_sends_across_all_tasks() {
    let connector = MemoryConnector::new();
    let accounts = accounts_with_targets(
        &connector,
        &[("acct1", group_pair()), ("acct2", group_pair())],
    )
    .await;

    // Park both tasks in a long advertised cooldown on their first target
    for session in ["acct1", "acct2"] {
        connector
            .outbox(session)
            .unwrap()
            .fail_send_attempt(&Target::group(1, "g1"), 1, SendError::FloodWait { seconds: 3600 });
    }

    let mut handle = engine()
        .start_broadcast(broadcast_params(1), &accounts)
        .unwrap();

    // Let the tasks reach the flood wait, then stop
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.is_running());
    handle.stop();

    let results = handle.join().await;
    assert!(results.iter().all(|r| r.state == TaskState::Cancelled));

    // Nothing was delivered after the stop
    for session in ["acct1", "acct2"] {
        assert!(connector.outbox(session).unwrap().sent().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn flood_wait_honors_advertised_duration_then_retries() {
    let connector = MemoryConnector::new();
    let accounts = accounts_with_targets(&connector, &[("acct1", group_pair())]).await;

    connector
        .outbox("acct1")
        .unwrap()
        .fail_send_attempt(&Target::group(1, "g1"), 1, SendError::FloodWait { seconds: 60 });

    let start = tokio::time::Instant::now();
    let mut handle = engine()
        .start_broadcast(broadcast_params(1), &accounts)
        .unwrap();
    let results = handle.join().await;

    // Advertised 60s plus the 1s margin, in virtual time
    assert!(start.elapsed() >= Duration::from_secs(61));
    assert_eq!(results[0].sent, 2);
    assert_eq!(results[0].state, TaskState::Completed);
    assert_eq!(
        connector.outbox("acct1").unwrap().sent_keys(),
        vec!["group:1", "group:2"]
    );
}

#[tokio::test(start_paused = true)]
async fn account_stagger_delays_later_accounts() {
    let connector = MemoryConnector::new();
    let accounts = accounts_with_targets(
        &connector,
        &[
            ("acct1", vec![Target::group(1, "g1")]),
            ("acct2", vec![Target::group(2, "g2")]),
        ],
    )
    .await;

    let params = JobParams {
        message: "hi".to_string(),
        rounds: 1,
        round_delay_secs: 0,
        account_stagger_secs: 30,
    };

    let start = tokio::time::Instant::now();
    let mut handle = engine().start_broadcast(params, &accounts).unwrap();
    let results = handle.join().await;

    // Second account waited 1 * 30s before sending
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert!(results.iter().all(|r| r.state == TaskState::Completed));

    // Global order: acct1 first, acct2 after its stagger
    let first = connector.outbox("acct1").unwrap().sent()[0].seq;
    let second = connector.outbox("acct2").unwrap().sent()[0].seq;
    assert!(first < second);
}

#[tokio::test(start_paused = true)]
async fn direct_global_stagger_orders_sends_across_accounts() {
    let connector = MemoryConnector::new();
    let accounts = accounts_with_targets(&connector, &[("acct1", vec![]), ("acct2", vec![])]).await;
    let users: Vec<Target> = (0..4).map(|i| Target::user(format!("@u{}", i))).collect();

    let params = DirectParams {
        message: "hi".to_string(),
        rounds: 1,
        round_delay_secs: 0,
        target_stagger_secs: 5,
    };

    let mut handle = engine().start_direct(params, &accounts, users).unwrap();
    handle.join().await;

    // Sends happen in global position order: u0, u1, u2, u3
    let mut all: Vec<(u64, String)> = Vec::new();
    for session in ["acct1", "acct2"] {
        for m in connector.outbox(session).unwrap().sent() {
            all.push((m.seq, m.target_key));
        }
    }
    all.sort();
    let keys: Vec<&str> = all.iter().map(|(_, k)| k.as_str()).collect();
    assert_eq!(keys, vec!["user:@u0", "user:@u1", "user:@u2", "user:@u3"]);
}

#[tokio::test]
async fn direct_with_more_accounts_than_users_skips_idle_accounts() {
    let connector = MemoryConnector::new();
    let accounts = accounts_with_targets(
        &connector,
        &[("acct1", vec![]), ("acct2", vec![]), ("acct3", vec![])],
    )
    .await;
    let users = vec![Target::user("@u0"), Target::user("@u1")];

    let mut handle = engine()
        .start_direct(direct_params(1), &accounts, users)
        .unwrap();
    let results = handle.join().await;

    // Only the accounts that got work report a row
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.state == TaskState::Completed && r.sent == 1));
    assert!(connector.outbox("acct3").unwrap().sent().is_empty());
}

#[tokio::test]
async fn broadcast_only_targets_do_not_fail_the_job() {
    let connector = MemoryConnector::new();
    let channel = Target::Group(wireline::GroupTarget {
        id: 7,
        title: "announcements".to_string(),
        username: None,
        broadcast_only: true,
    });
    let accounts = accounts_with_targets(
        &connector,
        &[("acct1", vec![Target::group(1, "g1"), channel])],
    )
    .await;

    let mut handle = engine()
        .start_broadcast(broadcast_params(1), &accounts)
        .unwrap();
    let results = handle.join().await;

    assert_eq!(results[0].state, TaskState::Completed);
    assert_eq!(results[0].sent, 1);
    assert_eq!(results[0].skipped, 1);
    assert_eq!(results[0].failed, 0);
}
