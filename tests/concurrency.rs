#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use bytes::Bytes;
use common::{connect_to_fake_server, keys, RecordingTransport, ServerBehavior};
use session_dispatch::{Conn, Flag, FrameKind, Metric, Node};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_sends_all_resolve_and_drain_registry() {
    let tasks_n = 16usize;
    let sends_m = 50usize;
    let (conn, server) = connect_to_fake_server(Duration::from_secs(10), ServerBehavior::default());

    let mut tasks = JoinSet::new();
    for t in 0..tasks_n {
        let conn = conn.clone();
        tasks.spawn(async move {
            let mut tags = Vec::with_capacity(sends_m);
            for i in 0..sends_m {
                let pending = if i % 2 == 0 {
                    conn.write_json(&serde_json::json!(["query", "chat", t, i]))
                        .await
                        .unwrap()
                } else {
                    let tag = format!("{t}.bin.{i}");
                    let node = Node::new("query").with_attr("index", i.to_string());
                    conn.write_binary(&node, Metric::QUERY_CHAT, Flag::IGNORE, &tag)
                        .await
                        .unwrap()
                };
                tags.push(pending.tag().to_string());
                let reply = conn.await_text(pending).await.unwrap();
                assert!(reply.starts_with("{\"echo\":"));
            }
            tags
        });
    }

    let mut all_tags = HashSet::new();
    while let Some(res) = tasks.join_next().await {
        for tag in res.unwrap() {
            assert!(all_tags.insert(tag), "tag issued twice");
        }
    }

    assert_eq!(all_tags.len(), tasks_n * sends_m);
    assert!(conn.registry().is_empty());
    assert_eq!(conn.msg_count(), (tasks_n * sends_m) as u64);

    let snapshot = conn.metrics().snapshot();
    assert_eq!(snapshot.pending_registered, (tasks_n * sends_m) as u64);
    assert_eq!(snapshot.pending_delivered, (tasks_n * sends_m) as u64);

    drop(conn);
    assert_eq!(server.await.unwrap(), tasks_n * sends_m);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_tag_writes_leave_single_entry() {
    let transport = RecordingTransport::default();
    let conn = Arc::new(Conn::new(transport.clone(), keys()));

    let mut tasks = JoinSet::new();
    for i in 0..32 {
        let conn = conn.clone();
        tasks.spawn(async move {
            conn.write(FrameKind::Text, "same", Bytes::from(format!("same,{i}")))
                .await
                .unwrap()
                .unwrap()
        });
    }

    let mut waiters = Vec::new();
    while let Some(res) = tasks.join_next().await {
        waiters.push(res.unwrap());
    }

    assert_eq!(conn.registry().len(), 1);
    assert_eq!(transport.frames().len(), 32);

    // exactly one waiter is still connected to the registry
    conn.registry().deliver("same", "done".into()).unwrap();
    let mut delivered = 0;
    for mut w in waiters {
        if w.try_recv().is_some() {
            delivered += 1;
        }
    }
    assert_eq!(delivered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_keepalives_and_requests() {
    let (conn, _server) = connect_to_fake_server(Duration::from_secs(5), ServerBehavior::default());

    let mut tasks = JoinSet::new();
    for i in 0..20 {
        let conn = conn.clone();
        tasks.spawn(async move {
            let id = i.to_string();
            conn.request_json(&["query", "status", id.as_str()]).await
        });
    }
    conn.send_keepalive().await.unwrap();

    while let Some(res) = tasks.join_next().await {
        res.unwrap().unwrap();
    }
    assert!(conn.server_last_seen().is_some());
    assert!(conn.registry().is_empty());
}
