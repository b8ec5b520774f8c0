// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use event_sink::Record;
use mockito::{Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A mock collector that records every POST body it receives, in arrival order.
pub struct Collector {
    pub server: ServerGuard,
    pub mock: Mock,
    bodies: Arc<Mutex<Vec<String>>>,
}

impl Collector {
    pub async fn start(status: usize) -> Self {
        let mut server = Server::new_async().await;
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&bodies);

        let mock = server
            .mock("POST", "/submit")
            .with_status(status)
            .with_body_from_request(move |request| {
                let body = request
                    .body()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_default();
                captured.lock().expect("lock poisoned").push(body);
                Vec::new()
            })
            .expect_at_least(0)
            .create_async()
            .await;

        Self {
            server,
            mock,
            bodies,
        }
    }

    pub fn url(&self) -> String {
        format!("{}/submit", self.server.url())
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().expect("lock poisoned").clone()
    }

    /// Every received line, parsed, across all bodies in arrival order.
    pub fn records(&self) -> Vec<Value> {
        self.bodies()
            .iter()
            .flat_map(|body| body.lines().map(str::to_owned).collect::<Vec<_>>())
            .map(|line| serde_json::from_str(&line).expect("collector received invalid JSON"))
            .collect()
    }

    /// Polls until at least `n` bodies arrived or `limit` elapses.
    pub async fn wait_for_bodies(&self, n: usize, limit: Duration) -> bool {
        let poll = async {
            while self.bodies().len() < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(limit, poll).await.is_ok()
    }
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn seq_record(i: usize) -> Record {
    record(json!({ "seq": i }))
}
