// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! NDJSON encoding and delivery of batches to the collector.
//!
//! Each flush spawns a short-lived encoder task that serializes one record per
//! line into a bounded channel. The channel backs a streaming request body, so
//! encoding and transmission overlap and a batch is never materialized as one
//! buffer. An encoding error is pushed through the same channel and aborts the
//! request.

use crate::config::SinkConfig;
use crate::errors::{DeliveryError, SinkError};
use crate::http::get_client;
use crate::record::{Batch, Record};
use bytes::Bytes;
use futures::Stream;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

// Lines buffered between the encoder task and the request body
const ENCODE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    url: Url,
}

impl Transport {
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let url = Url::parse(&config.collector_url).map_err(|e| {
            SinkError::InvalidConfig(format!(
                "Invalid collector URL '{}': {e}",
                config.collector_url
            ))
        })?;
        let client = get_client(config)?;
        Ok(Self { client, url })
    }

    /// POSTs `batch` as NDJSON. Anything but a 200 is a delivery failure.
    pub async fn send(&self, batch: Batch) -> Result<(), DeliveryError> {
        let n_records = batch.len();
        let resp = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(encode_body(batch))
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(DeliveryError::Status(status));
        }

        debug!("SINK | Collector accepted {n_records} records");
        Ok(())
    }
}

/// Serializes one record as a single NDJSON line.
pub fn encode_line(record: &Record) -> Result<Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Builds a streaming request body fed by a spawned encoder task.
///
/// Must be called within a tokio runtime.
pub fn encode_body(batch: Batch) -> reqwest::Body {
    let (tx, rx) = mpsc::channel(ENCODE_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        for record in batch.into_records() {
            let line = encode_line(&record).map_err(io::Error::from);
            let failed = line.is_err();
            if tx.send(line).await.is_err() {
                debug!("SINK | Request body dropped before encoding finished");
                return;
            }
            if failed {
                return;
            }
        }
    });

    reqwest::Body::wrap_stream(EncodedLines { rx })
}

struct EncodedLines {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl Stream for EncodedLines {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
