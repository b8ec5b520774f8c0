// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use event_sink::{Record, Sink, SinkConfig, SinkHandle};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("SINK_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match SinkConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating sink config on forwarder startup: {e}");
            return;
        }
    };

    let mut sink = match Sink::new(config) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Error creating sink: {e}");
            return;
        }
    };
    if let Err(e) = sink.start() {
        error!("Error starting sink: {e}");
        return;
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    let stdin = BufReader::new(tokio::io::stdin());
    let forwarded = forward_lines(stdin, &sink.handle(), shutdown).await;

    sink.stop().await;
    info!("Forwarded {forwarded} records");
}

/// Forwards every line of `input` until it ends or `shutdown` resolves.
/// Returns how many records were enqueued.
///
/// A send parked on a full queue is abandoned as soon as `shutdown` fires.
async fn forward_lines<R, F>(input: R, handle: &SinkHandle, shutdown: F) -> u64
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut lines = input.lines();
    let mut forwarded: u64 = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => tokio::select! {
                    enqueued = forward_line(handle, &line) => {
                        if enqueued {
                            forwarded += 1;
                        }
                    }
                    () = &mut shutdown => {
                        info!("Interrupted while waiting for queue capacity, shutting down");
                        break;
                    }
                },
                Ok(None) => {
                    debug!("Reached end of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read from stdin: {e}");
                    break;
                }
            },
            () = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    forwarded
}

/// Hands one input line to the sink. Returns whether it was enqueued.
async fn forward_line(handle: &SinkHandle, line: &str) -> bool {
    let Some(record) = parse_line(line) else {
        return false;
    };
    match handle.send(record).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not forward record: {e}");
            false
        }
    }
}

fn parse_line(line: &str) -> Option<Record> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Record>(trimmed) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping line that is not a JSON object: {e}");
            None
        }
    }
}
