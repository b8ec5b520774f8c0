// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching sink that forwards structured records to a remote HTTP collector
//! as newline-delimited JSON.
//!
//! ```text
//!   producers ──send──▶ ingestion queue ──▶ flush scheduler ──▶ transport ──▶ collector
//!   (handles)           (bounded mpsc)      (single worker)     (NDJSON POST)
//! ```
//!
//! Producers never wait on the network: delivery failures are logged, counted
//! and dropped by the worker, and only enqueue failures can ever reach a caller.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod errors;
pub mod http;
pub mod queue;
pub mod record;
pub mod scheduler;
pub mod sink;
pub mod stats;
pub mod transport;

pub use config::{OverflowPolicy, SinkConfig};
pub use errors::{DeliveryError, SinkError};
pub use queue::SinkHandle;
pub use record::{Batch, Record};
pub use sink::Sink;
pub use stats::StatsSnapshot;
