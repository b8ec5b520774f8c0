// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced to callers of the sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink is shutting down or has shut down.
    #[error("Sink is closed")]
    Closed,

    #[error("Sink already started")]
    AlreadyStarted,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// A flush attempt that did not reach the collector with a 200.
///
/// These never leave the worker: they are logged, counted and the batch is
/// dropped.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("collector responded with status {0}")]
    Status(reqwest::StatusCode),
}
