// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle of a sink: build, start the worker, hand out producer handles,
//! stop and drain.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use event_sink::{Sink, SinkConfig};
//!
//! let mut sink = Sink::new(SinkConfig::new("http://localhost:9200/submit"))?;
//! sink.start()?;
//!
//! let handle = sink.handle();
//! tokio::spawn(async move {
//!     handle.send(record).await.ok();
//! });
//!
//! // Returns once every accepted record has been flushed or attempted
//! sink.stop().await;
//! ```

use crate::config::SinkConfig;
use crate::errors::SinkError;
use crate::queue::{self, SinkHandle};
use crate::record::Record;
use crate::scheduler::FlushScheduler;
use crate::stats::{SinkStats, StatsSnapshot};
use crate::transport::Transport;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct Sink {
    config: SinkConfig,
    handle: SinkHandle,
    cancel: CancellationToken,
    stats: Arc<SinkStats>,
    scheduler: Option<FlushScheduler>,
    worker: Option<JoinHandle<()>>,
}

impl Sink {
    /// Validates `config` and builds the queue and transport. No task is
    /// spawned until [`Sink::start`].
    pub fn new(config: SinkConfig) -> Result<Self, SinkError> {
        config.validate()?;

        let transport = Transport::new(&config)?;
        let (tx, rx) = queue::channel(config.queue_capacity);
        let cancel = CancellationToken::new();
        let stats = Arc::new(SinkStats::default());

        let handle = SinkHandle::new(
            tx,
            config.overflow_policy,
            cancel.clone(),
            Arc::clone(&stats),
        );
        let scheduler = FlushScheduler::new(
            rx,
            transport,
            cancel.clone(),
            Arc::clone(&stats),
            config.flush_interval,
            config.flush_on_every_record,
            config.max_batch_records,
        );

        Ok(Self {
            config,
            handle,
            cancel,
            stats,
            scheduler: Some(scheduler),
            worker: None,
        })
    }

    /// Spawns the flush scheduler. Must be called within a tokio runtime.
    pub fn start(&mut self) -> Result<(), SinkError> {
        let Some(scheduler) = self.scheduler.take() else {
            return Err(SinkError::AlreadyStarted);
        };

        self.worker = Some(tokio::spawn(scheduler.run()));
        info!(
            "SINK | Started, shipping to {} (overflow policy: {}, capacity: {})",
            self.config.collector_url, self.config.overflow_policy, self.config.queue_capacity
        );
        Ok(())
    }

    /// Stops accepting records and waits for the worker to flush everything
    /// already queued.
    ///
    /// Calling it again is a no-op. A sink that was never started is started
    /// here so that its queued records are still attempted.
    pub async fn stop(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            debug!("SINK | Stop called before start, draining queued records");
            self.worker = Some(tokio::spawn(scheduler.run()));
        }

        self.cancel.cancel();

        let Some(worker) = self.worker.take() else {
            return;
        };
        if let Err(e) = worker.await {
            error!("SINK | Flush scheduler task failed: {e}");
        }

        let stats = self.stats.snapshot();
        info!(
            "SINK | Stopped: {} records sent, {} failed, {} dropped",
            stats.records_sent, stats.records_failed, stats.dropped
        );
    }

    /// A producer handle sharing this sink's queue.
    #[must_use]
    pub fn handle(&self) -> SinkHandle {
        self.handle.clone()
    }

    /// Shorthand for `self.handle().send(record)`.
    pub async fn send(&self, record: Record) -> Result<(), SinkError> {
        self.handle.send(record).await
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
            && !self.cancel.is_cancelled()
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        // Lets a running worker drain in the background instead of waiting on
        // producers that may never go away.
        self.cancel.cancel();
    }
}
