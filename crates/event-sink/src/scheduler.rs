// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The single worker that owns the batch in progress and decides when to ship
//! it.
//!
//! The worker waits on three things at once: the next record, the flush timer
//! and the shutdown token. Since it is the only task touching the batch and it
//! awaits every delivery before looking at the queue again, flushes never
//! overlap and records leave in the order they arrived.

use crate::record::{Batch, Record};
use crate::stats::SinkStats;
use crate::transport::Transport;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Immediate flush of a freshly dequeued record.
    Record,
    /// The batch reached `max_batch_records`.
    Size,
    Timer,
    Shutdown,
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record => write!(f, "record"),
            Self::Size => write!(f, "size"),
            Self::Timer => write!(f, "timer"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

pub struct FlushScheduler {
    rx: mpsc::Receiver<Record>,
    transport: Transport,
    cancel: CancellationToken,
    stats: Arc<SinkStats>,
    flush_interval: Duration,
    flush_on_every_record: bool,
    max_batch_records: usize,
    buffer: Vec<Record>,
}

impl FlushScheduler {
    pub(crate) fn new(
        rx: mpsc::Receiver<Record>,
        transport: Transport,
        cancel: CancellationToken,
        stats: Arc<SinkStats>,
        flush_interval: Duration,
        flush_on_every_record: bool,
        max_batch_records: usize,
    ) -> Self {
        Self {
            rx,
            transport,
            cancel,
            stats,
            flush_interval,
            flush_on_every_record,
            max_batch_records: max_batch_records.max(1),
            buffer: Vec::new(),
        }
    }

    /// Runs until the token is cancelled or every producer is gone, then
    /// drains the queue and flushes what is left.
    pub async fn run(mut self) {
        debug!("SINK | Flush scheduler started");

        let mut flush_interval = interval(self.flush_interval);
        flush_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        flush_interval.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!("SINK | Flush scheduler shutting down");
                    break;
                }
                maybe_record = self.rx.recv() => {
                    let Some(record) = maybe_record else {
                        debug!("SINK | All producers gone, flush scheduler shutting down");
                        break;
                    };
                    self.buffer.push(record);
                    if let Some(reason) = self.flush_reason() {
                        self.flush(reason).await;
                        flush_interval.reset();
                    }
                }
                _ = flush_interval.tick() => {
                    self.flush(FlushReason::Timer).await;
                }
            }
        }

        self.drain().await;
        debug!("SINK | Flush scheduler stopped");
    }

    /// Closes the queue to new records and ships everything already in it.
    async fn drain(&mut self) {
        self.rx.close();
        while let Some(record) = self.rx.recv().await {
            self.buffer.push(record);
            if self.flush_reason().is_some() {
                self.flush(FlushReason::Shutdown).await;
            }
        }
        self.flush(FlushReason::Shutdown).await;
    }

    fn flush_reason(&self) -> Option<FlushReason> {
        if self.flush_on_every_record {
            Some(FlushReason::Record)
        } else if self.buffer.len() >= self.max_batch_records {
            Some(FlushReason::Size)
        } else {
            None
        }
    }

    async fn flush(&mut self, reason: FlushReason) {
        let Some(batch) = Batch::new(std::mem::take(&mut self.buffer)) else {
            return;
        };
        let n_records = batch.len();
        debug!("SINK | Flushing {n_records} records ({reason})");

        match self.transport.send(batch).await {
            Ok(()) => self.stats.batch_sent(n_records),
            Err(e) => {
                self.stats.batch_failed(n_records);
                error!("SINK | Could not deliver batch of {n_records} records to collector: {e}");
            }
        }
    }
}
