// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded ingestion queue between producers and the flush scheduler.
//!
//! Any number of [`SinkHandle`] clones feed one bounded `mpsc` channel whose
//! single receiver belongs to the scheduler. What happens at capacity is
//! decided by the configured [`OverflowPolicy`].

use crate::config::OverflowPolicy;
use crate::errors::SinkError;
use crate::record::Record;
use crate::stats::SinkStats;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(crate) fn channel(capacity: usize) -> (mpsc::Sender<Record>, mpsc::Receiver<Record>) {
    mpsc::channel(capacity)
}

/// Producer-side handle to a sink.
///
/// Cheap to clone; every clone feeds the same queue.
#[derive(Clone, Debug)]
pub struct SinkHandle {
    tx: mpsc::Sender<Record>,
    policy: OverflowPolicy,
    cancel: CancellationToken,
    stats: Arc<SinkStats>,
}

impl SinkHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<Record>,
        policy: OverflowPolicy,
        cancel: CancellationToken,
        stats: Arc<SinkStats>,
    ) -> Self {
        Self {
            tx,
            policy,
            cancel,
            stats,
        }
    }

    /// Enqueues one record.
    ///
    /// With [`OverflowPolicy::Drop`] this never waits and always returns
    /// `Ok(())`; a full queue or a closed sink only shows up in the drop
    /// counter. With [`OverflowPolicy::Block`] it waits for room and returns
    /// [`SinkError::Closed`] once the sink is shutting down.
    pub async fn send(&self, record: Record) -> Result<(), SinkError> {
        if self.cancel.is_cancelled() {
            return self.reject_closed();
        }

        match self.policy {
            OverflowPolicy::Drop => self.try_enqueue(record),
            OverflowPolicy::Block => {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => self.reject_closed(),
                    result = self.tx.send(record) => match result {
                        Ok(()) => {
                            self.stats.record_accepted();
                            Ok(())
                        }
                        Err(_) => self.reject_closed(),
                    },
                }
            }
        }
    }

    /// Same as [`SinkHandle::send`] for producers running on plain threads.
    ///
    /// Under the block policy this parks the calling thread, so it must not be
    /// called from within an async execution context.
    pub fn blocking_send(&self, record: Record) -> Result<(), SinkError> {
        if self.cancel.is_cancelled() {
            return self.reject_closed();
        }

        match self.policy {
            OverflowPolicy::Drop => self.try_enqueue(record),
            OverflowPolicy::Block => match self.tx.blocking_send(record) {
                Ok(()) => {
                    self.stats.record_accepted();
                    Ok(())
                }
                Err(_) => self.reject_closed(),
            },
        }
    }

    /// Whether the sink has started shutting down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    fn try_enqueue(&self, record: Record) -> Result<(), SinkError> {
        match self.tx.try_send(record) {
            Ok(()) => self.stats.record_accepted(),
            Err(TrySendError::Full(_)) => {
                self.stats.record_dropped();
                warn!("SINK | Could not enqueue record, queue full");
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.record_dropped();
                debug!("SINK | Dropping record, sink is closed");
            }
        }
        Ok(())
    }

    fn reject_closed(&self) -> Result<(), SinkError> {
        match self.policy {
            OverflowPolicy::Drop => {
                self.stats.record_dropped();
                debug!("SINK | Dropping record, sink is closed");
                Ok(())
            }
            OverflowPolicy::Block => Err(SinkError::Closed),
        }
    }
}
