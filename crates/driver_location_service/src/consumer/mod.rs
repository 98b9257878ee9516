/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
pub mod processor;

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use strum_macros::Display;
use tokio::{
    sync::watch,
    time::{sleep, timeout, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use self::processor::{process_message, ProcessOutcome};
use crate::{
    channel::MessageChannel,
    storage::LocationStorage,
    termination,
    tools::{
        error::AppError,
        prometheus::{CONSUMED_LOCATION_UPDATES, TERMINATION},
    },
};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub received: u64,
    pub persisted: u64,
    pub failed: u64,
}

/// Counts across every run of one consumer.
#[derive(Debug, Default)]
struct Totals {
    received: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
}

/// Drains the message channel into storage.
///
/// One `run` owns one subscription. Per-record failures are logged and skipped. A failed
/// read from the channel ends the run with an error and the caller decides whether to
/// start another one.
pub struct LocationConsumer {
    channel: Arc<dyn MessageChannel>,
    storage: Arc<dyn LocationStorage>,
    drain_timeout: Duration,
    state: watch::Sender<ConsumerState>,
    totals: Totals,
}

impl LocationConsumer {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        storage: Arc<dyn LocationStorage>,
        drain_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConsumerState::Idle);
        Self {
            channel,
            storage,
            drain_timeout,
            state,
            totals: Totals::default(),
        }
    }

    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Records handled since the consumer was created, over all runs.
    pub fn totals(&self) -> ConsumerSummary {
        ConsumerSummary {
            received: self.totals.received.load(Ordering::Relaxed),
            persisted: self.totals.persisted.load(Ordering::Relaxed),
            failed: self.totals.failed.load(Ordering::Relaxed),
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    fn transition(&self, next: ConsumerState) {
        let previous = self.state.send_replace(next);
        info!(tag = "[Consumer]", from = %previous, to = %next, "State changed");
    }

    pub async fn run(&self, shutdown: &CancellationToken) -> Result<ConsumerSummary, AppError> {
        let start_time = Instant::now();

        let mut subscription = match self.channel.subscribe().await {
            Ok(subscription) => subscription,
            Err(err) => {
                error!(tag = "[Consumer]", error = %err, "Failed to subscribe");
                self.transition(ConsumerState::Stopped);
                termination!("consumer_subscribe_failed", start_time);
                return Err(AppError::ConsumerTransportFailed(err.to_string()));
            }
        };

        self.transition(ConsumerState::Running);

        let mut summary = ConsumerSummary::default();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let delivery = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                delivery = subscription.next_delivery() => delivery,
            };

            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(err) => {
                    error!(tag = "[Consumer]", error = %err, "Channel read failed");
                    if let Err(err) = subscription.close().await {
                        warn!(tag = "[Consumer]", error = %err, "Failed to release subscription");
                    }
                    self.transition(ConsumerState::Stopped);
                    termination!("consumer_transport_failed", start_time);
                    return Err(AppError::ConsumerTransportFailed(err.to_string()));
                }
            };

            summary.received += 1;
            self.totals.received.fetch_add(1, Ordering::Relaxed);

            let outcome = process_message(&delivery.payload, self.storage.as_ref()).await;
            let outcome_label: &str = outcome.as_ref();
            CONSUMED_LOCATION_UPDATES
                .with_label_values(&[outcome_label])
                .inc();

            match &outcome {
                ProcessOutcome::Persisted(id) => {
                    summary.persisted += 1;
                    self.totals.persisted.fetch_add(1, Ordering::Relaxed);
                    info!(tag = "[Location Persisted]", location_id = %id, partition = delivery.partition, offset = delivery.offset);
                }
                ProcessOutcome::Malformed(reason)
                | ProcessOutcome::StorageUnavailable(reason)
                | ProcessOutcome::WriteRejected(reason) => {
                    summary.failed += 1;
                    self.totals.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(tag = "[Consumer]", outcome = outcome_label, reason = %reason, partition = delivery.partition, offset = delivery.offset, "Skipping record");
                }
            }

            if let Err(err) = subscription.acknowledge(&delivery).await {
                warn!(tag = "[Consumer]", error = %err, offset = delivery.offset, "Failed to acknowledge record");
            }
        }

        self.transition(ConsumerState::Draining);

        match timeout(self.drain_timeout, subscription.close()).await {
            Ok(Ok(())) => (),
            Ok(Err(err)) => {
                warn!(tag = "[Consumer]", error = %err, "Failed to release subscription")
            }
            Err(_) => warn!(
                tag = "[Consumer]",
                drain_timeout_ms = self.drain_timeout.as_millis() as u64,
                "Subscription release timed out"
            ),
        }

        self.transition(ConsumerState::Stopped);
        termination!("consumer_shutdown", start_time);

        info!(
            tag = "[Consumer]",
            received = summary.received,
            persisted = summary.persisted,
            failed = summary.failed,
            "Consumer stopped"
        );

        Ok(summary)
    }
}

/// Keeps a consumer running until `shutdown` fires, restarting it after fatal channel errors.
/// Returns the counts of every run.
pub async fn supervise_consumer(
    consumer: Arc<LocationConsumer>,
    shutdown: CancellationToken,
    restart_delay: Duration,
) -> ConsumerSummary {
    let mut restarts: u64 = 0;
    loop {
        match consumer.run(&shutdown).await {
            Ok(_) => return consumer.totals(),
            Err(err) => {
                restarts += 1;
                error!(tag = "[Consumer Supervisor]", error = %err, restarts = restarts, "Consumer terminated, restarting");
                tokio::select! {
                    _ = shutdown.cancelled() => return consumer.totals(),
                    _ = sleep(restart_delay) => (),
                }
            }
        }
    }
}
