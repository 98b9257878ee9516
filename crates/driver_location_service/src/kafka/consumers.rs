/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use async_trait::async_trait;
use rdkafka::{
    consumer::{CommitMode, Consumer, StreamConsumer},
    ClientConfig, Message,
};
use tracing::warn;

use crate::channel::{ChannelError, Delivery, Subscription};

/// Consumer-group member over a single topic.
///
/// Offsets are stored only when a record is acknowledged and committed by the background
/// auto-commit, so a record read but not yet handled is redelivered after a restart.
pub struct KafkaSubscription {
    consumer: Option<StreamConsumer>,
    topic: String,
}

impl KafkaSubscription {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, ChannelError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "10000")
            .create()
            .map_err(|err| ChannelError::Transport(err.to_string()))?;

        consumer
            .subscribe(&[topic])
            .map_err(|err| ChannelError::Transport(err.to_string()))?;

        Ok(Self {
            consumer: Some(consumer),
            topic: topic.to_string(),
        })
    }

    fn consumer(&self) -> Result<&StreamConsumer, ChannelError> {
        self.consumer.as_ref().ok_or(ChannelError::Closed)
    }
}

#[async_trait]
impl Subscription for KafkaSubscription {
    async fn next_delivery(&mut self) -> Result<Delivery, ChannelError> {
        let message = self
            .consumer()?
            .recv()
            .await
            .map_err(|err| ChannelError::Transport(err.to_string()))?;

        Ok(Delivery {
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            partition: message.partition(),
            offset: message.offset(),
        })
    }

    async fn acknowledge(&mut self, delivery: &Delivery) -> Result<(), ChannelError> {
        // librdkafka stores `offset + 1`, the position of the next record to read.
        self.consumer()?
            .store_offset(&self.topic, delivery.partition, delivery.offset)
            .map_err(|err| ChannelError::Transport(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        let Some(consumer) = self.consumer.take() else {
            return Ok(());
        };
        // The final commit and the consumer drop block on the broker, keep them off the runtime.
        tokio::task::spawn_blocking(move || {
            // Nothing stored since the last auto-commit is reported as an error, not worth failing on.
            if let Err(err) = consumer.commit_consumer_state(CommitMode::Sync) {
                warn!(tag = "[Kafka Consumer]", error = %err, "Final offset commit skipped");
            }
            consumer.unsubscribe();
        })
        .await
        .map_err(|err| ChannelError::Transport(err.to_string()))
    }
}
