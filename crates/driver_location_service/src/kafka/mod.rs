/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
pub mod consumers;
pub mod producers;

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{producer::FutureProducer, ClientConfig};

use self::{consumers::KafkaSubscription, producers::push_location_update};
use crate::{
    channel::{ChannelError, MessageChannel, Subscription},
    common::types::LocationUpdate,
};

/// Shared by every instance so horizontally scaled processes split the topic between them.
pub const LOCATION_CONSUMER_GROUP: &str = "location-consumer-group";

pub struct KafkaChannel {
    producer: FutureProducer,
    brokers: String,
    topic: String,
    publish_timeout: Duration,
    partition_by_driver: bool,
}

impl KafkaChannel {
    pub fn new(
        brokers: &str,
        topic: &str,
        publish_timeout: Duration,
        partition_by_driver: bool,
    ) -> Result<Self, ChannelError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("compression.type", "lz4")
            .set(
                "message.timeout.ms",
                publish_timeout.as_millis().to_string(),
            )
            .create()
            .map_err(|err| ChannelError::Unavailable(err.to_string()))?;

        Ok(Self {
            producer,
            brokers: brokers.to_string(),
            topic: topic.to_string(),
            publish_timeout,
            partition_by_driver,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl MessageChannel for KafkaChannel {
    async fn publish(&self, update: &LocationUpdate) -> Result<(), ChannelError> {
        let key = self
            .partition_by_driver
            .then_some(update.driver_id.0.as_str());
        push_location_update(
            &self.producer,
            &self.topic,
            key,
            update,
            self.publish_timeout,
        )
        .await
    }

    async fn subscribe(&self) -> Result<Box<dyn Subscription>, ChannelError> {
        let subscription =
            KafkaSubscription::new(&self.brokers, LOCATION_CONSUMER_GROUP, &self.topic)?;
        Ok(Box::new(subscription))
    }
}
