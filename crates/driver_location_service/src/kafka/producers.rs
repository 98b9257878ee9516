/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::time::Duration;

use rdkafka::{
    error::{KafkaError, RDKafkaErrorCode},
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use tracing::{debug, warn};

use crate::{
    channel::{encode_location_update, ChannelError},
    common::types::LocationUpdate,
};

/// Publishes one update and waits for the broker acknowledgement.
///
/// Without a key the partitioner spreads records across partitions, so ordering is only
/// kept per partition. Passing the driver id as key pins a driver to one partition.
pub async fn push_location_update(
    producer: &FutureProducer,
    topic: &str,
    key: Option<&str>,
    update: &LocationUpdate,
    publish_timeout: Duration,
) -> Result<(), ChannelError> {
    let message = encode_location_update(update)?;

    let record = FutureRecord::<str, Vec<u8>>::to(topic).payload(&message);
    let record = match key {
        Some(key) => record.key(key),
        None => record,
    };

    match producer
        .send(record, Timeout::After(publish_timeout))
        .await
    {
        Ok((partition, offset)) => {
            debug!(tag = "[Kafka Publish]", topic = %topic, partition = partition, offset = offset);
            Ok(())
        }
        Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _)) => {
            warn!(tag = "[Kafka Publish]", topic = %topic, "Producer queue is full");
            Err(ChannelError::Saturated)
        }
        Err((err, _)) => {
            warn!(tag = "[Kafka Publish]", topic = %topic, error = %err);
            Err(ChannelError::Unavailable(err.to_string()))
        }
    }
}
