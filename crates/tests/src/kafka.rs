/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use driver_location_service::{
    channel::{ChannelError, MessageChannel},
    common::types::*,
    kafka::KafkaChannel,
};
use rdkafka::{mocking::MockCluster, producer::DefaultProducerContext};

use crate::support::*;

const TOPIC: &str = "location-updates";

fn mock_cluster() -> MockCluster<'static, DefaultProducerContext> {
    MockCluster::new(1).expect("failed to create mock brokers")
}

#[tokio::test]
async fn publish_is_acknowledged_by_the_broker() {
    let cluster = mock_cluster();
    let channel = KafkaChannel::new(
        &cluster.bootstrap_servers(),
        TOPIC,
        Duration::from_secs(5),
        false,
    )
    .unwrap();

    channel
        .publish(&update_at("driver-1", sf(), Some(ts(0))))
        .await
        .unwrap();
}

#[tokio::test]
async fn keyed_publish_round_trips_through_a_subscription() {
    let cluster = mock_cluster();
    cluster.create_topic(TOPIC, 3, 1).unwrap();
    let channel = KafkaChannel::new(
        &cluster.bootstrap_servers(),
        TOPIC,
        Duration::from_secs(5),
        true,
    )
    .unwrap();

    let mut update = update_at("driver-1", sf(), Some(ts(0)));
    update.id = Some(LocationId("loc-1".to_string()));
    channel.publish(&update).await.unwrap();

    let mut subscription = channel.subscribe().await.unwrap();
    let delivery = tokio::time::timeout(Duration::from_secs(30), subscription.next_delivery())
        .await
        .expect("no record delivered")
        .unwrap();

    assert_eq!(
        serde_json::from_slice::<LocationUpdate>(&delivery.payload).unwrap(),
        update
    );
    subscription.acknowledge(&delivery).await.unwrap();
    subscription.close().await.unwrap();
    assert_eq!(
        subscription.next_delivery().await.unwrap_err(),
        ChannelError::Closed
    );
}

#[tokio::test]
async fn unreachable_broker_surfaces_as_unavailable() {
    let channel = KafkaChannel::new("127.0.0.1:1", TOPIC, Duration::from_millis(500), false).unwrap();

    let err = channel
        .publish(&update_at("driver-1", sf(), Some(ts(0))))
        .await
        .unwrap_err();

    assert!(matches!(err, ChannelError::Unavailable(_)), "{err:?}");
}

#[tokio::test]
async fn resubscribing_resumes_after_the_last_acknowledged_record() {
    let cluster = mock_cluster();
    cluster.create_topic(TOPIC, 1, 1).unwrap();
    let channel = KafkaChannel::new(
        &cluster.bootstrap_servers(),
        TOPIC,
        Duration::from_secs(5),
        false,
    )
    .unwrap();

    for driver in ["driver-0", "driver-1", "driver-2"] {
        channel
            .publish(&update_at(driver, sf(), Some(ts(0))))
            .await
            .unwrap();
    }

    let mut subscription = channel.subscribe().await.unwrap();
    let first = tokio::time::timeout(Duration::from_secs(30), subscription.next_delivery())
        .await
        .expect("no record delivered")
        .unwrap();
    assert_eq!(first.offset, 0);
    subscription.acknowledge(&first).await.unwrap();
    subscription.close().await.unwrap();

    let mut subscription = channel.subscribe().await.unwrap();
    let next = tokio::time::timeout(Duration::from_secs(30), subscription.next_delivery())
        .await
        .expect("no record delivered after resubscribing")
        .unwrap();

    assert_eq!(next.offset, 1);
    assert_eq!(
        serde_json::from_slice::<LocationUpdate>(&next.payload)
            .unwrap()
            .driver_id,
        DriverId("driver-1".to_string())
    );
    subscription.close().await.unwrap();
}

#[tokio::test]
async fn closing_against_an_unreachable_broker_stays_within_the_drain_timeout() {
    let channel = KafkaChannel::new("127.0.0.1:1", TOPIC, Duration::from_millis(500), false).unwrap();
    let mut subscription = channel.subscribe().await.unwrap();

    let started = tokio::time::Instant::now();
    let _ = tokio::time::timeout(Duration::from_secs(1), subscription.close()).await;

    assert!(started.elapsed() < Duration::from_secs(3));
}
