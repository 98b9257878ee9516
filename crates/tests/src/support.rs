/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    collections::VecDeque,
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use driver_location_service::{
    channel::{encode_location_update, ChannelError, Delivery, MessageChannel, Subscription},
    common::types::*,
    storage::{memory::InMemoryStorage, LocationStorage, StorageError},
};

pub const SF: (f64, f64) = (37.7749, -122.4194);

pub fn sf() -> Point {
    Point {
        lat: Latitude(SF.0),
        lon: Longitude(SF.1),
    }
}

/// Meters per degree of latitude for the 6371 km sphere.
const METERS_PER_DEGREE: f64 = 111_194.926_644_558_74;

pub fn offset_north(point: Point, meters: f64) -> Point {
    Point {
        lat: Latitude(point.lat.0 + meters / METERS_PER_DEGREE),
        lon: point.lon,
    }
}

pub fn ts(secs: i64) -> TimeStamp {
    TimeStamp(Utc.timestamp_opt(1_714_557_600 + secs, 0).unwrap())
}

pub fn update_at(driver_id: &str, point: Point, timestamp: Option<TimeStamp>) -> LocationUpdate {
    LocationUpdate {
        id: None,
        driver_id: DriverId(driver_id.to_string()),
        latitude: point.lat,
        longitude: point.lon,
        timestamp,
    }
}

pub fn delivery(payload: &[u8], offset: i64) -> Delivery {
    Delivery {
        payload: payload.to_vec(),
        partition: 0,
        offset,
    }
}

pub async fn eventually<F, Fut>(within: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition().await
}

/// Records every payload handed to `publish`.
#[derive(Default)]
pub struct PublishSpy {
    published: Mutex<Vec<Vec<u8>>>,
    fail_with: Option<ChannelError>,
}

impl PublishSpy {
    pub fn failing(err: ChannelError) -> Self {
        Self {
            published: Mutex::default(),
            fail_with: Some(err),
        }
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn published_updates(&self) -> Vec<LocationUpdate> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|payload| serde_json::from_slice(payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl MessageChannel for PublishSpy {
    async fn publish(&self, update: &LocationUpdate) -> Result<(), ChannelError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        self.published
            .lock()
            .unwrap()
            .push(encode_location_update(update)?);
        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn Subscription>, ChannelError> {
        Err(ChannelError::Unavailable("publish spy has no subscribers".to_string()))
    }
}

/// In-memory storage that keeps every insert attempt and can be told to fail them.
#[derive(Default)]
pub struct RecordingStorage {
    inner: InMemoryStorage,
    inserts: Mutex<Vec<LocationUpdate>>,
    fail_inserts_with: Mutex<Option<StorageError>>,
    searched_radii: Mutex<Vec<Radius>>,
}

impl RecordingStorage {
    pub fn failing(err: StorageError) -> Self {
        let storage = Self::default();
        *storage.fail_inserts_with.lock().unwrap() = Some(err);
        storage
    }

    pub fn inserts(&self) -> Vec<LocationUpdate> {
        self.inserts.lock().unwrap().clone()
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.lock().unwrap().len()
    }

    pub fn searched_radii(&self) -> Vec<Radius> {
        self.searched_radii.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocationStorage for RecordingStorage {
    async fn insert(&self, update: LocationUpdate) -> Result<LocationId, StorageError> {
        self.inserts.lock().unwrap().push(update.clone());
        let failure = self.fail_inserts_with.lock().unwrap().clone();
        match failure {
            Some(err) => Err(err),
            None => self.inner.insert(update).await,
        }
    }

    async fn get_by_id(&self, id: &LocationId) -> Result<LocationUpdate, StorageError> {
        self.inner.get_by_id(id).await
    }

    async fn replace(&self, id: &LocationId, update: LocationUpdate) -> Result<(), StorageError> {
        self.inner.replace(id, update).await
    }

    async fn find_near(
        &self,
        point: Point,
        radius: Radius,
    ) -> Result<Vec<DriverPosition>, StorageError> {
        self.searched_radii.lock().unwrap().push(radius);
        self.inner.find_near(point, radius).await
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        self.inner.health_check().await
    }
}

pub type Script = Vec<Result<Delivery, ChannelError>>;

/// Channel whose subscriptions replay a fixed script and then wait forever.
/// Each `subscribe` takes the next script, an empty one once they run out.
#[derive(Default)]
pub struct ScriptedChannel {
    scripts: Mutex<VecDeque<Script>>,
    pub subscribe_count: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
    pub acknowledged: Arc<Mutex<Vec<i64>>>,
}

impl ScriptedChannel {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        }
    }

    pub fn acknowledged(&self) -> Vec<i64> {
        self.acknowledged.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageChannel for ScriptedChannel {
    async fn publish(&self, _update: &LocationUpdate) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn Subscription>, ChannelError> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedSubscription {
            script: script.into(),
            closed: self.closed.clone(),
            acknowledged: self.acknowledged.clone(),
        }))
    }
}

pub struct ScriptedSubscription {
    script: VecDeque<Result<Delivery, ChannelError>>,
    closed: Arc<AtomicBool>,
    acknowledged: Arc<Mutex<Vec<i64>>>,
}

#[async_trait]
impl Subscription for ScriptedSubscription {
    async fn next_delivery(&mut self) -> Result<Delivery, ChannelError> {
        match self.script.pop_front() {
            Some(next) => next,
            None => futures::future::pending().await,
        }
    }

    async fn acknowledge(&mut self, delivery: &Delivery) -> Result<(), ChannelError> {
        self.acknowledged.lock().unwrap().push(delivery.offset);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
