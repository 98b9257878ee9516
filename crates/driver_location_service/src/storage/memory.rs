/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use super::{sort_nearest_first, LocationStorage, StorageError};
use crate::common::{types::*, utils::distance_between_in_meters};

#[derive(Debug, Clone)]
struct IndexedPosition {
    location: Point,
    timestamp: Option<TimeStamp>,
    source: LocationId,
}

#[derive(Default)]
struct Inner {
    records: FxHashMap<LocationId, LocationUpdate>,
    positions: FxHashMap<DriverId, IndexedPosition>,
}

impl Inner {
    fn refresh_position(&mut self, id: &LocationId, update: &LocationUpdate) {
        let should_move = self.positions.get(&update.driver_id).map_or(true, |current| {
            current.source == *id || current.timestamp <= update.timestamp
        });
        if should_move {
            self.positions.insert(
                update.driver_id.to_owned(),
                IndexedPosition {
                    location: update.point(),
                    timestamp: update.timestamp,
                    source: id.to_owned(),
                },
            );
        }
    }

    fn release_position(&mut self, id: &LocationId, driver_id: &DriverId) {
        if self
            .positions
            .get(driver_id)
            .is_some_and(|current| current.source == *id)
        {
            self.positions.remove(driver_id);
        }
    }
}

/// Process-local storage with a linear haversine scan for proximity queries.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: RwLock<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LocationStorage for InMemoryStorage {
    async fn insert(&self, mut update: LocationUpdate) -> Result<LocationId, StorageError> {
        let id = update.id.get_or_insert_with(LocationId::generate).to_owned();

        let mut inner = self.inner.write().await;
        if inner.records.contains_key(&id) {
            return Err(StorageError::Conflict(id));
        }
        inner.refresh_position(&id, &update);
        inner.records.insert(id.to_owned(), update);

        Ok(id)
    }

    async fn get_by_id(&self, id: &LocationId) -> Result<LocationUpdate, StorageError> {
        self.inner
            .read()
            .await
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_owned()))
    }

    async fn replace(&self, id: &LocationId, mut update: LocationUpdate) -> Result<(), StorageError> {
        update.id = Some(id.to_owned());

        let mut inner = self.inner.write().await;
        let previous_driver = match inner.records.get(id) {
            Some(previous) => previous.driver_id.to_owned(),
            None => return Err(StorageError::NotFound(id.to_owned())),
        };
        if previous_driver != update.driver_id {
            inner.release_position(id, &previous_driver);
        }
        inner.refresh_position(id, &update);
        inner.records.insert(id.to_owned(), update);

        Ok(())
    }

    async fn find_near(
        &self,
        point: Point,
        Radius(radius): Radius,
    ) -> Result<Vec<DriverPosition>, StorageError> {
        let inner = self.inner.read().await;

        let mut nearby: Vec<DriverPosition> = inner
            .positions
            .iter()
            .filter_map(|(driver_id, position)| {
                let distance = distance_between_in_meters(&point, &position.location);
                (distance <= radius).then(|| DriverPosition {
                    driver_id: driver_id.to_owned(),
                    location: position.location,
                    distance: Meters(distance),
                })
            })
            .collect();

        sort_nearest_first(&mut nearby);

        Ok(nearby)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
