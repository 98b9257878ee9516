/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
pub mod commands;
pub mod keys;

use async_trait::async_trait;
use fred::{
    clients::RedisPool,
    interfaces::ClientLike,
    types::{Builder, ReconnectPolicy, RedisConfig},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use self::{commands::*, keys::*};
use crate::{
    common::{
        types::*,
        utils::{distance_between_in_meters, EARTH_RADIUS, MAX_SEARCH_RADIUS},
    },
    storage::{sort_nearest_first, LocationStorage, StorageError},
};

/// Latitude limit of the projection behind Redis geo sets.
pub const MAX_GEO_LATITUDE: f64 = 85.051_128_78;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisSettings {
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_pool_size: usize,
    pub redis_partition: usize,
    /// Namespace of every key written by the service.
    pub key_prefix: String,
    pub reconnect_max_attempts: u32,
    /// Reconnect delay in milliseconds
    pub reconnect_delay: u32,
}

impl Default for RedisSettings {
    fn default() -> Self {
        RedisSettings {
            redis_host: String::from("127.0.0.1"),
            redis_port: 6379,
            redis_pool_size: 10,
            redis_partition: 0,
            key_prefix: String::from("dls"),
            reconnect_max_attempts: 10,
            reconnect_delay: 5000,
        }
    }
}

/// Exact position kept next to the geo set, whose coordinates are quantised by the geohash.
#[derive(Debug, Deserialize, Serialize, Clone)]
struct StoredPosition {
    location: Point,
    timestamp: Option<TimeStamp>,
    source: LocationId,
}

/// Where a point is indexed in the geo set. Latitudes beyond the projection limit are clamped.
pub fn geo_index_point(point: &Point) -> Point {
    Point {
        lat: Latitude(point.lat.0.clamp(-MAX_GEO_LATITUDE, MAX_GEO_LATITUDE)),
        lon: point.lon,
    }
}

/// GEOSEARCH radius that keeps every driver within `radius` meters of `point` a candidate.
pub fn geo_search_radius(point: &Point, Radius(radius): Radius) -> Radius {
    let radius = radius.min(MAX_SEARCH_RADIUS);
    let reach_degrees = (radius / EARTH_RADIUS).to_degrees();

    let mut search = radius;
    if point.lat.0.abs() + reach_degrees > MAX_GEO_LATITUDE {
        // Both the centre and the members may be clamped, each moving by at most the polar band.
        let polar_band = (90.0 - MAX_GEO_LATITUDE).to_radians() * EARTH_RADIUS;
        search += distance_between_in_meters(point, &geo_index_point(point)) + polar_band;
    }

    // Redis measures with a slightly larger earth radius.
    Radius(search * 1.001 + 1.0)
}

/// Redis backed storage.
///
/// Records are JSON documents under `{prefix}:loc:{id}`. Each driver's current position lives
/// in the `{prefix}:drivers:geo` set for GEOSEARCH and in `{prefix}:pos:{driver_id}` at full
/// precision, together with the id of the record that supplied it.
pub struct RedisStorage {
    pool: RedisPool,
    key_prefix: String,
}

impl RedisStorage {
    pub async fn new(settings: &RedisSettings) -> Result<Self, StorageError> {
        let redis_connection_url = format!(
            "redis://{}:{}/{}",
            settings.redis_host, settings.redis_port, settings.redis_partition
        );
        let config = RedisConfig::from_url(&redis_connection_url)
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;

        let pool = Builder::from_config(config)
            .set_policy(ReconnectPolicy::new_constant(
                settings.reconnect_max_attempts,
                settings.reconnect_delay,
            ))
            .build_pool(settings.redis_pool_size)
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;

        pool.init()
            .await
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;

        info!(tag = "[Redis]", url = %redis_connection_url, key_prefix = %settings.key_prefix, "Connected");

        Ok(Self {
            pool,
            key_prefix: settings.key_prefix.to_owned(),
        })
    }

    fn encode<T: Serialize>(value: &T) -> Result<String, StorageError> {
        serde_json::to_string(value).map_err(|err| StorageError::Corrupted(err.to_string()))
    }

    async fn stored_position(
        &self,
        driver_id: &DriverId,
    ) -> Result<Option<StoredPosition>, StorageError> {
        Ok(get_key(&self.pool, &driver_position_key(&self.key_prefix, driver_id))
            .await?
            .and_then(|raw| serde_json::from_str::<StoredPosition>(&raw).ok()))
    }

    /// Moves the driver to `update` unless the indexed position is newer and came from another record.
    async fn refresh_position(
        &self,
        id: &LocationId,
        update: &LocationUpdate,
    ) -> Result<(), StorageError> {
        let current = self.stored_position(&update.driver_id).await?;

        if current.map_or(true, |current| {
            current.source == *id || current.timestamp <= update.timestamp
        }) {
            let position = StoredPosition {
                location: update.point(),
                timestamp: update.timestamp,
                source: id.to_owned(),
            };
            set_key(
                &self.pool,
                &driver_position_key(&self.key_prefix, &update.driver_id),
                Self::encode(&position)?,
            )
            .await?;
            add_driver_position(
                &self.pool,
                &driver_positions_geo_key(&self.key_prefix),
                &update.driver_id,
                &geo_index_point(&position.location),
            )
            .await?;
        }

        Ok(())
    }

    /// Drops the driver's position when it was supplied by record `id`.
    async fn release_position(
        &self,
        id: &LocationId,
        driver_id: &DriverId,
    ) -> Result<(), StorageError> {
        if let Some(current) = self.stored_position(driver_id).await? {
            if current.source == *id {
                remove_driver_position(
                    &self.pool,
                    &driver_positions_geo_key(&self.key_prefix),
                    driver_id,
                )
                .await?;
                delete_key(&self.pool, &driver_position_key(&self.key_prefix, driver_id)).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LocationStorage for RedisStorage {
    async fn insert(&self, mut update: LocationUpdate) -> Result<LocationId, StorageError> {
        let id = update.id.get_or_insert_with(LocationId::generate).to_owned();
        let record_key = location_record_key(&self.key_prefix, &id);

        if !set_if_absent(&self.pool, &record_key, Self::encode(&update)?).await? {
            // A redelivered record finishes indexing what an earlier attempt may have missed.
            if self.get_by_id(&id).await.ok().as_ref() == Some(&update) {
                self.refresh_position(&id, &update).await?;
            }
            return Err(StorageError::Conflict(id));
        }

        if let Err(err) = self.refresh_position(&id, &update).await {
            if let Err(rollback_err) = delete_key(&self.pool, &record_key).await {
                warn!(tag = "[Redis]", location_id = %id, error = %rollback_err, "Failed to roll back record");
            }
            return Err(err);
        }

        Ok(id)
    }

    async fn get_by_id(&self, id: &LocationId) -> Result<LocationUpdate, StorageError> {
        let raw = get_key(&self.pool, &location_record_key(&self.key_prefix, id))
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_owned()))?;

        serde_json::from_str(&raw).map_err(|err| StorageError::Corrupted(err.to_string()))
    }

    async fn replace(&self, id: &LocationId, mut update: LocationUpdate) -> Result<(), StorageError> {
        update.id = Some(id.to_owned());

        let previous = match self.get_by_id(id).await {
            Ok(previous) => Some(previous),
            Err(StorageError::Corrupted(_)) => None,
            Err(err) => return Err(err),
        };

        if !set_if_present(
            &self.pool,
            &location_record_key(&self.key_prefix, id),
            Self::encode(&update)?,
        )
        .await?
        {
            return Err(StorageError::NotFound(id.to_owned()));
        }

        if let Some(previous) = previous.filter(|previous| previous.driver_id != update.driver_id) {
            self.release_position(id, &previous.driver_id).await?;
        }
        self.refresh_position(id, &update).await
    }

    async fn find_near(
        &self,
        point: Point,
        radius: Radius,
    ) -> Result<Vec<DriverPosition>, StorageError> {
        let candidates = search_drivers_within_radius(
            &self.pool,
            &driver_positions_geo_key(&self.key_prefix),
            &geo_index_point(&point),
            geo_search_radius(&point, radius),
        )
        .await?;

        let driver_ids: Vec<DriverId> = candidates
            .into_iter()
            .filter_map(|candidate| candidate.member.as_string().map(DriverId))
            .collect();

        let positions = get_keys(
            &self.pool,
            driver_ids
                .iter()
                .map(|driver_id| driver_position_key(&self.key_prefix, driver_id))
                .collect(),
        )
        .await?;

        let Radius(radius) = radius;
        let mut nearby: Vec<DriverPosition> = driver_ids
            .into_iter()
            .zip(positions)
            .filter_map(|(driver_id, raw)| {
                let position = match raw.map(|raw| serde_json::from_str::<StoredPosition>(&raw)) {
                    Some(Ok(position)) => position,
                    Some(Err(err)) => {
                        warn!(tag = "[Redis]", driver_id = %driver_id, error = %err, "Unreadable driver position");
                        return None;
                    }
                    None => return None,
                };
                let distance = distance_between_in_meters(&point, &position.location);
                (distance <= radius).then(|| DriverPosition {
                    driver_id,
                    location: position.location,
                    distance: Meters(distance),
                })
            })
            .collect();

        sort_nearest_first(&mut nearby);

        Ok(nearby)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let key = health_check_key(&self.key_prefix);
        set_key(&self.pool, &key, "driver-location-service-health-check".to_string()).await?;
        get_key(&self.pool, &key)
            .await?
            .map(|_| ())
            .ok_or_else(|| StorageError::Unavailable("health check key missing".to_string()))
    }
}
