/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use fred::{
    clients::RedisPool,
    error::RedisError,
    interfaces::{GeoInterface, KeysInterface, SortedSetsInterface},
    types::{GeoPosition, GeoRadiusInfo, GeoUnit, GeoValue, RedisValue, SetOptions, SortOrder},
};
use futures::future::try_join_all;
use tracing::instrument;

use crate::{
    common::types::{DriverId, Point, Radius},
    storage::StorageError,
};

fn unavailable(err: RedisError) -> StorageError {
    StorageError::Unavailable(err.to_string())
}

// SET NX, false when the key already exists
#[instrument(level = "DEBUG", skip(pool, value))]
pub async fn set_if_absent(pool: &RedisPool, key: &str, value: String) -> Result<bool, StorageError> {
    let reply: Option<String> = pool
        .set(key, value, None, Some(SetOptions::NX), false)
        .await
        .map_err(unavailable)?;
    Ok(reply.is_some())
}

// SET XX, false when the key does not exist
#[instrument(level = "DEBUG", skip(pool, value))]
pub async fn set_if_present(
    pool: &RedisPool,
    key: &str,
    value: String,
) -> Result<bool, StorageError> {
    let reply: Option<String> = pool
        .set(key, value, None, Some(SetOptions::XX), false)
        .await
        .map_err(unavailable)?;
    Ok(reply.is_some())
}

#[instrument(level = "DEBUG", skip(pool, value))]
pub async fn set_key(pool: &RedisPool, key: &str, value: String) -> Result<(), StorageError> {
    let _: RedisValue = pool
        .set(key, value, None, None, false)
        .await
        .map_err(unavailable)?;
    Ok(())
}

#[instrument(level = "DEBUG", skip(pool))]
pub async fn get_key(pool: &RedisPool, key: &str) -> Result<Option<String>, StorageError> {
    pool.get::<Option<String>, _>(key)
        .await
        .map_err(unavailable)
}

#[instrument(level = "DEBUG", skip(pool))]
pub async fn delete_key(pool: &RedisPool, key: &str) -> Result<(), StorageError> {
    let _: RedisValue = pool.del(key).await.map_err(unavailable)?;
    Ok(())
}

pub async fn get_keys(
    pool: &RedisPool,
    keys: Vec<String>,
) -> Result<Vec<Option<String>>, StorageError> {
    try_join_all(keys.iter().map(|key| get_key(pool, key))).await
}

// GEOADD
#[instrument(level = "DEBUG", skip(pool))]
pub async fn add_driver_position(
    pool: &RedisPool,
    key: &str,
    DriverId(driver_id): &DriverId,
    point: &Point,
) -> Result<(), StorageError> {
    let value = GeoValue {
        coordinates: GeoPosition {
            longitude: point.lon.0,
            latitude: point.lat.0,
        },
        member: driver_id.to_owned().into(),
    };
    let _: RedisValue = pool
        .geoadd(key, None, false, value)
        .await
        .map_err(unavailable)?;
    Ok(())
}

// ZREM, geo sets are sorted sets
#[instrument(level = "DEBUG", skip(pool))]
pub async fn remove_driver_position(
    pool: &RedisPool,
    key: &str,
    DriverId(driver_id): &DriverId,
) -> Result<(), StorageError> {
    let _: RedisValue = pool
        .zrem(key, driver_id.to_owned())
        .await
        .map_err(unavailable)?;
    Ok(())
}

// GEOSEARCH FROMLONLAT BYRADIUS ASC WITHCOORD WITHDIST
#[instrument(level = "DEBUG", skip(pool))]
pub async fn search_drivers_within_radius(
    pool: &RedisPool,
    key: &str,
    point: &Point,
    Radius(radius): Radius,
) -> Result<Vec<GeoRadiusInfo>, StorageError> {
    let reply: RedisValue = pool
        .geosearch(
            key,
            None,
            Some(GeoPosition::from((point.lon.0, point.lat.0))),
            Some((radius, GeoUnit::Meters)),
            None,
            Some(SortOrder::Asc),
            None,
            true,
            true,
            false,
        )
        .await
        .map_err(unavailable)?;

    reply
        .into_geo_radius_result(true, true, false)
        .map_err(unavailable)
}
