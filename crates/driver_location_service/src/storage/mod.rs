/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
pub mod memory;

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::{
    common::types::{DriverPosition, LocationId, LocationUpdate, Point, Radius},
    tools::error::ErrorKind,
};

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("location {0} not found")]
    NotFound(LocationId),
    #[error("location {0} already exists")]
    Conflict(LocationId),
    #[error("storage unavailable : {0}")]
    Unavailable(String),
    #[error("stored record is unreadable : {0}")]
    Corrupted(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::Conflict(_) => ErrorKind::Conflict,
            StorageError::Unavailable(_) => ErrorKind::Unavailable,
            StorageError::Corrupted(_) => ErrorKind::Fatal,
        }
    }
}

/// Persistence for location updates and the per-driver position read model.
///
/// Every write refreshes the driver's current position unless the indexed one carries a
/// newer timestamp and came from a different record. A replace that moves a record to another
/// driver drops the old driver's position if that record supplied it. Implementations are
/// shared between the consumer and the request handlers and must be safe for concurrent use.
#[async_trait]
pub trait LocationStorage: Send + Sync {
    /// Persists a new record, assigning an id when it has none.
    async fn insert(&self, update: LocationUpdate) -> Result<LocationId, StorageError>;

    async fn get_by_id(&self, id: &LocationId) -> Result<LocationUpdate, StorageError>;

    /// Full replace of an existing record. The stored id is always `id`.
    async fn replace(&self, id: &LocationId, update: LocationUpdate) -> Result<(), StorageError>;

    /// Current driver positions within `radius` meters of `point`, nearest first.
    async fn find_near(
        &self,
        point: Point,
        radius: Radius,
    ) -> Result<Vec<DriverPosition>, StorageError>;

    async fn health_check(&self) -> Result<(), StorageError>;
}

/// Ascending distance, ties broken by driver id.
pub fn sort_nearest_first(positions: &mut [DriverPosition]) {
    positions.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.driver_id.cmp(&b.driver_id))
    });
}
