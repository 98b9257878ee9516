/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
pub mod memory;

use async_trait::async_trait;

use crate::common::types::LocationUpdate;
use crate::tools::error::ErrorKind;

/// One record handed out by a subscription, with enough position data to acknowledge it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ChannelError {
    #[error("channel unavailable : {0}")]
    Unavailable(String),
    #[error("channel saturated")]
    Saturated,
    #[error("failed to encode location update : {0}")]
    Serialization(String),
    #[error("channel transport failed : {0}")]
    Transport(String),
    #[error("subscription closed")]
    Closed,
}

impl ChannelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChannelError::Unavailable(_) | ChannelError::Saturated => ErrorKind::Unavailable,
            ChannelError::Serialization(_) => ErrorKind::Malformed,
            ChannelError::Transport(_) | ChannelError::Closed => ErrorKind::Fatal,
        }
    }
}

/// Asynchronous hand-off between ingestion and persistence.
///
/// Implementations deliver every published record at least once to the single logical
/// consumer group. `publish` returns only after the backing channel has accepted the
/// record, and reports saturation as an error instead of dropping it.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn publish(&self, update: &LocationUpdate) -> Result<(), ChannelError>;

    async fn subscribe(&self) -> Result<Box<dyn Subscription>, ChannelError>;
}

#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next record. Dropping the returned future must not lose a record,
    /// callers race it against cancellation.
    async fn next_delivery(&mut self) -> Result<Delivery, ChannelError>;

    /// Marks a record as handled so it is not redelivered to the consumer group.
    async fn acknowledge(&mut self, delivery: &Delivery) -> Result<(), ChannelError>;

    /// Releases the subscription. Further reads fail with `ChannelError::Closed`.
    async fn close(&mut self) -> Result<(), ChannelError>;
}

pub fn encode_location_update(update: &LocationUpdate) -> Result<Vec<u8>, ChannelError> {
    serde_json::to_vec(update).map_err(|err| ChannelError::Serialization(err.to_string()))
}
