/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use strum_macros::AsRefStr;

use crate::{
    common::types::{LocationId, LocationUpdate},
    storage::{LocationStorage, StorageError},
};

/// Result of handling one delivered payload. None of these stop the consumer.
#[derive(Debug, Clone, PartialEq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProcessOutcome {
    Persisted(LocationId),
    Malformed(String),
    StorageUnavailable(String),
    WriteRejected(String),
}

/// Decodes one payload and inserts it.
///
/// Payloads are not validated again, anything that decodes is persisted as is.
pub async fn process_message(payload: &[u8], storage: &dyn LocationStorage) -> ProcessOutcome {
    let update = match serde_json::from_slice::<LocationUpdate>(payload) {
        Ok(update) => update,
        Err(err) => return ProcessOutcome::Malformed(err.to_string()),
    };

    match storage.insert(update).await {
        Ok(id) => ProcessOutcome::Persisted(id),
        Err(err @ StorageError::Unavailable(_)) => {
            ProcessOutcome::StorageUnavailable(err.to_string())
        }
        Err(
            err @ (StorageError::Conflict(_)
            | StorageError::NotFound(_)
            | StorageError::Corrupted(_)),
        ) => ProcessOutcome::WriteRejected(err.to_string()),
    }
}
