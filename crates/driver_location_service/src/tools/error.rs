/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{channel::ChannelError, storage::StorageError};

/// Failure classes shared by the ingress boundary, the message channel and the storage port.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Malformed,
    InvalidField,
    NotFound,
    Conflict,
    Unavailable,
    Fatal,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
    pub error_code: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AppError {
    #[error("INTERNAL_ERROR")]
    InternalError(String),
    #[error("INVALID_REQUEST")]
    InvalidRequest(String),
    #[error("INVALID_LOCATION_DATA")]
    InvalidLocationData(String),
    #[error("MISSING_LOCATION_ID")]
    MissingLocationId,
    #[error("LOCATION_NOT_FOUND")]
    LocationNotFound(String),
    #[error("DUPLICATE_LOCATION_ID")]
    DuplicateLocationId(String),
    #[error("STORAGE_UNAVAILABLE")]
    StorageUnavailable(String),
    #[error("PUBLISH_FAILED")]
    PublishFailed(String),
    #[error("CONSUMER_TRANSPORT_FAILED")]
    ConsumerTransportFailed(String),
    #[error("SERIALIZATION_ERROR")]
    SerializationError(String),
    #[error("REQUEST_TIMEOUT")]
    RequestTimeout,
    #[error("LARGE_PAYLOAD_SIZE")]
    LargePayloadSize(usize, usize),
    #[error("INVALID_CONFIGURATION")]
    InvalidConfiguration(String),
}

impl AppError {
    fn error_message(&self) -> ErrorBody {
        ErrorBody {
            error_message: self.message(),
            error_code: self.code(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidRequest(_) => ErrorKind::Malformed,
            AppError::InvalidLocationData(_) | AppError::MissingLocationId => {
                ErrorKind::InvalidField
            }
            AppError::LocationNotFound(_) => ErrorKind::NotFound,
            AppError::DuplicateLocationId(_) => ErrorKind::Conflict,
            AppError::StorageUnavailable(_)
            | AppError::PublishFailed(_)
            | AppError::RequestTimeout => ErrorKind::Unavailable,
            AppError::InternalError(_)
            | AppError::ConsumerTransportFailed(_)
            | AppError::SerializationError(_)
            | AppError::LargePayloadSize(_, _)
            | AppError::InvalidConfiguration(_) => ErrorKind::Fatal,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::InternalError(err) => err.to_string(),
            AppError::InvalidRequest(err) => err.to_string(),
            AppError::InvalidLocationData(err) => format!("Invalid location data : {err}"),
            AppError::MissingLocationId => "Query parameter `id` is required".to_string(),
            AppError::LocationNotFound(id) => format!("Location not found : {id}"),
            AppError::DuplicateLocationId(id) => format!("Location already exists : {id}"),
            AppError::StorageUnavailable(err) => format!("Storage unavailable : {err}"),
            AppError::PublishFailed(err) => format!("Failed to publish location : {err}"),
            AppError::ConsumerTransportFailed(err) => {
                format!("Consumer lost its channel : {err}")
            }
            AppError::SerializationError(err) => err.to_string(),
            AppError::RequestTimeout => "Request timed out".to_string(),
            AppError::LargePayloadSize(length, limit) => {
                format!("Content length ({length} Bytes) greater than allowed maximum limit : ({limit} Bytes)")
            }
            AppError::InvalidConfiguration(err) => format!("Invalid configuration : {err}"),
        }
    }

    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(self.error_message())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::LargePayloadSize(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            // Not-found lookups surface as server errors, distinguishable by code only.
            _ => match self.kind() {
                ErrorKind::Malformed | ErrorKind::InvalidField => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound
                | ErrorKind::Conflict
                | ErrorKind::Unavailable
                | ErrorKind::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(id) => AppError::LocationNotFound(id.to_string()),
            StorageError::Conflict(id) => AppError::DuplicateLocationId(id.to_string()),
            StorageError::Unavailable(err) => AppError::StorageUnavailable(err),
            StorageError::Corrupted(err) => AppError::SerializationError(err),
        }
    }
}

impl From<ChannelError> for AppError {
    fn from(error: ChannelError) -> Self {
        match error {
            ChannelError::Serialization(err) => AppError::SerializationError(err),
            ChannelError::Transport(err) => AppError::ConsumerTransportFailed(err),
            err @ (ChannelError::Unavailable(_) | ChannelError::Saturated | ChannelError::Closed) => {
                AppError::PublishFailed(err.to_string())
            }
        }
    }
}
