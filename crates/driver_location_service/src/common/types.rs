/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct LocationId(pub String);

impl LocationId {
    pub fn generate() -> Self {
        LocationId(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct DriverId(pub String);

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Latitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Longitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Hash, Ord)]
pub struct TimeStamp(pub DateTime<Utc>);
/// Search radius in meters.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Radius(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, PartialOrd, Copy)]
pub struct Meters(pub f64);

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Point {
    pub lat: Latitude,
    pub lon: Longitude,
}

/// A single geolocation ping reported by a driver.
///
/// This is both the HTTP body of `POST /location` and the payload carried on the
/// message channel. `id` is optional on ingress and `timestamp` may be absent on
/// payloads written by other producers, so both deserialize from missing fields.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct LocationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LocationId>,
    pub driver_id: DriverId,
    pub latitude: Latitude,
    pub longitude: Longitude,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimeStamp>,
}

impl LocationUpdate {
    pub fn point(&self) -> Point {
        Point {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

/// Current position of a driver as answered by proximity queries.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DriverPosition {
    pub driver_id: DriverId,
    pub location: Point,
    pub distance: Meters,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct APISuccess {
    pub result: String,
}

impl Default for APISuccess {
    fn default() -> Self {
        Self {
            result: "Success".to_string(),
        }
    }
}
