/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::types::*;
use crate::tools::error::AppError;
use std::f64::consts::PI;

/// Unix seconds of `0001-01-01T00:00:00Z`, the zero time some producers emit for unset timestamps.
const ZERO_TIME_UNIX_SECONDS: i64 = -62_135_596_800;

/// Radius of Earth in meters
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Half the circumference, every point on the sphere lies within it.
pub const MAX_SEARCH_RADIUS: f64 = PI * EARTH_RADIUS;

fn deg2rad(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

/// Great-circle distance between two points using the haversine formula.
pub fn distance_between_in_meters(latlong1: &Point, latlong2: &Point) -> f64 {
    let Latitude(lat1) = latlong1.lat;
    let Longitude(lon1) = latlong1.lon;
    let Latitude(lat2) = latlong2.lat;
    let Longitude(lon2) = latlong2.lon;

    let dlat = deg2rad(lat2 - lat1);
    let dlon = deg2rad(lon2 - lon1);

    let sq = |x: f64| x * x;

    let h = sq((dlat / 2.0).sin())
        + deg2rad(lat1).cos() * deg2rad(lat2).cos() * sq((dlon / 2.0).sin());

    // Rounding can push h marginally outside [0, 1] for antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS * h.sqrt().atan2((1.0 - h).sqrt())
}

pub fn is_valid_latitude(Latitude(lat): Latitude) -> bool {
    (-90.0..=90.0).contains(&lat)
}

pub fn is_valid_longitude(Longitude(lon): Longitude) -> bool {
    (-180.0..=180.0).contains(&lon)
}

/// A timestamp counts as unset when absent, at the Unix epoch, or at `0001-01-01T00:00:00Z`.
pub fn is_zero_timestamp(timestamp: &Option<TimeStamp>) -> bool {
    match timestamp {
        None => true,
        Some(TimeStamp(ts)) => {
            ts.timestamp_subsec_nanos() == 0
                && (ts.timestamp() == 0 || ts.timestamp() == ZERO_TIME_UNIX_SECONDS)
        }
    }
}

pub fn validate_location_update(update: &LocationUpdate) -> Result<(), AppError> {
    if update.driver_id.0.is_empty() {
        return Err(AppError::InvalidLocationData(
            "driver ID is required".to_string(),
        ));
    }
    if !is_valid_latitude(update.latitude) {
        return Err(AppError::InvalidLocationData(
            "latitude must be between -90 and 90".to_string(),
        ));
    }
    if !is_valid_longitude(update.longitude) {
        return Err(AppError::InvalidLocationData(
            "longitude must be between -180 and 180".to_string(),
        ));
    }
    if is_zero_timestamp(&update.timestamp) {
        return Err(AppError::InvalidLocationData(
            "timestamp is required".to_string(),
        ));
    }
    Ok(())
}

pub fn parse_location_update(body: &[u8]) -> Result<LocationUpdate, AppError> {
    serde_json::from_slice::<LocationUpdate>(body)
        .map_err(|err| AppError::InvalidRequest(format!("Failed to decode request body : {err}")))
}
