/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::{Bytes, Data};

use crate::{
    common::{types::*, utils::*},
    domain::types::internal::location::*,
    environment::AppState,
    tools::error::AppError,
};

fn location_id(query: &LocationIdQuery) -> Result<LocationId, AppError> {
    match query.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(LocationId(id.to_string())),
        _ => Err(AppError::MissingLocationId),
    }
}

fn parse_number(name: &str, value: Option<&str>) -> Result<f64, AppError> {
    let value = value.ok_or_else(|| {
        AppError::InvalidRequest(format!("Query parameter `{name}` is required"))
    })?;
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| {
            AppError::InvalidRequest(format!("Query parameter `{name}` is not a number : {value}"))
        })
}

pub async fn get_location(
    data: Data<AppState>,
    query: LocationIdQuery,
) -> Result<LocationUpdate, AppError> {
    let id = location_id(&query)?;

    Ok(data.storage.get_by_id(&id).await?)
}

pub async fn replace_location(
    data: Data<AppState>,
    query: LocationIdQuery,
    body: Bytes,
) -> Result<APISuccess, AppError> {
    let id = location_id(&query)?;

    let update = parse_location_update(&body)?;
    validate_location_update(&update)?;

    data.storage.replace(&id, update).await?;

    Ok(APISuccess::default())
}

pub async fn get_nearby_drivers(
    data: Data<AppState>,
    query: NearbyDriversQuery,
) -> Result<NearbyDriversResponse, AppError> {
    let lat = Latitude(parse_number("latitude", query.latitude.as_deref())?);
    let lon = Longitude(parse_number("longitude", query.longitude.as_deref())?);

    if !is_valid_latitude(lat) || !is_valid_longitude(lon) {
        return Err(AppError::InvalidLocationData(format!(
            "coordinates out of range : (Lat : {}, Lon : {})",
            lat.0, lon.0
        )));
    }

    let radius = match query.radius.as_deref() {
        Some(radius) => Radius(parse_number("radius", Some(radius))?),
        None => data.nearby_default_radius,
    };

    if radius.0 < 0.0 {
        return Err(AppError::InvalidRequest(format!(
            "Query parameter `radius` must not be negative : {}",
            radius.0
        )));
    }

    let radius = Radius(radius.0.min(MAX_SEARCH_RADIUS));

    Ok(data.storage.find_near(Point { lat, lon }, radius).await?)
}
