/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{
    get, put,
    web::{Bytes, Data, Json, Query},
};

use crate::{
    common::types::*,
    domain::{action::internal::location, types::internal::location::*},
    environment::AppState,
    tools::error::AppError,
};

#[get("/location")]
pub async fn get_location(
    data: Data<AppState>,
    query: Query<LocationIdQuery>,
) -> Result<Json<LocationUpdate>, AppError> {
    Ok(Json(location::get_location(data, query.into_inner()).await?))
}

#[put("/location")]
pub async fn replace_location(
    data: Data<AppState>,
    query: Query<LocationIdQuery>,
    body: Bytes,
) -> Result<Json<APISuccess>, AppError> {
    Ok(Json(
        location::replace_location(data, query.into_inner(), body).await?,
    ))
}

#[get("/nearby")]
pub async fn get_nearby_drivers(
    data: Data<AppState>,
    query: Query<NearbyDriversQuery>,
) -> Result<Json<NearbyDriversResponse>, AppError> {
    Ok(Json(
        location::get_nearby_drivers(data, query.into_inner()).await?,
    ))
}
