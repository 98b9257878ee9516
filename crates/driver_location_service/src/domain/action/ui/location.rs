/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::{Bytes, Data};
use tracing::info;

use crate::{
    common::{
        types::*,
        utils::{parse_location_update, validate_location_update},
    },
    domain::types::ui::location::LocationAccepted,
    environment::AppState,
    tools::{error::AppError, prometheus::PUBLISHED_LOCATION_UPDATES},
};

/// Validates a submitted update and hands it to the message channel.
///
/// Nothing is published unless the body decodes and passes validation. Success means the
/// channel accepted the record, persistence happens later in the consumer.
pub async fn ingest_location_update(
    data: Data<AppState>,
    body: Bytes,
) -> Result<LocationAccepted, AppError> {
    let mut update = parse_location_update(&body)?;

    validate_location_update(&update)?;

    let id = update.id.get_or_insert_with(LocationId::generate).to_owned();

    data.channel.publish(&update).await?;

    PUBLISHED_LOCATION_UPDATES.inc();

    info!(
        tag = "[Location Ingested]",
        location_id = %id,
        driver_id = %update.driver_id,
        latitude = update.latitude.0,
        longitude = update.longitude.0
    );

    Ok(LocationAccepted {
        result: APISuccess::default().result,
        id,
    })
}
