/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
pub mod internal;
pub mod ui;

use actix_web::web::{QueryConfig, ServiceConfig};

use crate::tools::error::AppError;

pub fn handler(config: &mut ServiceConfig) {
    config
        .app_data(
            QueryConfig::default()
                .error_handler(|err, _| AppError::InvalidRequest(err.to_string()).into()),
        )
        .service(ui::location::ingest_location)
        .service(ui::healthcheck::health_check)
        .service(internal::location::get_location)
        .service(internal::location::replace_location)
        .service(internal::location::get_nearby_drivers);
}
