/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::types::*;

pub fn location_record_key(prefix: &str, LocationId(id): &LocationId) -> String {
    format!("{prefix}:loc:{id}")
}

pub fn driver_position_key(prefix: &str, DriverId(driver_id): &DriverId) -> String {
    format!("{prefix}:pos:{driver_id}")
}

/// Geo set holding the current position of every driver, member = driver id.
pub fn driver_positions_geo_key(prefix: &str) -> String {
    format!("{prefix}:drivers:geo")
}

pub fn health_check_key(prefix: &str) -> String {
    format!("{prefix}:health_check")
}
