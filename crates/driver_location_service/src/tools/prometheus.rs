/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use prometheus::{
    opts, register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

pub static INCOMING_API: once_cell::sync::Lazy<HistogramVec> = once_cell::sync::Lazy::new(|| {
    register_histogram_vec!(
        opts!("http_request_duration_seconds", "Incoming API requests").into(),
        &["method", "handler", "status_code", "code", "version"]
    )
    .expect("Failed to register incoming API metrics")
});

pub static PUBLISHED_LOCATION_UPDATES: once_cell::sync::Lazy<IntCounter> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter!(
            "published_location_updates",
            "Location updates handed to the message channel"
        )
        .expect("Failed to register published location updates metrics")
    });

pub static CONSUMED_LOCATION_UPDATES: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            "consumed_location_updates",
            "Location updates drained from the message channel",
            &["outcome"]
        )
        .expect("Failed to register consumed location updates metrics")
    });

pub static TERMINATION: once_cell::sync::Lazy<HistogramVec> = once_cell::sync::Lazy::new(|| {
    register_histogram_vec!(
        opts!("termination", "Terminations").into(),
        &["type", "version"]
    )
    .expect("Failed to register termination metrics")
});

/// Observes the duration of an incoming API request.
///
/// # Arguments
///
/// * `$method` - The HTTP method of the request (e.g., GET, POST).
/// * `$endpoint` - The endpoint or route of the request.
/// * `$status` - The HTTP status code of the response.
/// * `$code` - Error code of the response, or `SUCCESS`.
/// * `$start` - The time when the request was received.
#[macro_export]
macro_rules! incoming_api {
    ($method:expr, $endpoint:expr, $status:expr, $code:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        let version = std::env::var("DEPLOYMENT_VERSION").unwrap_or("DEV".to_string());
        INCOMING_API
            .with_label_values(&[$method, $endpoint, $status, $code, version.as_str()])
            .observe(duration);
    };
}

/// Records how long a long-running task lived before it terminated, labelled by reason.
#[macro_export]
macro_rules! termination {
    ($type_:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        let version = std::env::var("DEPLOYMENT_VERSION").unwrap_or("DEV".to_string());
        TERMINATION
            .with_label_values(&[$type_, version.as_str()])
            .observe(duration);
    };
}

/// Builds the `/metrics` endpoint middleware and registers the service collectors with it.
///
/// # Panics
///
/// * If the metrics middleware cannot be built or a collector cannot be registered.
pub fn prometheus_metrics() -> PrometheusMetrics {
    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus Metrics");

    prometheus
        .registry
        .register(Box::new(INCOMING_API.to_owned()))
        .expect("Failed to register incoming API metrics");

    prometheus
        .registry
        .register(Box::new(PUBLISHED_LOCATION_UPDATES.to_owned()))
        .expect("Failed to register published location updates metrics");

    prometheus
        .registry
        .register(Box::new(CONSUMED_LOCATION_UPDATES.to_owned()))
        .expect("Failed to register consumed location updates metrics");

    prometheus
        .registry
        .register(Box::new(TERMINATION.to_owned()))
        .expect("Failed to register termination metrics");

    prometheus
}
