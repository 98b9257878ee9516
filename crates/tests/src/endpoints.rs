/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use actix_web::{
    http::StatusCode,
    test::{self, TestRequest},
    web::Data,
    App,
};
use driver_location_service::{
    channel::{memory::InMemoryChannel, ChannelError, MessageChannel},
    common::{types::*, utils::MAX_SEARCH_RADIUS},
    consumer::LocationConsumer,
    domain::{api, types::ui::location::LocationAccepted},
    environment::AppState,
    middleware::CheckContentLength,
    storage::{memory::InMemoryStorage, LocationStorage},
    tools::error::ErrorBody,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::support::*;

fn app_state(channel: Arc<dyn MessageChannel>, storage: Arc<dyn LocationStorage>) -> Data<AppState> {
    Data::new(AppState {
        channel,
        storage,
        request_timeout: 9000,
        max_allowed_req_size: 512_000,
        nearby_default_radius: Radius(1000.0),
    })
}

fn valid_body() -> serde_json::Value {
    json!({
        "driver_id": "driver-1",
        "latitude": 37.7749,
        "longitude": -122.4194,
        "timestamp": "2024-05-01T10:00:00Z"
    })
}

#[actix_web::test]
async fn invalid_updates_are_rejected_without_publishing() {
    let spy = Arc::new(PublishSpy::default());
    let app = test::init_service(
        App::new()
            .app_data(app_state(spy.clone(), Arc::new(InMemoryStorage::new())))
            .configure(api::handler),
    )
    .await;

    let invalid_bodies = vec![
        json!({"driver_id": "", "latitude": 37.7749, "longitude": -122.4194, "timestamp": "2024-05-01T10:00:00Z"}).to_string(),
        json!({"driver_id": "driver-1", "latitude": 90.01, "longitude": -122.4194, "timestamp": "2024-05-01T10:00:00Z"}).to_string(),
        json!({"driver_id": "driver-1", "latitude": -90.01, "longitude": -122.4194, "timestamp": "2024-05-01T10:00:00Z"}).to_string(),
        json!({"driver_id": "driver-1", "latitude": 37.7749, "longitude": 180.01, "timestamp": "2024-05-01T10:00:00Z"}).to_string(),
        json!({"driver_id": "driver-1", "latitude": 37.7749, "longitude": -180.01, "timestamp": "2024-05-01T10:00:00Z"}).to_string(),
        json!({"driver_id": "driver-1", "latitude": 37.7749, "longitude": -122.4194}).to_string(),
        json!({"driver_id": "driver-1", "latitude": 37.7749, "longitude": -122.4194, "timestamp": "0001-01-01T00:00:00Z"}).to_string(),
        json!({"driver_id": "driver-1", "latitude": 37.7749, "longitude": -122.4194, "timestamp": "1970-01-01T00:00:00Z"}).to_string(),
        json!({"latitude": 37.7749, "longitude": -122.4194, "timestamp": "2024-05-01T10:00:00Z"}).to_string(),
        json!({"driver_id": "driver-1", "latitude": "north", "longitude": -122.4194, "timestamp": "2024-05-01T10:00:00Z"}).to_string(),
        "not json".to_string(),
        String::new(),
    ];

    for body in invalid_bodies {
        let req = TestRequest::post()
            .uri("/location")
            .insert_header(("content-type", "application/json"))
            .set_payload(body.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {body}");
    }

    assert_eq!(spy.publish_count(), 0);
}

#[actix_web::test]
async fn valid_update_is_published_once_with_an_id() {
    let spy = Arc::new(PublishSpy::default());
    let app = test::init_service(
        App::new()
            .app_data(app_state(spy.clone(), Arc::new(InMemoryStorage::new())))
            .configure(api::handler),
    )
    .await;

    let req = TestRequest::post()
        .uri("/location")
        .set_json(valid_body())
        .to_request();
    let accepted: LocationAccepted = test::call_and_read_body_json(&app, req).await;

    assert_eq!(accepted.result, "Success");
    assert_eq!(spy.publish_count(), 1);

    let expected: LocationUpdate = serde_json::from_value(valid_body()).unwrap();
    let published = spy.published_updates().remove(0);
    assert_eq!(published.id, Some(accepted.id));
    assert_eq!(LocationUpdate { id: None, ..published }, expected);
}

#[actix_web::test]
async fn publish_failure_is_a_server_error() {
    let spy = Arc::new(PublishSpy::failing(ChannelError::Unavailable(
        "broker down".to_string(),
    )));
    let app = test::init_service(
        App::new()
            .app_data(app_state(spy.clone(), Arc::new(InMemoryStorage::new())))
            .configure(api::handler),
    )
    .await;

    let req = TestRequest::post()
        .uri("/location")
        .set_json(valid_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.error_code, "PUBLISH_FAILED");
}

#[actix_web::test]
async fn get_location_maps_storage_errors() {
    let storage = Arc::new(InMemoryStorage::new());
    let id = storage
        .insert(update_at("driver-1", sf(), Some(ts(0))))
        .await
        .unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(Arc::new(PublishSpy::default()), storage))
            .configure(api::handler),
    )
    .await;

    let resp = test::call_service(&app, TestRequest::get().uri("/location").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.error_code, "MISSING_LOCATION_ID");

    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/location?id=missing").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.error_code, "LOCATION_NOT_FOUND");

    let stored: LocationUpdate = test::call_and_read_body_json(
        &app,
        TestRequest::get()
            .uri(&format!("/location?id={id}"))
            .to_request(),
    )
    .await;
    assert_eq!(stored.id, Some(id));
    assert_eq!(stored.driver_id, DriverId("driver-1".to_string()));
}

#[actix_web::test]
async fn put_location_replaces_existing_records_only() {
    let storage = Arc::new(InMemoryStorage::new());
    let id = storage
        .insert(update_at("driver-1", sf(), Some(ts(0))))
        .await
        .unwrap();
    let app = test::init_service(
        App::new()
            .app_data(app_state(Arc::new(PublishSpy::default()), storage.clone()))
            .configure(api::handler),
    )
    .await;

    let replacement = json!({
        "driver_id": "driver-1",
        "latitude": 37.78,
        "longitude": -122.41,
        "timestamp": "2024-05-01T10:05:00Z"
    });

    let resp = test::call_service(
        &app,
        TestRequest::put()
            .uri("/location")
            .set_json(&replacement)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        TestRequest::put()
            .uri(&format!("/location?id={id}"))
            .set_json(json!({"driver_id": "driver-1", "latitude": 123.0, "longitude": 0.0, "timestamp": "2024-05-01T10:05:00Z"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        TestRequest::put()
            .uri("/location?id=missing")
            .set_json(&replacement)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let resp = test::call_service(
        &app,
        TestRequest::put()
            .uri(&format!("/location?id={id}"))
            .set_json(&replacement)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let stored = storage.get_by_id(&id).await.unwrap();
    assert_eq!(stored.id, Some(id));
    assert_eq!(stored.latitude, Latitude(37.78));
    assert_eq!(stored.longitude, Longitude(-122.41));
}

#[actix_web::test]
async fn nearby_validates_query_and_orders_results() {
    let storage = Arc::new(InMemoryStorage::new());
    for (driver, meters) in [("far", 1500.0), ("near", 10.0), ("mid", 500.0)] {
        storage
            .insert(update_at(driver, offset_north(sf(), meters), Some(ts(0))))
            .await
            .unwrap();
    }
    let app = test::init_service(
        App::new()
            .app_data(app_state(Arc::new(PublishSpy::default()), storage))
            .configure(api::handler),
    )
    .await;

    for uri in [
        "/nearby",
        "/nearby?latitude=37.7749",
        "/nearby?longitude=-122.4194",
        "/nearby?latitude=abc&longitude=-122.4194",
        "/nearby?latitude=95&longitude=-122.4194",
        "/nearby?latitude=37.7749&longitude=-122.4194&radius=-1",
        "/nearby?latitude=37.7749&longitude=-122.4194&radius=wide",
    ] {
        let resp = test::call_service(&app, TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "uri: {uri}");
    }

    let nearby: Vec<DriverPosition> = test::call_and_read_body_json(
        &app,
        TestRequest::get()
            .uri("/nearby?latitude=37.7749&longitude=-122.4194")
            .to_request(),
    )
    .await;
    let ids: Vec<&str> = nearby.iter().map(|p| p.driver_id.0.as_str()).collect();
    assert_eq!(ids, vec!["near", "mid"]);

    let nearby: Vec<DriverPosition> = test::call_and_read_body_json(
        &app,
        TestRequest::get()
            .uri("/nearby?latitude=37.7749&longitude=-122.4194&radius=2000")
            .to_request(),
    )
    .await;
    assert_eq!(nearby.len(), 3);
}

#[actix_web::test]
async fn huge_nearby_radius_is_capped_to_the_whole_globe() {
    let storage = Arc::new(RecordingStorage::default());
    let antipode = Point {
        lat: Latitude(-SF.0),
        lon: Longitude(SF.1 + 180.0),
    };
    for (driver, point) in [("near", offset_north(sf(), 10.0)), ("antipode", antipode)] {
        storage
            .insert(update_at(driver, point, Some(ts(0))))
            .await
            .unwrap();
    }
    let app = test::init_service(
        App::new()
            .app_data(app_state(Arc::new(PublishSpy::default()), storage.clone()))
            .configure(api::handler),
    )
    .await;

    let nearby: Vec<DriverPosition> = test::call_and_read_body_json(
        &app,
        TestRequest::get()
            .uri("/nearby?latitude=37.7749&longitude=-122.4194&radius=1e308")
            .to_request(),
    )
    .await;

    assert_eq!(nearby.len(), 2);
    assert_eq!(storage.searched_radii(), vec![Radius(MAX_SEARCH_RADIUS)]);
}

#[actix_web::test]
async fn healthcheck_reports_service_up() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(
                Arc::new(PublishSpy::default()),
                Arc::new(InMemoryStorage::new()),
            ))
            .configure(api::handler),
    )
    .await;

    let body: APISuccess = test::call_and_read_body_json(
        &app,
        TestRequest::get().uri("/healthcheck").to_request(),
    )
    .await;
    assert_eq!(body.result, "Service Is Up");
}

#[actix_web::test]
async fn oversized_bodies_are_rejected() {
    let spy = Arc::new(PublishSpy::default());
    let state = Data::new(AppState {
        channel: spy.clone(),
        storage: Arc::new(InMemoryStorage::new()),
        request_timeout: 9000,
        max_allowed_req_size: 16,
        nearby_default_radius: Radius(1000.0),
    });
    let app = test::init_service(
        App::new()
            .app_data(state)
            .wrap(CheckContentLength)
            .configure(api::handler),
    )
    .await;

    let req = TestRequest::post()
        .uri("/location")
        .set_json(valid_body())
        .to_request();
    let err = test::try_call_service(&app, req)
        .await
        .err()
        .expect("oversized body was accepted");

    assert_eq!(
        err.as_response_error().status_code(),
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(spy.publish_count(), 0);
}

#[actix_web::test]
async fn accepted_update_becomes_readable_after_the_consumer_drains_it() {
    let channel = Arc::new(InMemoryChannel::new(16));
    let storage = Arc::new(InMemoryStorage::new());
    let consumer = Arc::new(LocationConsumer::new(
        channel.clone(),
        storage.clone(),
        Duration::from_millis(500),
    ));
    let shutdown = CancellationToken::new();
    let consumer_task = tokio::spawn({
        let consumer = consumer.clone();
        let shutdown = shutdown.clone();
        async move { consumer.run(&shutdown).await }
    });

    let app = test::init_service(
        App::new()
            .app_data(app_state(channel, storage.clone()))
            .configure(api::handler),
    )
    .await;

    let req = TestRequest::post()
        .uri("/location")
        .set_json(valid_body())
        .to_request();
    let accepted: LocationAccepted = test::call_and_read_body_json(&app, req).await;

    assert!(
        eventually(Duration::from_secs(5), || async {
            storage.get_by_id(&accepted.id).await.is_ok()
        })
        .await
    );

    let stored: LocationUpdate = test::call_and_read_body_json(
        &app,
        TestRequest::get()
            .uri(&format!("/location?id={}", accepted.id))
            .to_request(),
    )
    .await;
    assert_eq!(stored.id, Some(accepted.id.clone()));
    assert_eq!(stored.driver_id, DriverId("driver-1".to_string()));
    assert_eq!(stored.latitude, Latitude(37.7749));
    assert_eq!(stored.longitude, Longitude(-122.4194));

    let nearby: Vec<DriverPosition> = test::call_and_read_body_json(
        &app,
        TestRequest::get()
            .uri("/nearby?latitude=37.7749&longitude=-122.4194&radius=0")
            .to_request(),
    )
    .await;
    assert_eq!(nearby.len(), 1);

    shutdown.cancel();
    let summary = tokio::time::timeout(Duration::from_secs(5), consumer_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.persisted, 1);
}
