/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::time::Duration;

use actix::fut::{ready, Ready};
use actix_http::{header::CONTENT_LENGTH, StatusCode};
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web::Data,
    Error, HttpRequest,
};
use futures::future::LocalBoxFuture;
use tokio::time::{timeout, Instant};
use tracing::{error, info, Span};
use tracing_actix_web::{DefaultRootSpanBuilder, RootSpanBuilder};
use uuid::Uuid;

use crate::{
    environment::AppState, incoming_api, tools::error::AppError,
    tools::prometheus::INCOMING_API,
};

/// Fails requests that outlive `AppState::request_timeout` with `REQUEST_TIMEOUT`.
pub struct RequestTimeout;

impl<S> Transform<S, ServiceRequest> for RequestTimeout
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTimeoutMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTimeoutMiddleware { service }))
    }
}

pub struct RequestTimeoutMiddleware<S> {
    service: S,
}

impl<S> Service<ServiceRequest> for RequestTimeoutMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_timeout = req
            .app_data::<Data<AppState>>()
            .map(|data| Duration::from_millis(data.request_timeout));
        let fut = self.service.call(req);
        match request_timeout {
            Some(request_timeout) => Box::pin(async move {
                timeout(request_timeout, fut)
                    .await
                    .map_err(|_| Error::from(AppError::RequestTimeout))?
            }),
            None => Box::pin(fut),
        }
    }
}

/// Root span per request, keyed by the caller's `x-request-id` or a fresh one.
pub struct DomainRootSpanBuilder;

impl RootSpanBuilder for DomainRootSpanBuilder {
    fn on_request_start(request: &ServiceRequest) -> Span {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|request_id| request_id.to_str().ok())
            .map(|request_id| request_id.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        tracing_actix_web::root_span!(request, request_id)
    }

    fn on_request_end<B: MessageBody>(span: Span, outcome: &Result<ServiceResponse<B>, Error>) {
        DefaultRootSpanBuilder::on_request_end(span, outcome);
    }
}

/// Logs every request and records its latency in `INCOMING_API`.
pub struct IncomingRequestMetrics;

impl<S> Transform<S, ServiceRequest> for IncomingRequestMetrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = IncomingRequestMetricsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IncomingRequestMetricsMiddleware { service }))
    }
}

pub struct IncomingRequestMetricsMiddleware<S> {
    service: S,
}

impl<S> Service<ServiceRequest> for IncomingRequestMetricsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let handler = handler_name(req.request());

        let fut = self.service.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    record_request(
                        response.response().error(),
                        response.status(),
                        &method,
                        &handler,
                        start_time,
                    );
                    Ok(response)
                }
                Err(err) => {
                    let status = err.error_response().status();
                    record_request(Some(&err), status, &method, &handler, start_time);
                    Err(err)
                }
            }
        })
    }
}

/// Route pattern when one matched, so ids in paths do not explode metric labels.
fn handler_name(request: &HttpRequest) -> String {
    request
        .match_pattern()
        .unwrap_or_else(|| request.path().to_string())
}

fn record_request(
    err: Option<&Error>,
    status: StatusCode,
    method: &str,
    handler: &str,
    start_time: Instant,
) {
    let latency = format!("{}ms", start_time.elapsed().as_millis());
    match err {
        Some(err) => {
            let code = err.to_string();
            error!(tag = "[INCOMING API - ERROR]", request_method = %method, request_path = %handler, response_code = %code, response_status = status.as_str(), latency = %latency);
            incoming_api!(method, handler, status.as_str(), code.as_str(), start_time);
        }
        None => {
            info!(tag = "[INCOMING API]", request_method = %method, request_path = %handler, response_status = status.as_str(), latency = %latency);
            incoming_api!(method, handler, status.as_str(), "SUCCESS", start_time);
        }
    }
}

/// Rejects requests whose declared `Content-Length` exceeds `AppState::max_allowed_req_size`.
pub struct CheckContentLength;

impl<S> Transform<S, ServiceRequest> for CheckContentLength
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = CheckContentLengthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CheckContentLengthMiddleware { service }))
    }
}

pub struct CheckContentLengthMiddleware<S> {
    service: S,
}

impl<S> Service<ServiceRequest> for CheckContentLengthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let content_length = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|content_length| content_length.to_str().ok()?.parse::<usize>().ok());
        let limit = req
            .app_data::<Data<AppState>>()
            .map(|data| data.max_allowed_req_size);

        if let (Some(content_length), Some(limit)) = (content_length, limit) {
            if content_length > limit {
                let response: Result<Self::Response, Self::Error> = Err(Error::from(
                    AppError::LargePayloadSize(content_length, limit),
                ));
                return Box::pin(ready(response));
            }
        }

        Box::pin(self.service.call(req))
    }
}
