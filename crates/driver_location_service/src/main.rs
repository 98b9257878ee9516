/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use std::{env::var, sync::Arc, time::Duration};

use actix_web::{web, App, HttpServer};
use driver_location_service::{
    consumer::{supervise_consumer, LocationConsumer},
    domain::api,
    environment::{read_dhall_config, AppState},
    middleware::*,
    tools::{logger::*, prometheus::prometheus_metrics},
};
use tokio::{
    signal::unix::{signal, SignalKind},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing_actix_web::TracingLogger;

fn listen_for_signal(kind: SignalKind, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut stream = signal(kind).expect("Failed to install signal handler");
        stream.recv().await;
        info!(tag = "[Shutdown]", signal = ?kind, "Shutdown requested");
        shutdown.cancel();
    });
}

#[actix_web::main]
async fn start_server() -> std::io::Result<()> {
    let dhall_config_path = var("DHALL_CONFIG")
        .unwrap_or_else(|_| "./dhall_config/driver_location_service.dhall".to_string());
    let app_config = read_dhall_config(&dhall_config_path).unwrap_or_else(|err| {
        println!("Dhall Config Reading Error : {}", err);
        std::process::exit(1);
    });

    let _guards = setup_tracing(app_config.logger_cfg);

    std::panic::set_hook(Box::new(|panic_info| {
        error!("Panic Occured : {:?}", panic_info);
    }));

    let app_state = AppState::new(&app_config).await.unwrap_or_else(|err| {
        error!(tag = "[Startup]", error = %err.message(), "Failed to initialise application state");
        std::process::exit(1);
    });

    let shutdown = CancellationToken::new();
    listen_for_signal(SignalKind::terminate(), shutdown.clone());
    listen_for_signal(SignalKind::interrupt(), shutdown.clone());

    let consumer = Arc::new(LocationConsumer::new(
        app_state.channel.clone(),
        app_state.storage.clone(),
        Duration::from_millis(app_config.consumer_cfg.drain_timeout),
    ));
    let consumer_task = tokio::spawn(supervise_consumer(
        consumer,
        shutdown.clone(),
        Duration::from_millis(app_config.consumer_cfg.restart_delay),
    ));

    let data = web::Data::new(app_state);
    let prometheus = prometheus_metrics();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(IncomingRequestMetrics)
            .wrap(CheckContentLength)
            .wrap(RequestTimeout)
            .wrap(TracingLogger::<DomainRootSpanBuilder>::new())
            .wrap(prometheus.clone())
            .configure(api::handler)
    })
    .workers(app_config.workers)
    .shutdown_timeout(app_config.shutdown_grace_period)
    .disable_signals()
    .bind(("0.0.0.0", app_config.port))?
    .run();

    let server_handle = server.handle();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        server_shutdown.cancelled().await;
        server_handle.stop(true).await;
    });

    info!(tag = "[Startup]", port = app_config.port, "Server started");

    let server_result = server.await;

    // Also stops the consumer when the server exits on its own.
    shutdown.cancel();

    let grace_period = Duration::from_secs(app_config.shutdown_grace_period);
    match timeout(grace_period, consumer_task).await {
        Ok(Ok(summary)) => info!(
            tag = "[Shutdown]",
            received = summary.received,
            persisted = summary.persisted,
            failed = summary.failed,
            "Consumer drained"
        ),
        Ok(Err(err)) => error!(tag = "[Shutdown]", error = %err, "Consumer task panicked"),
        Err(_) => warn!(tag = "[Shutdown]", "Consumer did not stop within the grace period"),
    }

    server_result
}

fn main() {
    start_server().expect("Failed to start the server");
}
