/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    channel::{memory::InMemoryChannel, MessageChannel},
    common::types::Radius,
    kafka::KafkaChannel,
    redis::{RedisSettings, RedisStorage},
    storage::{memory::InMemoryStorage, LocationStorage},
    tools::{error::AppError, logger::LoggerConfig},
};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub workers: usize,
    pub logger_cfg: LoggerConfig,
    /// Milliseconds
    pub request_timeout: u64,
    pub max_allowed_req_size: usize,
    /// Seconds
    pub shutdown_grace_period: u64,
    pub nearby_default_radius: f64,
    pub channel_cfg: ChannelConfig,
    pub storage_cfg: StorageConfig,
    pub consumer_cfg: ConsumerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum ChannelBackend {
    Kafka,
    InMemory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChannelConfig {
    pub backend: ChannelBackend,
    pub kafka_brokers: String,
    pub topic: String,
    /// Milliseconds
    pub publish_timeout: u64,
    pub partition_by_driver: bool,
    pub in_memory_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Redis,
    InMemory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub redis_cfg: RedisSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct ConsumerConfig {
    /// Milliseconds
    pub drain_timeout: u64,
    /// Milliseconds
    pub restart_delay: u64,
}

pub fn read_dhall_config(config_path: &str) -> Result<AppConfig, String> {
    let config = serde_dhall::from_file(config_path).parse::<AppConfig>();
    match config {
        Ok(config) => Ok(config),
        Err(e) => Err(format!("Error reading config: {}", e)),
    }
}

/// Process-wide handles shared by every request handler and the consumer.
pub struct AppState {
    pub channel: Arc<dyn MessageChannel>,
    pub storage: Arc<dyn LocationStorage>,
    pub request_timeout: u64,
    pub max_allowed_req_size: usize,
    pub nearby_default_radius: Radius,
}

impl AppState {
    pub async fn new(app_config: &AppConfig) -> Result<AppState, AppError> {
        let channel: Arc<dyn MessageChannel> = match app_config.channel_cfg.backend {
            ChannelBackend::Kafka => {
                let channel = KafkaChannel::new(
                    &app_config.channel_cfg.kafka_brokers,
                    &app_config.channel_cfg.topic,
                    Duration::from_millis(app_config.channel_cfg.publish_timeout),
                    app_config.channel_cfg.partition_by_driver,
                )
                .map_err(|err| AppError::InvalidConfiguration(err.to_string()))?;
                info!(tag = "[Message Channel]", brokers = %app_config.channel_cfg.kafka_brokers, topic = %channel.topic(), "Kafka producer ready");
                Arc::new(channel)
            }
            ChannelBackend::InMemory => {
                info!(tag = "[Message Channel]", capacity = app_config.channel_cfg.in_memory_capacity, "Using in-process channel");
                Arc::new(InMemoryChannel::new(
                    app_config.channel_cfg.in_memory_capacity,
                ))
            }
        };

        let storage: Arc<dyn LocationStorage> = match app_config.storage_cfg.backend {
            StorageBackend::Redis => Arc::new(
                RedisStorage::new(&app_config.storage_cfg.redis_cfg)
                    .await
                    .map_err(|err| AppError::InvalidConfiguration(err.to_string()))?,
            ),
            StorageBackend::InMemory => {
                info!(tag = "[Storage]", "Using in-process storage");
                Arc::new(InMemoryStorage::new())
            }
        };

        Ok(AppState {
            channel,
            storage,
            request_timeout: app_config.request_timeout,
            max_allowed_req_size: app_config.max_allowed_req_size,
            nearby_default_radius: Radius(app_config.nearby_default_radius),
        })
    }
}
