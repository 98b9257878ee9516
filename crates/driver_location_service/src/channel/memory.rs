/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex,
};

use super::{encode_location_update, ChannelError, Delivery, MessageChannel, Subscription};
use crate::common::types::LocationUpdate;

/// Bounded in-process channel for local runs and tests.
///
/// Records live only as long as the process. All subscriptions share one receiver, so
/// they behave like members of a single consumer group.
pub struct InMemoryChannel {
    sender: mpsc::Sender<Vec<u8>>,
    receiver: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
    next_offset: Arc<AtomicI64>,
}

impl InMemoryChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            next_offset: Arc::new(AtomicI64::new(0)),
        }
    }
}

#[async_trait]
impl MessageChannel for InMemoryChannel {
    async fn publish(&self, update: &LocationUpdate) -> Result<(), ChannelError> {
        let payload = encode_location_update(update)?;
        self.sender.try_send(payload).map_err(|err| match err {
            TrySendError::Full(_) => ChannelError::Saturated,
            TrySendError::Closed(_) => ChannelError::Unavailable("receiver dropped".to_string()),
        })
    }

    async fn subscribe(&self) -> Result<Box<dyn Subscription>, ChannelError> {
        Ok(Box::new(InMemorySubscription {
            receiver: self.receiver.clone(),
            next_offset: self.next_offset.clone(),
            closed: false,
        }))
    }
}

pub struct InMemorySubscription {
    receiver: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
    next_offset: Arc<AtomicI64>,
    closed: bool,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next_delivery(&mut self) -> Result<Delivery, ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        let payload = self
            .receiver
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| ChannelError::Transport("all senders dropped".to_string()))?;
        Ok(Delivery {
            payload,
            partition: 0,
            offset: self.next_offset.fetch_add(1, Ordering::Relaxed),
        })
    }

    async fn acknowledge(&mut self, _delivery: &Delivery) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.closed = true;
        Ok(())
    }
}
