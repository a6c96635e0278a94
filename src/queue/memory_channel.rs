// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::models::crawl_task::CrawlTask;
use crate::queue::channel::{
    run_handler, ChannelError, HandlerOutcome, MessageHandler, QueueChannel, QueueProfile,
};

struct Envelope {
    task: CrawlTask,
    deliveries: u32,
}

/// 同一通道上所有订阅者共享的状态
struct MemoryLane {
    sender: mpsc::UnboundedSender<Envelope>,
    receiver: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    sent: parking_lot::Mutex<Vec<String>>,
    dead_letters: parking_lot::Mutex<Vec<CrawlTask>>,
}

/// 内存队列通道
///
/// 单进程内的通道实现。通过 `subscriber` 得到的实例共享同一条通道，
/// 作为竞争消费者接收消息。
pub struct MemoryQueueChannel {
    lane: Arc<MemoryLane>,
    profile: QueueProfile,
    permits: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    receive_loop: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl MemoryQueueChannel {
    /// 创建新的内存通道
    pub fn new(profile: QueueProfile) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let lane = Arc::new(MemoryLane {
            sender,
            receiver: Mutex::new(receiver),
            sent: parking_lot::Mutex::new(Vec::new()),
            dead_letters: parking_lot::Mutex::new(Vec::new()),
        });
        Self::with_lane(lane, profile)
    }

    fn with_lane(lane: Arc<MemoryLane>, profile: QueueProfile) -> Self {
        let (shutdown, _) = watch::channel(false);
        let permits = Arc::new(Semaphore::new(profile.max_concurrent_calls));
        Self {
            lane,
            profile,
            permits,
            shutdown,
            receive_loop: parking_lot::Mutex::new(None),
        }
    }

    /// 创建共享同一通道的新订阅者
    pub fn subscriber(&self) -> Self {
        Self::with_lane(self.lane.clone(), self.profile.clone())
    }

    /// 已发送的任务ID，按发送顺序
    pub fn sent_ids(&self) -> Vec<String> {
        self.lane.sent.lock().clone()
    }

    /// 进入死信的任务
    pub fn dead_letters(&self) -> Vec<CrawlTask> {
        self.lane.dead_letters.lock().clone()
    }

    fn settle(lane: &MemoryLane, profile: &QueueProfile, envelope: Envelope, outcome: HandlerOutcome) {
        match outcome {
            HandlerOutcome::Ack => {
                debug!(lane = %profile.lane, task_id = %envelope.task.id, "Message acknowledged");
            }
            HandlerOutcome::Abandon => {
                if envelope.deliveries >= profile.max_delivery_count {
                    warn!(
                        lane = %profile.lane,
                        task_id = %envelope.task.id,
                        deliveries = envelope.deliveries,
                        "Max delivery count reached, moving to dead letters"
                    );
                    lane.dead_letters.lock().push(envelope.task);
                } else if lane.sender.send(envelope).is_err() {
                    warn!(lane = %profile.lane, "Lane closed, abandoned message dropped");
                }
            }
        }
    }
}

#[async_trait]
impl QueueChannel for MemoryQueueChannel {
    fn topic_name(&self) -> &str {
        &self.profile.lane
    }

    async fn send(&self, task: &CrawlTask) -> Result<bool, ChannelError> {
        let envelope = Envelope {
            task: task.clone(),
            deliveries: 0,
        };
        if self.lane.sender.send(envelope).is_err() {
            return Ok(false);
        }
        self.lane.sent.lock().push(task.id.clone());
        Ok(true)
    }

    async fn start_receiving(&self, handler: Arc<dyn MessageHandler>) -> Result<(), ChannelError> {
        let mut receive_loop = self.receive_loop.lock();
        if receive_loop.is_some() {
            return Err(ChannelError::AlreadyReceiving(self.profile.lane.clone()));
        }

        let lane = self.lane.clone();
        let profile = self.profile.clone();
        let mut shutdown = self.shutdown.subscribe();
        let permits = self.permits.clone();

        info!(lane = %profile.lane, "Starting receive loop");
        *receive_loop = Some(tokio::spawn(async move {
            loop {
                let permit = tokio::select! {
                    _ = shutdown.changed() => break,
                    permit = permits.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let received = tokio::select! {
                    _ = shutdown.changed() => break,
                    received = async { lane.receiver.lock().await.recv().await } => received,
                };
                let Some(mut envelope) = received else {
                    break;
                };
                envelope.deliveries += 1;

                let lane = lane.clone();
                let profile = profile.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let outcome = run_handler(handler, envelope.task.clone()).await;
                    Self::settle(&lane, &profile, envelope, outcome);
                    drop(permit);
                });
            }
            info!(lane = %profile.lane, "Receive loop stopped");
        }));
        Ok(())
    }

    async fn stop(&self) {
        self.shutdown.send_replace(true);
        let handle = self.receive_loop.lock().take();
        let Some(handle) = handle else {
            return;
        };
        let _ = handle.await;

        let all = u32::try_from(self.profile.max_concurrent_calls).unwrap_or(u32::MAX);
        match self.permits.acquire_many(all).await {
            Ok(drained) => drop(drained),
            Err(e) => error!(lane = %self.profile.lane, "Failed to drain in-flight handlers: {}", e),
        }
    }
}
