// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供普通与高优先级两条投递通道，
/// 包括通道接口、Redis实现和内存实现
pub mod channel;
pub mod memory_channel;
pub mod redis_channel;

pub use channel::{lane_name, ChannelError, HandlerOutcome, MessageHandler, QueueChannel, QueueProfile};
