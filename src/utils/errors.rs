// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::repositories::keyed_store::StoreError;
use crate::queue::channel::ChannelError;

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("通道错误: {0}")]
    ChannelError(#[from] ChannelError),

    #[error("存储错误: {0}")]
    StoreError(#[from] StoreError),

    #[error("内部错误: {0}")]
    InternalError(String),
}
