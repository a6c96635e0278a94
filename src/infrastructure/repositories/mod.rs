// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 存储实现模块
///
/// 提供 `KeyedStore` 的内存与数据库实现
pub mod crawl_task_repo_impl;
pub mod memory_store;
