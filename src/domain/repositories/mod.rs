// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 定义领域层的存储抽象，具体实现由基础设施层提供：
/// - 键值存储（keyed_store）：快速存储与持久存储共用的读写接口
pub mod keyed_store;
