//! Twinforge - Rust 链上数字分身客户端
//!
//! 用户在平台上铸造 AI 数字分身（Agent），之后与其进行问答。每次用户动作都要
//! 跨三个彼此独立失败的系统落地：链下内容存储（HTTP API）、分布式账本（钱包
//! 签名交易）、最终一致的索引后端。本 crate 以客户端驱动的 Saga 把它们协调成
//! 单个用户可见操作：乐观 UI 状态、幂等重试、有界等待。
//!
//! 模块划分：
//! - **api**: 链下 API 端口与实现（reqwest HTTP 客户端 / Mock）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: Saga 数据模型、协调器、生命周期监管、错误
//! - **ledger**: 账本端口（提交签名调用、等待确认）与 Mock
//! - **notify**: 进度通知端口（按 correlation id 原地替换的单条消息）
//! - **runtime**: 面向视图层的封装（cmd/state 双通道 + 读侧查询）
//! - **steps**: 步骤执行器（链下提交 / 账本交易 / 幂等终结 / 轮询）
//! - **store**: 乐观记录仓库（插入 / 对账 / 回滚）

pub mod api;
pub mod config;
pub mod core;
pub mod ledger;
pub mod notify;
pub mod observability;
pub mod runtime;
pub mod steps;
pub mod store;

pub use crate::core::{SagaCoordinator, SagaError, SagaState};
pub use runtime::{create_runtime, Command, ViewState};
