//! Saga 错误类型
//!
//! 区分四类终态很重要：链下提交失败（无任何副作用，可直接重新发起）、
//! 钱包拒签/链上回滚（交易未生效，回滚乐观记录）、终结部分完成（链上已生效
//! 但链下未补齐）、轮询超时（链上已生效，答案尚未被索引到）。后两类必须
//! 向用户单独措辞，不能并入普通失败。

use thiserror::Error;

/// Saga 运行过程中的错误；除 InFlight / InvalidInput 外均为 Saga 终态
#[derive(Error, Debug, Clone)]
pub enum SagaError {
    /// 链下提交失败：尚未发生任何账本交互，换一个新 Saga 重新提交即可
    #[error("Off-chain submit failed: {0}")]
    OffchainSubmit(String),

    /// 用户在钱包里拒签，或钱包侧提交失败
    #[error("Wallet rejected: {0}")]
    WalletRejected(String),

    /// 交易上链后被回滚
    #[error("Transaction reverted: {0}")]
    ChainReverted(String),

    /// 链上登记已生效，但 on_chain 终结调用在重试预算内始终失败；
    /// 记录已存在于账本，仅链下列表可能滞后
    #[error("Registration confirmed on-chain but finalization failed after {attempts} attempts: {message}")]
    FinalizePartial {
        cid: String,
        attempts: u32,
        message: String,
    },

    /// 交易已确认，但答案在预算时间内未出现在权威列表里；
    /// 后端可能仍在异步生成，用户刷新即可，不自动重试
    #[error("Answer not observed within {waited_ms} ms, refresh later")]
    PollTimeout { waited_ms: u64 },

    /// 同一 (subject, actor) 已有未完成的 Saga，拒绝而非排队
    #[error("Another submission is already in flight for {subject}")]
    InFlight { subject: String },

    /// 提交前校验失败（必填项缺失、文件超限等），未创建 Saga
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 被用户取消或宿主视图销毁
    #[error("Cancelled")]
    Cancelled,
}

impl SagaError {
    /// 链上效果是否已经落账（用于向用户区分「彻底失败」与「部分完成」）
    pub fn chain_effect_committed(&self) -> bool {
        matches!(
            self,
            SagaError::FinalizePartial { .. } | SagaError::PollTimeout { .. }
        )
    }
}
