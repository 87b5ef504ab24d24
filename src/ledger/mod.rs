//! 账本端口
//!
//! 客户端只定义调用形状与确认语义；签名、广播、RPC 细节由嵌入方的钱包实现
//! 提供。submit 返回交易句柄，await_confirmation 等待配置的确认数后给出
//! Confirmed / Reverted 终局（实现内部的 RPC 抖动自行消化，不外溢）。

pub mod mock;

use async_trait::async_trait;
use serde::Serialize;

pub use mock::MockLedgerClient;

/// 合约调用形状（与平台合约 ABI 对应）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LedgerCall {
    /// registerAgent(_cid, _operator, _name, _description, _price)
    RegisterAgent {
        cid: String,
        operator: String,
        name: String,
        description: String,
        price_wei: u128,
    },
    /// askQuestion(_cid, _questionContent)，附带固定支付金额
    AskQuestion {
        cid: String,
        question_content: String,
        payment_wei: u128,
    },
}

/// 已广播交易的句柄
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxHandle {
    pub tx_hash: String,
}

/// 确认终局
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TxOutcome {
    Confirmed { tx_hash: String },
    Reverted { reason: String },
}

/// 账本客户端 trait
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// 弹出钱包签名并广播；用户拒签或广播失败返回 Err
    async fn submit(&self, call: LedgerCall) -> Result<TxHandle, String>;

    /// 等待指定确认数后返回终局
    async fn await_confirmation(&self, handle: &TxHandle, confirmations: u32) -> TxOutcome;
}
