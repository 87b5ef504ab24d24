//! 步骤执行器
//!
//! Saga 的每一步实现 StepExecutor：链下提交、账本交易、幂等终结、轮询。
//! 步骤不直接改 Saga 状态，而是通过协调器发下来的 StepCtx 请求转移；
//! StepCtx 在每次转移前检查取消令牌，迟到的定时器永远只能是 no-op。

pub mod finalize;
pub mod ledger_tx;
pub mod offchain;
pub mod poll;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::api::types::{GenerateData, QuestionEntry};
use crate::core::error::SagaError;
use crate::core::saga::{Saga, SagaState, StepKind};
use crate::ledger::TxHandle;
use crate::notify::Notifier;
use crate::store::OptimisticRecordStore;

pub use finalize::FinalizeStep;
pub use ledger_tx::{CallPlan, LedgerTransactionStep};
pub use offchain::OffchainSubmitStep;
pub use poll::{PollSpec, PollStep};

/// 步骤间传递的流水数据（黑板）：前序步骤写入，后序步骤读取
#[derive(Debug, Default)]
pub struct FlowData {
    /// 链下提交步骤的产出
    pub generate: Option<GenerateData>,
    /// 账本步骤确认后的交易哈希
    pub tx_hash: Option<String>,
    /// 轮询步骤命中的权威问答条目
    pub matched: Option<QuestionEntry>,
}

/// 协调器发给步骤的执行环境：状态转移句柄 + 取消令牌
pub struct StepCtx {
    saga: Arc<RwLock<Saga>>,
    store: Arc<OptimisticRecordStore>,
    notifier: Arc<dyn Notifier>,
    pub correlation_id: String,
    pub local_id: String,
    cancel: CancellationToken,
}

impl StepCtx {
    pub fn new(
        saga: Arc<RwLock<Saga>>,
        store: Arc<OptimisticRecordStore>,
        notifier: Arc<dyn Notifier>,
        correlation_id: String,
        local_id: String,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            saga,
            store,
            notifier,
            correlation_id,
            local_id,
            cancel,
        }
    }

    /// 活性检查：任何 await 之后、任何共享状态写入之前都要先过这一关
    pub fn check_live(&self) -> Result<(), SagaError> {
        if self.cancel.is_cancelled() {
            Err(SagaError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 请求状态转移：更新 Saga 快照、记录进度阶段、替换通知消息
    pub async fn enter(&self, next: SagaState, message: &str) -> Result<(), SagaError> {
        self.check_live()?;
        {
            let mut saga = self.saga.write().await;
            if !saga.state.can_advance_to(next) {
                tracing::warn!(
                    saga_id = %saga.id,
                    from = ?saga.state,
                    to = ?next,
                    "ignoring non-monotonic transition"
                );
                return Ok(());
            }
            saga.state = next;
        }
        self.store
            .set_progress(&self.local_id, &format!("{:?}", next))
            .await;
        self.notifier.update(&self.correlation_id, message);
        Ok(())
    }

    /// 可取消的 sleep：取消时立即返回 Cancelled 而不是睡满
    pub async fn sleep(&self, duration: Duration) -> Result<(), SagaError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(SagaError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// 步骤执行器 trait：执行一步，产出写入 FlowData 与步骤结果
#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn kind(&self) -> StepKind;

    async fn execute(
        &self,
        ctx: &StepCtx,
        flow: &mut FlowData,
    ) -> Result<serde_json::Value, SagaError>;
}

/// TxHandle 的步骤结果表示
pub(crate) fn tx_result(handle: &TxHandle) -> serde_json::Value {
    serde_json::json!({ "tx_hash": handle.tx_hash })
}
