//! 终结步骤
//!
//! 链上登记确认后通知后端（PUT on_chain）。此时账本效果已经落账，
//! 不能像前面的步骤那样一错就放弃：在退避预算内反复重试同一调用
//! （后端按 upsert 处理，重复调用安全）；预算耗尽则以 FinalizePartial
//! 收场，和普通失败区分开。

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::OffchainApi;
use crate::config::SagaSection;
use crate::core::error::SagaError;
use crate::core::saga::{SagaState, StepKind};
use crate::steps::{FlowData, StepCtx, StepExecutor};

pub struct FinalizeStep {
    api: Arc<dyn OffchainApi>,
    saga_cfg: SagaSection,
}

impl FinalizeStep {
    pub fn new(api: Arc<dyn OffchainApi>, saga_cfg: SagaSection) -> Self {
        Self { api, saga_cfg }
    }
}

#[async_trait]
impl StepExecutor for FinalizeStep {
    fn kind(&self) -> StepKind {
        StepKind::Finalize
    }

    async fn execute(
        &self,
        ctx: &StepCtx,
        flow: &mut FlowData,
    ) -> Result<serde_json::Value, SagaError> {
        let cid = flow
            .generate
            .as_ref()
            .map(|d| d.cid.clone())
            .ok_or_else(|| SagaError::OffchainSubmit("no off-chain submission result".into()))?;

        ctx.enter(SagaState::Finalizing, "Step 3/3: Finalizing registration...")
            .await?;

        let max_attempts = self.saga_cfg.finalize_max_retries.saturating_add(1);
        let mut last_err = String::new();
        for attempt in 0..max_attempts {
            if attempt > 0 {
                ctx.sleep(self.saga_cfg.finalize_backoff(attempt - 1)).await?;
            }
            match self.api.finalize_on_chain(&cid).await {
                Ok(()) => {
                    ctx.check_live()?;
                    return Ok(serde_json::json!({ "cid": cid, "attempts": attempt + 1 }));
                }
                Err(e) => {
                    ctx.check_live()?;
                    tracing::warn!(%cid, attempt, error = %e, "finalize attempt failed");
                    last_err = e;
                }
            }
        }

        Err(SagaError::FinalizePartial {
            cid,
            attempts: max_attempts,
            message: last_err,
        })
    }
}
