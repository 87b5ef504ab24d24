//! 轮询步骤
//!
//! 交易确认后，反复拉取分身详情直到提交的问题出现在权威问答列表里。
//! 匹配是对提交原文的严格逐字节相等。每个 tick 只读；单次拉取失败跳过
//! 该 tick，轮询只会因命中、取消或超时而结束。超时后不自动重试：
//! 后端可能仍在异步生成，再发一轮强制轮询不改变根因，提示用户刷新。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::api::client::question_matches;
use crate::api::OffchainApi;
use crate::core::error::SagaError;
use crate::core::saga::{SagaState, StepKind};
use crate::steps::{FlowData, StepCtx, StepExecutor};

/// 轮询节奏：间隔与总预算都来自配置
#[derive(Debug, Clone, Copy)]
pub struct PollSpec {
    pub interval: Duration,
    pub timeout: Duration,
}

pub struct PollStep {
    api: Arc<dyn OffchainApi>,
    cid: String,
    /// Saga 启动时提交的问题原文（匹配基准）
    expected_question: String,
    spec: PollSpec,
}

impl PollStep {
    pub fn new(
        api: Arc<dyn OffchainApi>,
        cid: String,
        expected_question: String,
        spec: PollSpec,
    ) -> Self {
        Self {
            api,
            cid,
            expected_question,
            spec,
        }
    }
}

#[async_trait]
impl StepExecutor for PollStep {
    fn kind(&self) -> StepKind {
        StepKind::Poll
    }

    async fn execute(
        &self,
        ctx: &StepCtx,
        flow: &mut FlowData,
    ) -> Result<serde_json::Value, SagaError> {
        ctx.enter(
            SagaState::Polling,
            "Transaction confirmed! Polling for backend update...",
        )
        .await?;

        let started = Instant::now();
        let mut ticks: u32 = 0;
        loop {
            // 超时判定在 tick 前后各做一次：间隔大于剩余预算时不再多拉一轮
            if started.elapsed() >= self.spec.timeout {
                return Err(SagaError::PollTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            ctx.sleep(self.spec.interval).await?;
            if started.elapsed() >= self.spec.timeout {
                return Err(SagaError::PollTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            ticks += 1;
            match self.api.detail(&self.cid).await {
                Ok(detail) => {
                    ctx.check_live()?;
                    if let Some(entry) = detail
                        .questions
                        .iter()
                        .find(|q| question_matches(q, &self.expected_question))
                    {
                        tracing::debug!(cid = %self.cid, ticks, question_id = entry.id, "answer observed");
                        let result =
                            serde_json::json!({ "question_id": entry.id, "ticks": ticks });
                        flow.matched = Some(entry.clone());
                        return Ok(result);
                    }
                }
                Err(e) => {
                    ctx.check_live()?;
                    // 只读查询失败不终止轮询，跳过本 tick
                    tracing::warn!(cid = %self.cid, ticks, error = %e, "poll tick failed");
                }
            }
        }
    }
}
