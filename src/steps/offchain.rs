//! 链下提交步骤
//!
//! 上传知识库与元数据，换取内容引用（cid）与分身地址。此步骤失败时还没有
//! 任何账本交互，直接终止 Saga 即可，用户重新提交不需要任何补偿。

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::types::GenerateRequest;
use crate::api::OffchainApi;
use crate::core::error::SagaError;
use crate::core::saga::{SagaState, StepKind};
use crate::steps::{FlowData, StepCtx, StepExecutor};

pub struct OffchainSubmitStep {
    api: Arc<dyn OffchainApi>,
    request: GenerateRequest,
}

impl OffchainSubmitStep {
    pub fn new(api: Arc<dyn OffchainApi>, request: GenerateRequest) -> Self {
        Self { api, request }
    }
}

#[async_trait]
impl StepExecutor for OffchainSubmitStep {
    fn kind(&self) -> StepKind {
        StepKind::OffchainSubmit
    }

    async fn execute(
        &self,
        ctx: &StepCtx,
        flow: &mut FlowData,
    ) -> Result<serde_json::Value, SagaError> {
        ctx.enter(
            SagaState::SubmittingOffchain,
            "Step 1/3: Uploading knowledge base...",
        )
        .await?;

        let data = self
            .api
            .generate(self.request.clone())
            .await
            .map_err(SagaError::OffchainSubmit)?;
        ctx.check_live()?;

        tracing::debug!(cid = %data.cid, agent_address = %data.agent_address, "off-chain submit accepted");
        let result = serde_json::json!({
            "cid": data.cid,
            "agent_address": data.agent_address,
        });
        flow.generate = Some(data);
        Ok(result)
    }
}
