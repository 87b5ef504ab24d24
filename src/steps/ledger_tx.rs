//! 账本交易步骤
//!
//! 一步跨两个等待点：先等钱包签名（submit），再等链上确认。拒签与回滚都是
//! Saga 终态；重入由协调器的在飞守卫挡在 start 入口，这里不排队。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::SagaError;
use crate::core::saga::{SagaState, StepKind};
use crate::ledger::{LedgerCall, LedgerClient, TxOutcome};
use crate::steps::{tx_result, FlowData, StepCtx, StepExecutor};

/// 调用构造计划：注册调用的 cid/operator 要等链下提交产出后才知道
#[derive(Debug, Clone)]
pub enum CallPlan {
    /// registerAgent：参数取自 FlowData 里的 generate 产出
    RegisterFromGenerate { price_wei: u128 },
    /// askQuestion：参数在 Saga 启动时即已齐备
    Ask {
        cid: String,
        question_content: String,
        payment_wei: u128,
    },
}

pub struct LedgerTransactionStep {
    ledger: Arc<dyn LedgerClient>,
    plan: CallPlan,
    confirmations: u32,
    /// 钱包等待阶段的通知文案（两类 Saga 不同）
    wallet_message: &'static str,
    confirm_message: &'static str,
}

impl LedgerTransactionStep {
    pub fn for_register(ledger: Arc<dyn LedgerClient>, price_wei: u128, confirmations: u32) -> Self {
        Self {
            ledger,
            plan: CallPlan::RegisterFromGenerate { price_wei },
            confirmations,
            wallet_message: "Step 2/3: Awaiting wallet confirmation...",
            confirm_message: "Step 2/3: Waiting for on-chain confirmation...",
        }
    }

    pub fn for_ask(
        ledger: Arc<dyn LedgerClient>,
        cid: String,
        question_content: String,
        payment_wei: u128,
        confirmations: u32,
    ) -> Self {
        Self {
            ledger,
            plan: CallPlan::Ask {
                cid,
                question_content,
                payment_wei,
            },
            confirmations,
            wallet_message: "Sending transaction... Please check your wallet.",
            confirm_message: "Waiting for transaction confirmation...",
        }
    }

    fn build_call(&self, flow: &FlowData) -> Result<LedgerCall, SagaError> {
        match &self.plan {
            CallPlan::RegisterFromGenerate { price_wei } => {
                let data = flow.generate.as_ref().ok_or_else(|| {
                    SagaError::OffchainSubmit("no off-chain submission result".into())
                })?;
                Ok(LedgerCall::RegisterAgent {
                    cid: data.cid.clone(),
                    operator: data.agent_address.clone(),
                    name: data.name.clone(),
                    description: data.description.clone(),
                    price_wei: *price_wei,
                })
            }
            CallPlan::Ask {
                cid,
                question_content,
                payment_wei,
            } => Ok(LedgerCall::AskQuestion {
                cid: cid.clone(),
                question_content: question_content.clone(),
                payment_wei: *payment_wei,
            }),
        }
    }
}

#[async_trait]
impl StepExecutor for LedgerTransactionStep {
    fn kind(&self) -> StepKind {
        StepKind::LedgerTransaction
    }

    async fn execute(
        &self,
        ctx: &StepCtx,
        flow: &mut FlowData,
    ) -> Result<serde_json::Value, SagaError> {
        let call = self.build_call(flow)?;

        ctx.enter(SagaState::AwaitingWalletConfirmation, self.wallet_message)
            .await?;
        let handle = self
            .ledger
            .submit(call)
            .await
            .map_err(SagaError::WalletRejected)?;
        ctx.check_live()?;

        ctx.enter(SagaState::AwaitingChainConfirmation, self.confirm_message)
            .await?;
        let outcome = self
            .ledger
            .await_confirmation(&handle, self.confirmations)
            .await;
        ctx.check_live()?;

        match outcome {
            TxOutcome::Confirmed { tx_hash } => {
                tracing::debug!(%tx_hash, "transaction confirmed");
                flow.tx_hash = Some(tx_hash);
                Ok(tx_result(&handle))
            }
            TxOutcome::Reverted { reason } => Err(SagaError::ChainReverted(reason)),
        }
    }
}
