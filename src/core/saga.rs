//! Saga 数据模型
//!
//! 一次用户动作对应一个 Saga 实例：有序步骤列表 + 单一显式状态机。
//! 旧式「submitting / pending / confirming 布尔散落一地」在这里收敛为
//! SagaState 一个枚举，协调器是唯一的写入方。

use serde::Serialize;

pub type SagaId = String;
pub type CorrelationId = String;

/// Saga 种类：铸造分身 / 向分身提问
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SagaKind {
    CreateAgent,
    AskQuestion,
}

/// Saga 状态机
///
/// CreateAgent: Idle → SubmittingOffchain → AwaitingWalletConfirmation
///   → AwaitingChainConfirmation → Finalizing → Succeeded | Failed
/// AskQuestion: Idle → AwaitingWalletConfirmation → AwaitingChainConfirmation
///   → Polling → Succeeded | Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SagaState {
    Idle,
    SubmittingOffchain,
    AwaitingWalletConfirmation,
    AwaitingChainConfirmation,
    Finalizing,
    Polling,
    Succeeded,
    Failed,
}

impl SagaState {
    /// 状态只能单调前进；唯一的「向后」转移是进入终态 Failed
    pub fn can_advance_to(self, next: SagaState) -> bool {
        if self == SagaState::Succeeded || self == SagaState::Failed {
            return false;
        }
        if next == SagaState::Failed {
            return true;
        }
        Self::rank(next) > Self::rank(self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SagaState::Succeeded | SagaState::Failed)
    }

    fn rank(state: SagaState) -> u8 {
        match state {
            SagaState::Idle => 0,
            SagaState::SubmittingOffchain => 1,
            SagaState::AwaitingWalletConfirmation => 2,
            SagaState::AwaitingChainConfirmation => 3,
            SagaState::Finalizing => 4,
            SagaState::Polling => 4,
            SagaState::Succeeded => 5,
            SagaState::Failed => 5,
        }
    }
}

/// 步骤种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepKind {
    OffchainSubmit,
    LedgerTransaction,
    Finalize,
    Poll,
}

/// 步骤状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Saga 中的单个步骤：执行状态 + 不透明结果
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub kind: StepKind,
    pub status: StepStatus,
    /// 步骤产出（cid、交易哈希等），对协调器不透明
    pub result: Option<serde_json::Value>,
    /// 是否允许在同一 Saga 内重试（目前只有幂等的 Finalize 为 true）
    pub retryable: bool,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            status: StepStatus::Pending,
            result: None,
            retryable: matches!(kind, StepKind::Finalize),
        }
    }
}

/// Saga 实例快照（get_state 返回的只读视图）
#[derive(Debug, Clone, Serialize)]
pub struct Saga {
    pub id: SagaId,
    pub kind: SagaKind,
    pub steps: Vec<Step>,
    pub current_step: usize,
    pub state: SagaState,
    pub correlation_id: CorrelationId,
    /// 创建时间（毫秒时间戳）
    pub created_at: i64,
    pub last_error: Option<String>,
}

impl Saga {
    pub fn new(kind: SagaKind) -> Self {
        let steps = match kind {
            SagaKind::CreateAgent => vec![
                Step::new(StepKind::OffchainSubmit),
                Step::new(StepKind::LedgerTransaction),
                Step::new(StepKind::Finalize),
            ],
            SagaKind::AskQuestion => vec![
                Step::new(StepKind::LedgerTransaction),
                Step::new(StepKind::Poll),
            ],
        };
        Self {
            id: format!("saga_{}", uuid::Uuid::new_v4()),
            kind,
            steps,
            current_step: 0,
            state: SagaState::Idle,
            correlation_id: format!("op_{}", uuid::Uuid::new_v4()),
            created_at: chrono::Utc::now().timestamp_millis(),
            last_error: None,
        }
    }
}
