//! 核心层：Saga 数据模型、协调器、生命周期监管、错误

pub mod coordinator;
pub mod error;
pub mod saga;
pub mod supervisor;

pub use coordinator::{AskQuestionInput, CreateAgentInput, SagaCoordinator};
pub use error::SagaError;
pub use saga::{Saga, SagaId, SagaKind, SagaState, Step, StepKind, StepStatus};
pub use supervisor::SagaSupervisor;
