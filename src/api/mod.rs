//! 链下 API 端口与实现
//!
//! 所有实现（HTTP / Mock）实现 OffchainApi：generate（上传知识库，换取 cid）、
//! finalize_on_chain（幂等终结）、list / detail（权威读侧）。

pub mod client;
pub mod mock;
pub mod types;

use async_trait::async_trait;

pub use client::HttpOffchainClient;
pub use mock::MockOffchainApi;
pub use types::{AgentDetail, AgentSummary, GenerateData, GenerateRequest, QuestionEntry};

/// 链下 API trait：四个操作都可能独立失败，错误以字符串描述向上传递
#[async_trait]
pub trait OffchainApi: Send + Sync {
    /// 上传知识库与元数据，后端生成内容引用（cid）与分身地址
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateData, String>;

    /// 告知后端链上登记已确认；后端按 upsert 处理，重复调用安全
    async fn finalize_on_chain(&self, cid: &str) -> Result<(), String>;

    /// 权威分身列表
    async fn list(&self) -> Result<Vec<AgentSummary>, String>;

    /// 单个分身详情（含全量问答列表，轮询步骤每个 tick 调用且只读）
    async fn detail(&self, cid: &str) -> Result<AgentDetail, String>;
}
