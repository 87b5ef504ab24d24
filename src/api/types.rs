//! 链下 API 的请求 / 响应类型
//!
//! 后端统一信封：{code, message, data}；HTTP 2xx 但 code != 200 同样算失败。

use serde::{Deserialize, Serialize};

/// 统一响应信封
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// code == 200 时取出 data，否则返回后端给的 message
    pub fn into_data(self) -> Result<T, String> {
        if self.code != 200 {
            return Err(if self.message.is_empty() {
                format!("backend code {}", self.code)
            } else {
                self.message
            });
        }
        self.data.ok_or_else(|| "missing data in response".to_string())
    }
}

/// generate 请求：知识库文件以 multipart 上传
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub name: String,
    pub description: String,
    pub file_name: String,
    pub file_bytes: Vec<u8>,
    pub creator_address: String,
}

/// generate 响应数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateData {
    pub cid: String,
    pub agent_address: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// list 条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: i64,
    pub cid: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub agent_address: String,
}

/// detail 响应数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDetail {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub agent_address: String,
    #[serde(default)]
    pub questions: Vec<QuestionEntry>,
}

/// 已索引的问答条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub id: i64,
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub answer_cid: String,
    #[serde(default)]
    pub transaction_hash: String,
}
