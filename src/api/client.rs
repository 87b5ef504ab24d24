//! 链下后端 HTTP 客户端（reqwest）
//!
//! 所有请求走统一信封解析；网络错误与后端业务错误都折叠为字符串，
//! 由上层步骤决定重试或终止。

use async_trait::async_trait;
use reqwest::Client;

use crate::api::types::{
    AgentDetail, AgentSummary, Envelope, GenerateData, GenerateRequest, QuestionEntry,
};
use crate::api::OffchainApi;

/// HTTP 客户端：持有 base_url 与带超时的 reqwest::Client
pub struct HttpOffchainClient {
    client: Client,
    base_url: String,
}

impl HttpOffchainClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// 解析响应：HTTP 非 2xx 或信封 code != 200 均为错误
    async fn decode<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, String> {
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        let envelope: Envelope<T> = resp.json().await.map_err(|e| e.to_string())?;
        envelope.into_data()
    }
}

#[async_trait]
impl OffchainApi for HttpOffchainClient {
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateData, String> {
        let file_part = reqwest::multipart::Part::bytes(req.file_bytes)
            .file_name(req.file_name)
            .mime_str("text/plain")
            .map_err(|e| e.to_string())?;
        let form = reqwest::multipart::Form::new()
            .text("name", req.name)
            .text("description", req.description)
            .text("creator_address", req.creator_address)
            .part("file", file_part);

        let resp = self
            .client
            .post(self.url("agent/generate"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::decode(resp).await
    }

    async fn finalize_on_chain(&self, cid: &str) -> Result<(), String> {
        let resp = self
            .client
            .put(self.url("agent/on_chain"))
            .query(&[("cid", cid)])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        // on_chain 没有 data，信封里只有 code/message
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        let envelope: Envelope<serde_json::Value> =
            resp.json().await.map_err(|e| e.to_string())?;
        if envelope.code != 200 {
            return Err(if envelope.message.is_empty() {
                format!("backend code {}", envelope.code)
            } else {
                envelope.message
            });
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<AgentSummary>, String> {
        let resp = self
            .client
            .get(self.url("agent/list"))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Self::decode(resp).await
    }

    async fn detail(&self, cid: &str) -> Result<AgentDetail, String> {
        let resp = self
            .client
            .get(self.url("agent/detail"))
            .query(&[("cid", cid)])
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let detail: AgentDetail = Self::decode(resp).await?;
        Ok(detail)
    }
}

// QuestionEntry 在轮询谓词里按提交原文严格相等匹配，这里集中提供谓词，
// 避免调用方各写一份比较逻辑
pub fn question_matches(entry: &QuestionEntry, submitted: &str) -> bool {
    entry.question == submitted
}
