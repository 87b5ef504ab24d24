//! Mock 链下 API（用于测试，无需后端）
//!
//! 各操作的响应可脚本化：generate 固定成败、finalize 按调用顺序出队、
//! detail 按快照序列出队（耗尽后重复最后一份，模拟后端逐步追上索引）。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::types::{AgentDetail, AgentSummary, GenerateData, GenerateRequest};
use crate::api::OffchainApi;

/// Mock 客户端：脚本化响应 + 调用计数
#[derive(Default)]
pub struct MockOffchainApi {
    generate_response: Mutex<Option<Result<GenerateData, String>>>,
    finalize_outcomes: Mutex<VecDeque<Result<(), String>>>,
    detail_snapshots: Mutex<VecDeque<AgentDetail>>,
    list_response: Mutex<Vec<AgentSummary>>,
    pub generate_calls: AtomicUsize,
    pub finalize_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
}

impl MockOffchainApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generate(self, result: Result<GenerateData, String>) -> Self {
        *self.generate_response.lock().unwrap() = Some(result);
        self
    }

    /// 依次出队；耗尽后一律 Ok
    pub fn with_finalize_outcomes(self, outcomes: Vec<Result<(), String>>) -> Self {
        *self.finalize_outcomes.lock().unwrap() = outcomes.into();
        self
    }

    /// 依次出队；耗尽后重复最后一份
    pub fn with_detail_snapshots(self, snapshots: Vec<AgentDetail>) -> Self {
        *self.detail_snapshots.lock().unwrap() = snapshots.into();
        self
    }

    pub fn with_list(self, agents: Vec<AgentSummary>) -> Self {
        *self.list_response.lock().unwrap() = agents;
        self
    }
}

#[async_trait]
impl OffchainApi for MockOffchainApi {
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateData, String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        match self.generate_response.lock().unwrap().clone() {
            Some(result) => result,
            // 未脚本化时回显请求内容
            None => Ok(GenerateData {
                cid: format!("cid-{}", req.name.to_lowercase()),
                agent_address: "0xmockagent".into(),
                name: req.name,
                description: req.description,
            }),
        }
    }

    async fn finalize_on_chain(&self, _cid: &str) -> Result<(), String> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        self.finalize_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn list(&self) -> Result<Vec<AgentSummary>, String> {
        Ok(self.list_response.lock().unwrap().clone())
    }

    async fn detail(&self, _cid: &str) -> Result<AgentDetail, String> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self.detail_snapshots.lock().unwrap();
        if snapshots.len() > 1 {
            Ok(snapshots.pop_front().unwrap())
        } else {
            snapshots
                .front()
                .cloned()
                .ok_or_else(|| "no detail scripted".to_string())
        }
    }
}
