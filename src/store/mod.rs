//! 乐观记录仓库
//!
//! Saga 进行期间，用户先在本地看到「正在铸造的分身 / 正在提问的问题」。
//! 记录与 Saga 同生共死：start 时原子插入，终态时要么对账成权威数据、
//! 要么整条回滚，绝不允许 Saga 结束后还留着 Loading 的孤儿。
//!
//! 列表按最新在前排序，只通过 insert / reconcile / rollback 三个原子操作
//! 变更成员，reveal 标志由消费方 clear_newly_completed 一次性清除。

use serde::Serialize;
use tokio::sync::RwLock;

pub type LocalId = String;

/// 记录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordStatus {
    /// Saga 在飞，数据未经权威确认
    Loading,
    /// 已对账为权威数据
    Complete,
    /// 终态失败（仅在回滚前短暂可见）
    Failed,
}

/// 记录载荷：铸造中的分身或提问中的问题
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RecordPayload {
    Agent {
        name: String,
        description: String,
        cid: Option<String>,
        agent_address: Option<String>,
    },
    Question {
        cid: String,
        question: String,
        answer: Option<String>,
        answer_cid: Option<String>,
        transaction_hash: Option<String>,
    },
}

/// 本地乐观记录
#[derive(Debug, Clone, Serialize)]
pub struct OptimisticRecord {
    pub local_id: LocalId,
    /// 权威侧 id，对账后才有
    pub authoritative_id: Option<String>,
    pub payload: RecordPayload,
    pub status: RecordStatus,
    /// 当前进度阶段（Saga 状态的展示文本）
    pub progress_stage: String,
    /// 一次性 reveal 标志：对账时置位，消费方渲染完揭示效果后清除
    pub is_newly_completed: bool,
    /// 创建时间（毫秒时间戳）
    pub created_at: i64,
}

impl OptimisticRecord {
    pub fn new(payload: RecordPayload) -> Self {
        Self {
            local_id: format!("rec_{}", uuid::Uuid::new_v4()),
            authoritative_id: None,
            payload,
            status: RecordStatus::Loading,
            progress_stage: String::new(),
            is_newly_completed: false,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// 最新在前
    records: Vec<OptimisticRecord>,
    active: Option<LocalId>,
}

/// 乐观记录仓库：最新在前的有序列表 + 当前活跃视图
#[derive(Debug, Default)]
pub struct OptimisticRecordStore {
    inner: RwLock<Inner>,
}

impl OptimisticRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 头插并标记为活跃视图
    pub async fn insert(&self, record: OptimisticRecord) {
        let mut inner = self.inner.write().await;
        inner.active = Some(record.local_id.clone());
        inner.records.insert(0, record);
    }

    /// 原地对账：保持列表位置，写入权威数据，置位 reveal 标志
    pub async fn reconcile(
        &self,
        local_id: &str,
        authoritative_id: Option<String>,
        payload: RecordPayload,
    ) {
        let mut inner = self.inner.write().await;
        if let Some(rec) = inner.records.iter_mut().find(|r| r.local_id == local_id) {
            rec.authoritative_id = authoritative_id;
            rec.payload = payload;
            rec.status = RecordStatus::Complete;
            rec.is_newly_completed = true;
        }
    }

    /// 整条移除；若它是活跃视图，回退到剩余的最新一条
    pub async fn rollback(&self, local_id: &str) {
        let mut inner = self.inner.write().await;
        inner.records.retain(|r| r.local_id != local_id);
        if inner.active.as_deref() == Some(local_id) {
            inner.active = inner.records.first().map(|r| r.local_id.clone());
        }
    }

    /// 更新进度阶段文本（不改变列表成员）
    pub async fn set_progress(&self, local_id: &str, stage: &str) {
        let mut inner = self.inner.write().await;
        if let Some(rec) = inner.records.iter_mut().find(|r| r.local_id == local_id) {
            rec.progress_stage = stage.to_string();
        }
    }

    /// 消费方渲染完揭示效果后调用，清除一次性标志
    pub async fn clear_newly_completed(&self, local_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(rec) = inner.records.iter_mut().find(|r| r.local_id == local_id) {
            rec.is_newly_completed = false;
        }
    }

    pub async fn get(&self, local_id: &str) -> Option<OptimisticRecord> {
        self.inner
            .read()
            .await
            .records
            .iter()
            .find(|r| r.local_id == local_id)
            .cloned()
    }

    /// 活跃视图对应的记录
    pub async fn active(&self) -> Option<OptimisticRecord> {
        let inner = self.inner.read().await;
        let id = inner.active.as_deref()?;
        inner.records.iter().find(|r| r.local_id == id).cloned()
    }

    /// 全量快照（最新在前），供视图投影
    pub async fn snapshot(&self) -> Vec<OptimisticRecord> {
        self.inner.read().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}
