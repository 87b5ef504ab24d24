//! 记录式通知器（用于测试）
//!
//! 按 correlation id 保存「当前消息」与完整历史，便于断言原地替换语义
//! （任一时刻每个 id 只有一条可见消息）。

use std::collections::HashMap;
use std::sync::Mutex;

use crate::notify::{Notifier, NotifyOutcome};

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    current: Mutex<HashMap<String, String>>,
    history: Mutex<Vec<(String, String)>>,
    resolved: Mutex<HashMap<String, NotifyOutcome>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某 id 当前可见的唯一消息
    pub fn current(&self, correlation_id: &str) -> Option<String> {
        self.current.lock().unwrap().get(correlation_id).cloned()
    }

    /// 某 id 历史上收到过的全部 update（按序）
    pub fn updates_for(&self, correlation_id: &str) -> Vec<String> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == correlation_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn outcome(&self, correlation_id: &str) -> Option<NotifyOutcome> {
        self.resolved.lock().unwrap().get(correlation_id).cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn update(&self, correlation_id: &str, message: &str) {
        self.current
            .lock()
            .unwrap()
            .insert(correlation_id.to_string(), message.to_string());
        self.history
            .lock()
            .unwrap()
            .push((correlation_id.to_string(), message.to_string()));
    }

    fn resolve(&self, correlation_id: &str, outcome: NotifyOutcome) {
        self.current.lock().unwrap().remove(correlation_id);
        self.resolved
            .lock()
            .unwrap()
            .insert(correlation_id.to_string(), outcome);
    }
}
