//! Mock 账本客户端（用于测试，无需链）
//!
//! submit / 确认结果可脚本化，可注入确认延迟以模拟在飞窗口。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::ledger::{LedgerCall, LedgerClient, TxHandle, TxOutcome};

/// Mock 客户端：按顺序出队脚本化结果，默认一路成功
#[derive(Default)]
pub struct MockLedgerClient {
    submit_outcomes: Mutex<VecDeque<Result<TxHandle, String>>>,
    confirm_outcomes: Mutex<VecDeque<TxOutcome>>,
    confirmation_delay: Option<Duration>,
    /// 收到的调用（供测试断言参数）
    pub submitted: Mutex<Vec<LedgerCall>>,
    pub submit_calls: AtomicUsize,
}

impl MockLedgerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submit_outcomes(self, outcomes: Vec<Result<TxHandle, String>>) -> Self {
        *self.submit_outcomes.lock().unwrap() = outcomes.into();
        self
    }

    pub fn with_confirm_outcomes(self, outcomes: Vec<TxOutcome>) -> Self {
        *self.confirm_outcomes.lock().unwrap() = outcomes.into();
        self
    }

    /// 每次确认前先等待 delay（让测试里有稳定的在飞窗口）
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = Some(delay);
        self
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn submit(&self, call: LedgerCall) -> Result<TxHandle, String> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(call);
        match self.submit_outcomes.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(TxHandle {
                tx_hash: format!("0x{}", uuid::Uuid::new_v4().simple()),
            }),
        }
    }

    async fn await_confirmation(&self, handle: &TxHandle, _confirmations: u32) -> TxOutcome {
        if let Some(delay) = self.confirmation_delay {
            tokio::time::sleep(delay).await;
        }
        match self.confirm_outcomes.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => TxOutcome::Confirmed {
                tx_hash: handle.tx_hash.clone(),
            },
        }
    }
}
