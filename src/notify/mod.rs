//! 进度通知端口
//!
//! 每个 Saga 实例对应一条进度消息，以 correlation id 寻址，原地替换而不是
//! 叠加新条目；终态时 resolve 一次。呈现层（toast、状态栏、TUI）只需实现
//! 这个 trait，协调器不感知任何渲染细节。

pub mod mock;

pub use mock::RecordingNotifier;

/// 终态通知
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    Success(String),
    Failure(String),
}

/// 通知端口：update 替换进行中消息，resolve 给出终局
pub trait Notifier: Send + Sync {
    fn update(&self, correlation_id: &str, message: &str);
    fn resolve(&self, correlation_id: &str, outcome: NotifyOutcome);
}

/// 日志通知器：把进度写进结构化日志（无 UI 场景的默认实现）
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn update(&self, correlation_id: &str, message: &str) {
        tracing::info!(correlation_id, message, "saga progress");
    }

    fn resolve(&self, correlation_id: &str, outcome: NotifyOutcome) {
        match outcome {
            NotifyOutcome::Success(message) => {
                tracing::info!(correlation_id, %message, "saga resolved");
            }
            NotifyOutcome::Failure(message) => {
                tracing::error!(correlation_id, %message, "saga resolved");
            }
        }
    }
}
