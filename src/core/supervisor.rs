//! Saga 生命周期监管：取消令牌
//!
//! 根 token 归宿主视图所有，视图销毁时 cancel 一次即可作废全部在飞 Saga；
//! 每个 Saga 持有子 token，单独取消互不影响。定时器醒来后必须先检查 token
//! 再碰任何共享状态，迟到的 tick 只能是 no-op。

use tokio_util::sync::CancellationToken;

/// 视图级生命周期管理：根取消令牌与按 Saga 的子令牌
#[derive(Debug)]
pub struct SagaSupervisor {
    root: CancellationToken,
}

impl SagaSupervisor {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
        }
    }

    /// 宿主视图销毁：作废所有在飞 Saga
    pub fn teardown(&self) {
        self.root.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// 为单个 Saga 创建子 token（单独取消不影响其它 Saga）
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }
}

impl Default for SagaSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
