//! 面向视图层的运行时封装
//!
//! 建立 cmd/state 双通道：视图把用户动作发进 cmd，后台任务调用协调器并在
//! 每次变化后把乐观记录列表、读侧数据与锁态投影到 state。视图层不持锁、
//! 不触碰协调器内部，销毁时发一条 Teardown 即可。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::api::types::{AgentDetail, AgentSummary};
use crate::api::HttpOffchainClient;
use crate::config::load_config;
use crate::core::{AskQuestionInput, CreateAgentInput, SagaCoordinator};
use crate::ledger::LedgerClient;
use crate::notify::Notifier;
use crate::store::{OptimisticRecord, OptimisticRecordStore};

/// 从视图发往运行时的命令
#[derive(Debug)]
pub enum Command {
    /// 铸造分身
    CreateAgent(CreateAgentInput),
    /// 向分身提问
    AskQuestion(AskQuestionInput),
    /// 取消指定 Saga
    CancelSaga(String),
    /// 揭示效果渲染完毕，清除一次性标志
    ClearReveal(String),
    /// 拉取权威分身列表
    RefreshAgents,
    /// 进入聊天视图时加载分身详情（含问答列表）
    LoadAgent(String),
    /// 内部：某 Saga 到达终态（由完成监视任务发回）
    SagaSettled(String),
    /// 宿主视图销毁
    Teardown,
}

/// 视图投影状态
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// 乐观记录（最新在前）
    pub records: Vec<OptimisticRecord>,
    /// 权威分身列表（RefreshAgents 后有值）
    pub agents: Vec<AgentSummary>,
    /// 当前分身详情（LoadAgent 后有值）
    pub agent: Option<AgentDetail>,
    /// 有 Saga 在飞时锁住提交入口
    pub input_locked: bool,
    pub error_message: Option<String>,
}

/// 组装默认运行时：加载配置，HTTP 链下客户端 + 传入的账本/通知实现
pub async fn create_runtime(
    config_path: Option<PathBuf>,
    ledger: Arc<dyn LedgerClient>,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<(mpsc::UnboundedSender<Command>, watch::Receiver<ViewState>)> {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        crate::config::AppConfig::default()
    });

    let api = Arc::new(HttpOffchainClient::new(
        &cfg.api.base_url,
        cfg.api.request_timeout_secs,
    ));
    let store = Arc::new(OptimisticRecordStore::new());
    let coordinator = Arc::new(SagaCoordinator::new(api, ledger, notifier, store, cfg));
    Ok(create_runtime_with(coordinator))
}

/// 用现成的协调器组装运行时（测试与自定义端口走这里）
pub fn create_runtime_with(
    coordinator: Arc<SagaCoordinator>,
) -> (mpsc::UnboundedSender<Command>, watch::Receiver<ViewState>) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(ViewState::default());

    // 循环内部只持弱引用，嵌入方丢弃发送端时通道能正常关闭
    let loop_tx = cmd_tx.downgrade();
    tokio::spawn(async move {
        let store = coordinator.store();
        let mut agents: Vec<AgentSummary> = Vec::new();
        let mut agent: Option<AgentDetail> = None;
        let mut error_message: Option<String> = None;
        let mut in_flight: usize = 0;

        loop {
            let Some(cmd) = cmd_rx.recv().await else {
                // 所有发送端关闭，视同销毁
                coordinator.teardown();
                break;
            };
            match cmd {
                Command::CreateAgent(input) => {
                    match coordinator.start_create_agent(input).await {
                        Ok(saga_id) => {
                            error_message = None;
                            in_flight += 1;
                            watch_settlement(&coordinator, &loop_tx, saga_id);
                        }
                        Err(e) => error_message = Some(e.to_string()),
                    }
                }
                Command::AskQuestion(input) => {
                    match coordinator.start_ask_question(input).await {
                        Ok(saga_id) => {
                            error_message = None;
                            in_flight += 1;
                            watch_settlement(&coordinator, &loop_tx, saga_id);
                        }
                        Err(e) => error_message = Some(e.to_string()),
                    }
                }
                Command::CancelSaga(saga_id) => {
                    coordinator.cancel(&saga_id).await;
                }
                Command::ClearReveal(local_id) => {
                    store.clear_newly_completed(&local_id).await;
                }
                Command::RefreshAgents => match coordinator.offchain().list().await {
                    Ok(list) => {
                        agents = list;
                        error_message = None;
                    }
                    Err(e) => error_message = Some(e),
                },
                Command::LoadAgent(cid) => match coordinator.offchain().detail(&cid).await {
                    Ok(detail) => {
                        agent = Some(detail);
                        error_message = None;
                    }
                    Err(e) => error_message = Some(e),
                },
                Command::SagaSettled(saga_id) => {
                    in_flight = in_flight.saturating_sub(1);
                    if let Some(saga) = coordinator.get_state(&saga_id).await {
                        error_message = saga.last_error;
                    }
                }
                Command::Teardown => {
                    coordinator.teardown();
                    let _ = state_tx.send(ViewState {
                        records: store.snapshot().await,
                        agents: std::mem::take(&mut agents),
                        agent: agent.take(),
                        input_locked: false,
                        error_message: error_message.take(),
                    });
                    break;
                }
            }

            let _ = state_tx.send(ViewState {
                records: store.snapshot().await,
                agents: agents.clone(),
                agent: agent.clone(),
                input_locked: in_flight > 0,
                error_message: error_message.clone(),
            });
        }
    });

    (cmd_tx, state_rx)
}

/// 监视 Saga 终态，把结算事件发回命令循环
fn watch_settlement(
    coordinator: &Arc<SagaCoordinator>,
    cmd_tx: &mpsc::WeakUnboundedSender<Command>,
    saga_id: String,
) {
    let coordinator = Arc::clone(coordinator);
    let cmd_tx = cmd_tx.clone();
    tokio::spawn(async move {
        coordinator.wait(&saga_id).await;
        if let Some(tx) = cmd_tx.upgrade() {
            let _ = tx.send(Command::SagaSettled(saga_id));
        }
    });
}
