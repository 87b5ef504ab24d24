//! Saga 协调器
//!
//! 唯一的 Saga 状态写入方。start 时原子地创建 Saga 与乐观记录并注册在飞
//! 守卫，随后在独立 tokio 任务里按序驱动步骤：每次转移替换一条通知消息，
//! 终态时要么把记录对账成权威数据、要么整条回滚，两者都与 Saga 同步发生。
//!
//! 同一 (subject, actor) 的提问在飞期间，新的 start 同步拒绝而不是排队。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::api::types::GenerateRequest;
use crate::api::OffchainApi;
use crate::config::AppConfig;
use crate::core::error::SagaError;
use crate::core::saga::{Saga, SagaId, SagaKind, SagaState, StepStatus};
use crate::core::supervisor::SagaSupervisor;
use crate::ledger::LedgerClient;
use crate::notify::{Notifier, NotifyOutcome};
use crate::steps::{
    FinalizeStep, FlowData, LedgerTransactionStep, OffchainSubmitStep, PollSpec, PollStep,
    StepCtx, StepExecutor,
};
use crate::store::{OptimisticRecord, OptimisticRecordStore, RecordPayload};

/// 铸造分身的用户输入
#[derive(Debug, Clone)]
pub struct CreateAgentInput {
    pub name: String,
    pub description: String,
    pub file_name: String,
    pub file_bytes: Vec<u8>,
    pub creator_address: String,
}

/// 提问的用户输入
#[derive(Debug, Clone)]
pub struct AskQuestionInput {
    pub cid: String,
    pub question: String,
    pub actor_address: String,
}

struct SagaEntry {
    saga: Arc<RwLock<Saga>>,
    cancel: CancellationToken,
    done_rx: watch::Receiver<bool>,
}

struct Inner {
    api: Arc<dyn OffchainApi>,
    ledger: Arc<dyn LedgerClient>,
    notifier: Arc<dyn Notifier>,
    store: Arc<OptimisticRecordStore>,
    cfg: AppConfig,
    supervisor: SagaSupervisor,
    sagas: RwLock<HashMap<SagaId, SagaEntry>>,
    /// 在飞的 (subject cid, actor) 提问；同步判定，不经过任何 await
    ask_in_flight: StdMutex<HashSet<(String, String)>>,
}

/// Saga 协调器（内部共享，克隆廉价）
pub struct SagaCoordinator {
    inner: Arc<Inner>,
}

impl SagaCoordinator {
    pub fn new(
        api: Arc<dyn OffchainApi>,
        ledger: Arc<dyn LedgerClient>,
        notifier: Arc<dyn Notifier>,
        store: Arc<OptimisticRecordStore>,
        cfg: AppConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                ledger,
                notifier,
                store,
                cfg,
                supervisor: SagaSupervisor::new(),
                sagas: RwLock::new(HashMap::new()),
                ask_in_flight: StdMutex::new(HashSet::new()),
            }),
        }
    }

    pub fn offchain(&self) -> Arc<dyn OffchainApi> {
        Arc::clone(&self.inner.api)
    }

    pub fn store(&self) -> Arc<OptimisticRecordStore> {
        Arc::clone(&self.inner.store)
    }

    /// 宿主视图销毁：作废全部在飞 Saga
    pub fn teardown(&self) {
        self.inner.supervisor.teardown();
    }

    /// 只读快照
    pub async fn get_state(&self, saga_id: &str) -> Option<Saga> {
        let sagas = self.inner.sagas.read().await;
        let entry = sagas.get(saga_id)?;
        let snapshot = entry.saga.read().await.clone();
        Some(snapshot)
    }

    /// 取消单个 Saga（不影响其它在飞实例）
    pub async fn cancel(&self, saga_id: &str) {
        if let Some(entry) = self.inner.sagas.read().await.get(saga_id) {
            entry.cancel.cancel();
        }
    }

    /// 等待 Saga 到达终态，返回最终快照
    pub async fn wait(&self, saga_id: &str) -> Option<Saga> {
        let mut done_rx = {
            let sagas = self.inner.sagas.read().await;
            sagas.get(saga_id)?.done_rx.clone()
        };
        while !*done_rx.borrow() {
            if done_rx.changed().await.is_err() {
                break;
            }
        }
        self.get_state(saga_id).await
    }

    /// 指定 (subject, actor) 是否有在飞提问（供视图禁用提交入口）
    pub fn is_ask_in_flight(&self, cid: &str, actor: &str) -> bool {
        self.inner
            .ask_in_flight
            .lock()
            .unwrap()
            .contains(&(cid.to_string(), actor.to_string()))
    }

    /// 发起铸造分身 Saga：校验输入，原子创建 Saga + 乐观记录，后台驱动步骤
    pub async fn start_create_agent(
        &self,
        input: CreateAgentInput,
    ) -> Result<SagaId, SagaError> {
        if input.name.trim().is_empty() {
            return Err(SagaError::InvalidInput("agent name is required".into()));
        }
        if input.creator_address.trim().is_empty() {
            return Err(SagaError::InvalidInput("wallet is not connected".into()));
        }
        if input.file_bytes.is_empty() {
            return Err(SagaError::InvalidInput("knowledge base file is required".into()));
        }
        if !input.file_name.to_lowercase().ends_with(".txt") {
            return Err(SagaError::InvalidInput("knowledge base must be a .txt file".into()));
        }
        if input.file_bytes.len() > self.inner.cfg.limits.knowledge_file_max_bytes {
            return Err(SagaError::InvalidInput(format!(
                "file exceeds {} bytes",
                self.inner.cfg.limits.knowledge_file_max_bytes
            )));
        }

        let record = OptimisticRecord::new(RecordPayload::Agent {
            name: input.name.clone(),
            description: input.description.clone(),
            cid: None,
            agent_address: None,
        });

        let request = GenerateRequest {
            name: input.name,
            description: input.description,
            file_name: input.file_name,
            file_bytes: input.file_bytes,
            creator_address: input.creator_address,
        };
        let executors: Vec<Box<dyn StepExecutor>> = vec![
            Box::new(OffchainSubmitStep::new(
                Arc::clone(&self.inner.api),
                request,
            )),
            Box::new(LedgerTransactionStep::for_register(
                Arc::clone(&self.inner.ledger),
                self.inner.cfg.chain.register_price_wei,
                self.inner.cfg.chain.confirmations,
            )),
            Box::new(FinalizeStep::new(
                Arc::clone(&self.inner.api),
                self.inner.cfg.saga.clone(),
            )),
        ];

        self.launch(SagaKind::CreateAgent, record, executors, None)
            .await
    }

    /// 发起提问 Saga；同一 (subject, actor) 已有在飞实例时同步拒绝
    pub async fn start_ask_question(
        &self,
        input: AskQuestionInput,
    ) -> Result<SagaId, SagaError> {
        if input.question.trim().is_empty() {
            return Err(SagaError::InvalidInput("question is required".into()));
        }
        if input.actor_address.trim().is_empty() {
            return Err(SagaError::InvalidInput("wallet is not connected".into()));
        }
        if input.cid.trim().is_empty() {
            return Err(SagaError::InvalidInput("agent cid is required".into()));
        }

        let key = (input.cid.clone(), input.actor_address.clone());
        {
            // 同步判定 + 占位，拒绝而不是排队
            let mut in_flight = self.inner.ask_in_flight.lock().unwrap();
            if !in_flight.insert(key.clone()) {
                return Err(SagaError::InFlight {
                    subject: input.cid.clone(),
                });
            }
        }

        let record = OptimisticRecord::new(RecordPayload::Question {
            cid: input.cid.clone(),
            question: input.question.clone(),
            answer: None,
            answer_cid: None,
            transaction_hash: None,
        });

        let executors: Vec<Box<dyn StepExecutor>> = vec![
            Box::new(LedgerTransactionStep::for_ask(
                Arc::clone(&self.inner.ledger),
                input.cid.clone(),
                input.question.clone(),
                self.inner.cfg.chain.ask_payment_wei,
                self.inner.cfg.chain.confirmations,
            )),
            Box::new(PollStep::new(
                Arc::clone(&self.inner.api),
                input.cid.clone(),
                input.question.clone(),
                PollSpec {
                    interval: self.inner.cfg.saga.poll_interval(),
                    timeout: self.inner.cfg.saga.poll_timeout(),
                },
            )),
        ];

        self.launch(SagaKind::AskQuestion, record, executors, Some(key))
            .await
    }

    /// 公共发射路径：注册 Saga 与记录，spawn 驱动任务
    async fn launch(
        &self,
        kind: SagaKind,
        record: OptimisticRecord,
        executors: Vec<Box<dyn StepExecutor>>,
        ask_key: Option<(String, String)>,
    ) -> Result<SagaId, SagaError> {
        let saga = Saga::new(kind);
        let saga_id = saga.id.clone();
        let correlation_id = saga.correlation_id.clone();
        let local_id = record.local_id.clone();
        let cancel = self.inner.supervisor.child_token();
        let saga = Arc::new(RwLock::new(saga));
        let (done_tx, done_rx) = watch::channel(false);

        self.inner.store.insert(record).await;
        self.inner.sagas.write().await.insert(
            saga_id.clone(),
            SagaEntry {
                saga: Arc::clone(&saga),
                cancel: cancel.clone(),
                done_rx,
            },
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let ctx = StepCtx::new(
                Arc::clone(&saga),
                Arc::clone(&inner.store),
                Arc::clone(&inner.notifier),
                correlation_id.clone(),
                local_id.clone(),
                cancel,
            );
            let outcome = inner.drive(&ctx, &saga, executors).await;
            inner.settle(&saga, &local_id, &correlation_id, outcome).await;
            if let Some(key) = ask_key {
                inner.ask_in_flight.lock().unwrap().remove(&key);
            }
            let _ = done_tx.send(true);
        });

        Ok(saga_id)
    }
}

impl Inner {
    /// 按序执行步骤；第一个失败的步骤终止整条 Saga
    async fn drive(
        &self,
        ctx: &StepCtx,
        saga: &Arc<RwLock<Saga>>,
        executors: Vec<Box<dyn StepExecutor>>,
    ) -> Result<FlowData, SagaError> {
        let mut flow = FlowData::default();
        for (idx, executor) in executors.iter().enumerate() {
            {
                let mut s = saga.write().await;
                s.current_step = idx;
                s.steps[idx].status = StepStatus::Running;
                tracing::debug!(saga_id = %s.id, step = ?executor.kind(), "step running");
            }
            match executor.execute(ctx, &mut flow).await {
                Ok(result) => {
                    let mut s = saga.write().await;
                    s.steps[idx].status = StepStatus::Succeeded;
                    s.steps[idx].result = Some(result);
                }
                Err(e) => {
                    let mut s = saga.write().await;
                    s.steps[idx].status = StepStatus::Failed;
                    return Err(e);
                }
            }
        }
        Ok(flow)
    }

    /// 终态处理：对账或回滚与 Saga 状态一起落定
    async fn settle(
        &self,
        saga: &Arc<RwLock<Saga>>,
        local_id: &str,
        correlation_id: &str,
        outcome: Result<FlowData, SagaError>,
    ) {
        match outcome {
            Ok(flow) => {
                let kind = {
                    let mut s = saga.write().await;
                    s.state = SagaState::Succeeded;
                    s.kind
                };
                let reconciled = match kind {
                    SagaKind::CreateAgent => flow.generate.map(|data| {
                        (
                            Some(data.cid.clone()),
                            RecordPayload::Agent {
                                name: data.name,
                                description: data.description,
                                cid: Some(data.cid),
                                agent_address: Some(data.agent_address),
                            },
                            "Agent created successfully!",
                        )
                    }),
                    SagaKind::AskQuestion => {
                        // subject cid 保留自启动时写入的乐观载荷
                        let cid = match self.store.get(local_id).await.map(|r| r.payload) {
                            Some(RecordPayload::Question { cid, .. }) => cid,
                            _ => String::new(),
                        };
                        let tx_hash = flow.tx_hash;
                        flow.matched.map(|entry| {
                            (
                                Some(entry.id.to_string()),
                                RecordPayload::Question {
                                    cid,
                                    question: entry.question,
                                    answer: Some(entry.answer),
                                    answer_cid: Some(entry.answer_cid),
                                    transaction_hash: tx_hash.or(Some(entry.transaction_hash)),
                                },
                                "Agent updated successfully!",
                            )
                        })
                    }
                };
                let Some((authoritative_id, payload, message)) = reconciled else {
                    // 不变量破坏：成功路径必然带着步骤产出
                    tracing::error!(correlation_id, "saga succeeded without step output");
                    self.store.rollback(local_id).await;
                    self.notifier.resolve(
                        correlation_id,
                        NotifyOutcome::Failure("internal error: missing step output".into()),
                    );
                    return;
                };
                self.store
                    .reconcile(local_id, authoritative_id, payload)
                    .await;
                self.notifier
                    .resolve(correlation_id, NotifyOutcome::Success(message.into()));
                tracing::info!(correlation_id, "saga succeeded");
            }
            Err(e) => {
                {
                    let mut s = saga.write().await;
                    s.state = SagaState::Failed;
                    s.last_error = Some(e.to_string());
                }
                self.store.rollback(local_id).await;
                self.notifier
                    .resolve(correlation_id, NotifyOutcome::Failure(e.to_string()));
                tracing::warn!(correlation_id, error = %e, "saga failed");
            }
        }
    }
}
