//! Saga 集成测试：通过 Mock 端口驱动两类 Saga 的成功 / 失败 / 取消路径

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use twinforge::api::types::{AgentDetail, GenerateData, QuestionEntry};
    use twinforge::api::MockOffchainApi;
    use twinforge::config::AppConfig;
    use twinforge::core::{AskQuestionInput, CreateAgentInput, SagaCoordinator, SagaState};
    use twinforge::ledger::{MockLedgerClient, TxOutcome};
    use twinforge::notify::RecordingNotifier;
    use twinforge::store::{OptimisticRecord, OptimisticRecordStore, RecordPayload, RecordStatus};

    struct Harness {
        coordinator: Arc<SagaCoordinator>,
        api: Arc<MockOffchainApi>,
        ledger: Arc<MockLedgerClient>,
        notifier: Arc<RecordingNotifier>,
        store: Arc<OptimisticRecordStore>,
    }

    /// 测试用快节奏配置：轮询 20ms 一拍，预算 200ms，退避基数 1ms
    fn fast_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.saga.poll_interval_ms = 20;
        cfg.saga.poll_timeout_ms = 200;
        cfg.saga.finalize_backoff_base_ms = 1;
        cfg
    }

    fn harness(api: MockOffchainApi, ledger: MockLedgerClient, cfg: AppConfig) -> Harness {
        let api = Arc::new(api);
        let ledger = Arc::new(ledger);
        let notifier = Arc::new(RecordingNotifier::new());
        let store = Arc::new(OptimisticRecordStore::new());
        let coordinator = Arc::new(SagaCoordinator::new(
            api.clone(),
            ledger.clone(),
            notifier.clone(),
            store.clone(),
            cfg,
        ));
        Harness {
            coordinator,
            api,
            ledger,
            notifier,
            store,
        }
    }

    fn create_input(name: &str) -> CreateAgentInput {
        CreateAgentInput {
            name: name.to_string(),
            description: "A science fiction writer.".to_string(),
            file_name: "knowledge.txt".to_string(),
            file_bytes: b"corpus".to_vec(),
            creator_address: "0xcreator".to_string(),
        }
    }

    fn ask_input(question: &str) -> AskQuestionInput {
        AskQuestionInput {
            cid: "cid-ada".to_string(),
            question: question.to_string(),
            actor_address: "0xasker".to_string(),
        }
    }

    fn generate_data() -> GenerateData {
        GenerateData {
            cid: "abc123".to_string(),
            agent_address: "0xagent".to_string(),
            name: "Ada".to_string(),
            description: "A science fiction writer.".to_string(),
        }
    }

    fn detail_with(questions: Vec<QuestionEntry>) -> AgentDetail {
        AgentDetail {
            name: "Ada".to_string(),
            description: String::new(),
            agent_address: "0xagent".to_string(),
            questions,
        }
    }

    fn entry(id: i64, question: &str) -> QuestionEntry {
        QuestionEntry {
            id,
            question: question.to_string(),
            answer: "Because.".to_string(),
            answer_cid: "bafyanswer".to_string(),
            transaction_hash: "0xbeef".to_string(),
        }
    }

    // 场景 A：铸造一路成功，记录对账为权威数据且 reveal 标志恰好一次
    #[tokio::test]
    async fn test_create_agent_success() {
        let h = harness(
            MockOffchainApi::new().with_generate(Ok(generate_data())),
            MockLedgerClient::new(),
            fast_config(),
        );

        let saga_id = h
            .coordinator
            .start_create_agent(create_input("Ada"))
            .await
            .unwrap();
        let saga = h.coordinator.wait(&saga_id).await.unwrap();

        assert_eq!(saga.state, SagaState::Succeeded);
        assert!(saga.last_error.is_none());
        assert!(saga
            .steps
            .iter()
            .all(|s| s.status == twinforge::core::StepStatus::Succeeded));

        let records = h.store.snapshot().await;
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.status, RecordStatus::Complete);
        assert_eq!(rec.authoritative_id.as_deref(), Some("abc123"));
        assert!(rec.is_newly_completed);
        match &rec.payload {
            RecordPayload::Agent { name, cid, .. } => {
                assert_eq!(name, "Ada");
                assert_eq!(cid.as_deref(), Some("abc123"));
            }
            other => panic!("unexpected payload: {:?}", other),
        }

        // reveal 标志一次性：消费方清除后不再出现
        h.store.clear_newly_completed(&rec.local_id).await;
        assert!(!h.store.get(&rec.local_id).await.unwrap().is_newly_completed);

        // 通知：同一 correlation id 原地替换，终态后无在飞消息
        let updates = h.notifier.updates_for(&saga.correlation_id);
        assert_eq!(updates.len(), 4);
        assert!(updates[0].contains("Step 1/3"));
        assert!(updates[3].contains("Step 3/3"));
        assert!(h.notifier.current(&saga.correlation_id).is_none());
        assert!(matches!(
            h.notifier.outcome(&saga.correlation_id),
            Some(twinforge::notify::NotifyOutcome::Success(_))
        ));

        assert_eq!(h.api.finalize_calls.load(Ordering::SeqCst), 1);
    }

    // 场景 B：链下提交 500，在任何钱包交互前失败，仓库无残留
    #[tokio::test]
    async fn test_create_agent_offchain_failure_before_wallet() {
        let h = harness(
            MockOffchainApi::new().with_generate(Err("HTTP 500".to_string())),
            MockLedgerClient::new(),
            fast_config(),
        );

        let saga_id = h
            .coordinator
            .start_create_agent(create_input("Ada"))
            .await
            .unwrap();
        let saga = h.coordinator.wait(&saga_id).await.unwrap();

        assert_eq!(saga.state, SagaState::Failed);
        assert!(saga.last_error.unwrap().contains("Off-chain submit failed"));
        // 没弹过钱包
        assert_eq!(h.ledger.submit_calls.load(Ordering::SeqCst), 0);
        assert!(h.store.is_empty().await);
        assert!(matches!(
            h.notifier.outcome(&saga.correlation_id),
            Some(twinforge::notify::NotifyOutcome::Failure(_))
        ));
    }

    // 钱包拒签：终态失败，记录回滚
    #[tokio::test]
    async fn test_create_agent_wallet_rejection() {
        let h = harness(
            MockOffchainApi::new().with_generate(Ok(generate_data())),
            MockLedgerClient::new()
                .with_submit_outcomes(vec![Err("User rejected the request".to_string())]),
            fast_config(),
        );

        let saga_id = h
            .coordinator
            .start_create_agent(create_input("Ada"))
            .await
            .unwrap();
        let saga = h.coordinator.wait(&saga_id).await.unwrap();

        assert_eq!(saga.state, SagaState::Failed);
        assert!(saga.last_error.unwrap().contains("Wallet rejected"));
        assert!(h.store.is_empty().await);
    }

    // 场景 C：提问交易回滚，挂起记录移除，既有问答不受影响
    #[tokio::test]
    async fn test_ask_question_revert_rolls_back_pending_only() {
        let h = harness(
            MockOffchainApi::new(),
            MockLedgerClient::new().with_confirm_outcomes(vec![TxOutcome::Reverted {
                reason: "execution reverted".to_string(),
            }]),
            fast_config(),
        );

        // 既有的已完成问答
        let prior = OptimisticRecord::new(RecordPayload::Question {
            cid: "cid-ada".to_string(),
            question: "Earlier question".to_string(),
            answer: Some("Earlier answer".to_string()),
            answer_cid: None,
            transaction_hash: None,
        });
        let prior_id = prior.local_id.clone();
        h.store.insert(prior).await;
        h.store
            .reconcile(
                &prior_id,
                Some("1".to_string()),
                RecordPayload::Question {
                    cid: "cid-ada".to_string(),
                    question: "Earlier question".to_string(),
                    answer: Some("Earlier answer".to_string()),
                    answer_cid: None,
                    transaction_hash: None,
                },
            )
            .await;

        let saga_id = h
            .coordinator
            .start_ask_question(ask_input("Why?"))
            .await
            .unwrap();
        let saga = h.coordinator.wait(&saga_id).await.unwrap();

        assert_eq!(saga.state, SagaState::Failed);
        assert!(saga.last_error.unwrap().contains("reverted"));

        let records = h.store.snapshot().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].local_id, prior_id);
        assert_eq!(records[0].status, RecordStatus::Complete);
        // 在飞守卫已释放，可以重新提问
        assert!(!h.coordinator.is_ask_in_flight("cid-ada", "0xasker"));
    }

    // 提问成功：确认后轮询到严格相等的问题，记录对账出答案
    #[tokio::test]
    async fn test_ask_question_success_after_polling() {
        let h = harness(
            MockOffchainApi::new().with_detail_snapshots(vec![
                detail_with(vec![]),
                detail_with(vec![entry(7, "Why?")]),
            ]),
            MockLedgerClient::new(),
            fast_config(),
        );

        let saga_id = h
            .coordinator
            .start_ask_question(ask_input("Why?"))
            .await
            .unwrap();
        let saga = h.coordinator.wait(&saga_id).await.unwrap();

        assert_eq!(saga.state, SagaState::Succeeded);
        let records = h.store.snapshot().await;
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.status, RecordStatus::Complete);
        assert_eq!(rec.authoritative_id.as_deref(), Some("7"));
        assert!(rec.is_newly_completed);
        match &rec.payload {
            RecordPayload::Question {
                cid,
                question,
                answer,
                ..
            } => {
                assert_eq!(cid, "cid-ada");
                assert_eq!(question, "Why?");
                assert_eq!(answer.as_deref(), Some("Because."));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        assert!(!h.coordinator.is_ask_in_flight("cid-ada", "0xasker"));
    }

    // 轮询匹配是严格逐字节相等：尾随空格不算命中，最终超时
    #[tokio::test]
    async fn test_poll_match_is_exact_text() {
        let h = harness(
            MockOffchainApi::new()
                .with_detail_snapshots(vec![detail_with(vec![entry(7, "Q1 ")])]),
            MockLedgerClient::new(),
            fast_config(),
        );

        let saga_id = h
            .coordinator
            .start_ask_question(ask_input("Q1"))
            .await
            .unwrap();
        let saga = h.coordinator.wait(&saga_id).await.unwrap();

        assert_eq!(saga.state, SagaState::Failed);
        assert!(saga.last_error.unwrap().contains("refresh"));
        assert!(h.store.is_empty().await);
    }

    // 场景 D：超时预算压住 tick 数。预算 200ms、间隔 30ms 只会拉 ~6 次，
    // 不会把脚本里永远不命中的列表拉满 30 次
    #[tokio::test]
    async fn test_poll_timeout_bounded_by_budget_not_tick_count() {
        let mut cfg = fast_config();
        cfg.saga.poll_interval_ms = 30;
        cfg.saga.poll_timeout_ms = 200;
        let h = harness(
            MockOffchainApi::new().with_detail_snapshots(vec![detail_with(vec![])]),
            MockLedgerClient::new(),
            cfg,
        );

        let saga_id = h
            .coordinator
            .start_ask_question(ask_input("Why?"))
            .await
            .unwrap();
        let saga = h.coordinator.wait(&saga_id).await.unwrap();

        assert_eq!(saga.state, SagaState::Failed);
        let ticks = h.api.detail_calls.load(Ordering::SeqCst);
        assert!(ticks >= 3, "expected a few ticks, got {}", ticks);
        assert!(ticks <= 8, "budget should cap ticks, got {}", ticks);
    }

    // 场景 E：同一 (subject, actor) 的第二次提问同步拒绝，第一条不受影响
    #[tokio::test]
    async fn test_second_ask_rejected_while_first_in_flight() {
        let h = harness(
            MockOffchainApi::new()
                .with_detail_snapshots(vec![detail_with(vec![entry(7, "Why?")])]),
            MockLedgerClient::new().with_confirmation_delay(Duration::from_millis(100)),
            fast_config(),
        );

        let first = h
            .coordinator
            .start_ask_question(ask_input("Why?"))
            .await
            .unwrap();
        let second = h.coordinator.start_ask_question(ask_input("Again?")).await;
        assert!(matches!(
            second,
            Err(twinforge::core::SagaError::InFlight { .. })
        ));
        // 另一个 actor 不受守卫影响
        assert!(!h.coordinator.is_ask_in_flight("cid-ada", "0xother"));

        let saga = h.coordinator.wait(&first).await.unwrap();
        assert_eq!(saga.state, SagaState::Succeeded);
        assert!(!h.coordinator.is_ask_in_flight("cid-ada", "0xasker"));
    }

    // 终结重试耗尽：区别于普通失败的「部分完成」措辞，链上已生效
    #[tokio::test]
    async fn test_finalize_exhaustion_surfaces_partial_failure() {
        let h = harness(
            MockOffchainApi::new()
                .with_generate(Ok(generate_data()))
                .with_finalize_outcomes(vec![
                    Err("HTTP 502".to_string()),
                    Err("HTTP 502".to_string()),
                    Err("HTTP 502".to_string()),
                    Err("HTTP 502".to_string()),
                ]),
            MockLedgerClient::new(),
            fast_config(),
        );

        let saga_id = h
            .coordinator
            .start_create_agent(create_input("Ada"))
            .await
            .unwrap();
        let saga = h.coordinator.wait(&saga_id).await.unwrap();

        assert_eq!(saga.state, SagaState::Failed);
        let err = saga.last_error.unwrap();
        assert!(err.contains("confirmed on-chain"), "got: {}", err);
        assert!(err.contains("4 attempts"), "got: {}", err);
        // 默认预算：1 次 + 3 次重试
        assert_eq!(h.api.finalize_calls.load(Ordering::SeqCst), 4);
        assert!(h.store.is_empty().await);
    }

    // 终结幂等：重试一次成功与一次成功到达相同终态
    #[tokio::test]
    async fn test_finalize_retry_reaches_same_terminal_state() {
        for outcomes in [vec![], vec![Err("HTTP 502".to_string()), Ok(())]] {
            let h = harness(
                MockOffchainApi::new()
                    .with_generate(Ok(generate_data()))
                    .with_finalize_outcomes(outcomes),
                MockLedgerClient::new(),
                fast_config(),
            );
            let saga_id = h
                .coordinator
                .start_create_agent(create_input("Ada"))
                .await
                .unwrap();
            let saga = h.coordinator.wait(&saga_id).await.unwrap();
            assert_eq!(saga.state, SagaState::Succeeded);
            let records = h.store.snapshot().await;
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].status, RecordStatus::Complete);
            assert_eq!(records[0].authoritative_id.as_deref(), Some("abc123"));
        }
    }

    // 显式取消：轮询中的 Saga 立即结束，记录回滚，守卫释放
    #[tokio::test]
    async fn test_cancel_during_polling() {
        let mut cfg = fast_config();
        cfg.saga.poll_timeout_ms = 10_000;
        let h = harness(
            MockOffchainApi::new().with_detail_snapshots(vec![detail_with(vec![])]),
            MockLedgerClient::new(),
            cfg,
        );

        let saga_id = h
            .coordinator
            .start_ask_question(ask_input("Why?"))
            .await
            .unwrap();
        // 让它先跑几拍
        tokio::time::sleep(Duration::from_millis(60)).await;
        h.coordinator.cancel(&saga_id).await;
        let saga = h.coordinator.wait(&saga_id).await.unwrap();

        assert_eq!(saga.state, SagaState::Failed);
        assert_eq!(saga.last_error.as_deref(), Some("Cancelled"));
        assert!(h.store.is_empty().await);
        assert!(!h.coordinator.is_ask_in_flight("cid-ada", "0xasker"));
    }

    // 视图销毁：teardown 后不再有任何轮询 tick（迟到的定时器是 no-op）
    #[tokio::test]
    async fn test_teardown_stops_poll_timers() {
        let mut cfg = fast_config();
        cfg.saga.poll_timeout_ms = 10_000;
        let h = harness(
            MockOffchainApi::new().with_detail_snapshots(vec![detail_with(vec![])]),
            MockLedgerClient::new(),
            cfg,
        );

        let saga_id = h
            .coordinator
            .start_ask_question(ask_input("Why?"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        h.coordinator.teardown();
        let saga = h.coordinator.wait(&saga_id).await.unwrap();
        assert_eq!(saga.state, SagaState::Failed);

        let ticks_then = h.api.detail_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.api.detail_calls.load(Ordering::SeqCst), ticks_then);
        assert!(h.store.is_empty().await);
    }

    // 提交前校验：不合法输入直接拒绝，不创建任何 Saga / 记录
    #[tokio::test]
    async fn test_invalid_inputs_rejected_before_any_side_effect() {
        let h = harness(MockOffchainApi::new(), MockLedgerClient::new(), fast_config());

        let mut no_name = create_input("  ");
        no_name.name = "  ".to_string();
        assert!(h.coordinator.start_create_agent(no_name).await.is_err());

        let mut wrong_ext = create_input("Ada");
        wrong_ext.file_name = "knowledge.pdf".to_string();
        assert!(h.coordinator.start_create_agent(wrong_ext).await.is_err());

        let mut too_big = create_input("Ada");
        too_big.file_bytes = vec![0u8; 5 * 1024 * 1024 + 1];
        assert!(h.coordinator.start_create_agent(too_big).await.is_err());

        let mut empty_q = ask_input("");
        empty_q.question = String::new();
        assert!(h.coordinator.start_ask_question(empty_q).await.is_err());

        assert!(h.store.is_empty().await);
        assert_eq!(h.api.generate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.ledger.submit_calls.load(Ordering::SeqCst), 0);
    }
}
