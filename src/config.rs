//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TWINFORGE__*` 覆盖（双下划线表示嵌套，
//! 如 `TWINFORGE__SAGA__POLL_INTERVAL_MS=5000`）。
//!
//! 轮询间隔 / 超时、终结重试与退避、确认数都是部署级可调项，全部放在这里，
//! 状态机代码里不出现任何硬编码时长。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub chain: ChainSection,
    #[serde(default)]
    pub saga: SagaSection,
    #[serde(default)]
    pub limits: LimitsSection,
}

/// [api] 段：链下后端地址与请求超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 单次 HTTP 请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// [chain] 段：合约地址、确认数与两类调用附带的金额（wei）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    #[serde(default = "default_contract_address")]
    pub contract_address: String,
    /// 视为落账所需的区块确认数
    #[serde(default = "default_confirmations")]
    pub confirmations: u32,
    /// registerAgent 的 _price 参数
    #[serde(default = "default_register_price_wei")]
    pub register_price_wei: u128,
    /// askQuestion 附带的固定支付金额
    #[serde(default = "default_ask_payment_wei")]
    pub ask_payment_wei: u128,
}

fn default_contract_address() -> String {
    "0x6AB14941378f8D6D1968e9767dfEE630e74F360f".to_string()
}

fn default_confirmations() -> u32 {
    1
}

fn default_register_price_wei() -> u128 {
    1_000_000_000_000
}

fn default_ask_payment_wei() -> u128 {
    1_000_000_000_000
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            contract_address: default_contract_address(),
            confirmations: default_confirmations(),
            register_price_wei: default_register_price_wei(),
            ask_payment_wei: default_ask_payment_wei(),
        }
    }
}

/// [saga] 段：轮询节奏与终结重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SagaSection {
    /// 答案轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 答案轮询总预算（毫秒），超过即 PollTimeout
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// on_chain 终结调用的最大重试次数（链上效果已落账，必须尽量补齐链下）
    #[serde(default = "default_finalize_max_retries")]
    pub finalize_max_retries: u32,
    /// 终结重试的退避基数（毫秒），第 n 次重试前等 base * 2^n
    #[serde(default = "default_finalize_backoff_base_ms")]
    pub finalize_backoff_base_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_poll_timeout_ms() -> u64 {
    60_000
}

fn default_finalize_max_retries() -> u32 {
    3
}

fn default_finalize_backoff_base_ms() -> u64 {
    500
}

impl Default for SagaSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            finalize_max_retries: default_finalize_max_retries(),
            finalize_backoff_base_ms: default_finalize_backoff_base_ms(),
        }
    }
}

impl SagaSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn finalize_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.finalize_backoff_base_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

/// [limits] 段：提交前的输入校验上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    /// 知识库文件大小上限（字节）
    #[serde(default = "default_knowledge_file_max_bytes")]
    pub knowledge_file_max_bytes: usize,
}

fn default_knowledge_file_max_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            knowledge_file_max_bytes: default_knowledge_file_max_bytes(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiSection::default(),
            chain: ChainSection::default(),
            saga: SagaSection::default(),
            limits: LimitsSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 TWINFORGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TWINFORGE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TWINFORGE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
