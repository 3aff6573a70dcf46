use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8088;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const MAX_WS_MESSAGE_BYTES: usize = 64 * 1024;

/// Top-level config (consult.toml + CONSULT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub vectorstore: VectorStoreConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub rooms: RoomsConfig,
    #[serde(default)]
    pub turn: TurnConfig,
}

impl Default for ConsultConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            llm: LlmConfig {
                chat_model: "claude-sonnet-4-6".to_string(),
                embedding_model: "text-embedding-3-small".to_string(),
                embedding_dim: 1536,
                api_key: String::new(),
                base_url: default_chat_base_url(),
            },
            vectorstore: VectorStoreConfig::default(),
            graph: GraphConfig::default(),
            rooms: RoomsConfig::default(),
            turn: TurnConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_db_path")]
    pub db_path: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Cosine-distance ceiling for a semantic cache hit; below this the
    /// candidate is considered close enough to reuse.
    #[serde(default = "default_cache_threshold")]
    pub cache_threshold: f32,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_vector_db_path(),
            collection: default_collection(),
            cache_threshold: default_cache_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,
    #[serde(default = "default_outer_timeout_ms")]
    pub outer_timeout_ms: u64,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_rag_top_n")]
    pub rag_top_n: usize,
    #[serde(default = "default_intent_labels")]
    pub intent_labels: Vec<String>,
    #[serde(default = "default_risk_keywords")]
    pub risk_keywords: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            node_timeout_ms: default_node_timeout_ms(),
            outer_timeout_ms: default_outer_timeout_ms(),
            max_concurrent_requests: default_max_concurrent_requests(),
            rag_top_n: default_rag_top_n(),
            intent_labels: default_intent_labels(),
            risk_keywords: default_risk_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfig {
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TurnConfig {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
    #[serde(default = "default_stun_url")]
    pub stun_server_url: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_chat_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dim() -> usize {
    1536
}
fn default_chat_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_vector_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.consult-hub/vectorstore.db", home)
}
fn default_collection() -> String {
    "default".to_string()
}
fn default_cache_threshold() -> f32 {
    0.45
}
fn default_node_timeout_ms() -> u64 {
    10_000
}
fn default_outer_timeout_ms() -> u64 {
    30_000
}
fn default_max_concurrent_requests() -> usize {
    8
}
fn default_rag_top_n() -> usize {
    3
}
fn default_intent_labels() -> Vec<String> {
    vec![
        "change_plan".to_string(),
        "cancel".to_string(),
        "billing_inquiry".to_string(),
        "complaint".to_string(),
        "device_issue".to_string(),
        "other".to_string(),
    ]
}
fn default_risk_keywords() -> Vec<String> {
    vec![
        "해지".to_string(),
        "환불".to_string(),
        "취소".to_string(),
        "불만".to_string(),
    ]
}
fn default_mailbox_capacity() -> usize {
    256
}
fn default_rate_limit_per_minute() -> u32 {
    120
}
fn default_stun_url() -> String {
    "stun:stun.l.google.com:19302".to_string()
}

/// Maps a single bare environment variable onto a dotted config key.
fn env_var(name: &'static str, key: &'static str) -> impl figment::Provider {
    Env::raw().only(&[name]).map(move |_| key.into())
}

impl ConsultConfig {
    /// Load config from a TOML file with bare env var overrides.
    ///
    /// Unlike the prefixed `SKYNET_*` convention, the recognized variables
    /// here are the fixed, bare names of the external interface
    /// (`CHAT_MODEL`, `EMBEDDING_DIM`, `TURN_SERVER_URL`, ...); each is
    /// mapped onto its config path explicitly rather than derived from a
    /// naming scheme.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `./consult.toml`
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(|| "consult.toml".to_string());

        let config: ConsultConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(env_var("MAX_CONCURRENT_REQUESTS", "graph.max_concurrent_requests"))
            .merge(env_var("REQUEST_TIMEOUT", "graph.node_timeout_ms"))
            .merge(env_var("RATE_LIMIT_PER_MINUTE", "rooms.rate_limit_per_minute"))
            .merge(env_var("EMBEDDING_MODEL", "llm.embedding_model"))
            .merge(env_var("EMBEDDING_DIM", "llm.embedding_dim"))
            .merge(env_var("VECTOR_DB_URL", "vectorstore.db_path"))
            .merge(env_var("VECTOR_COLLECTION", "vectorstore.collection"))
            .merge(env_var("CHAT_MODEL", "llm.chat_model"))
            .merge(env_var("CHAT_API_KEY", "llm.api_key"))
            .merge(env_var("TURN_SERVER_URL", "turn.server_url"))
            .merge(env_var("TURN_USERNAME", "turn.username"))
            .merge(env_var("TURN_CREDENTIAL", "turn.credential"))
            .extract()
            .map_err(|e| crate::error::ConsultError::Config(e.to_string()))?;

        Ok(config)
    }
}
