use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use lumi_rag::chunker::{ChunkMode, ChunkerConfig};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Embedding/chat backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    DeepSeek,
    OpenRouter,
    Gemini,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::DeepSeek => "deepseek",
            Self::OpenRouter => "openrouter",
            Self::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "deepseek" => Ok(Self::DeepSeek),
            "openrouter" => Ok(Self::OpenRouter),
            "gemini" => Ok(Self::Gemini),
            other => anyhow::bail!(
                "unknown provider '{other}' — expected one of: openai, deepseek, openrouter, gemini"
            ),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: String,
    #[serde(default = "default_index_file")]
    pub index_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            index_file: default_index_file(),
        }
    }
}

fn default_data_dir() -> String {
    "data".into()
}

fn default_index_file() -> String {
    "index.json".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub embed_provider: ProviderKind,
    #[serde(default = "default_provider")]
    pub chat_provider: ProviderKind,
    /// Embedding model; per-provider default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_model: Option<String>,
    /// Chat model; per-provider default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Zero-vector width; per-provider default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_dimensions: Option<usize>,
    /// Per-request character cap for the sequential profile.
    #[serde(default = "default_text_cap")]
    pub text_cap: usize,
    /// Inter-request delay for the sequential profile.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            embed_provider: default_provider(),
            chat_provider: default_provider(),
            embed_model: None,
            chat_model: None,
            max_tokens: default_max_tokens(),
            embed_dimensions: None,
            text_cap: default_text_cap(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::OpenAi
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_text_cap() -> usize {
    1000
}

fn default_request_delay_ms() -> u64 {
    200
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub mode: ChunkMode,
    /// Window size; per-mode default when unset (1500 chars / 750 tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
    /// Window overlap; per-mode default when unset (200 chars / 100 tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap: Option<usize>,
    /// Tokenizer JSON file, required for token mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<String>,
}

impl ChunkingConfig {
    /// Resolve into chunker parameters, filling per-mode defaults.
    #[must_use]
    pub fn chunker_config(&self) -> ChunkerConfig {
        let defaults = match self.mode {
            ChunkMode::Characters => ChunkerConfig::default(),
            ChunkMode::Tokens => ChunkerConfig::tokens(),
        };
        ChunkerConfig {
            mode: self.mode,
            max_size: self.max_size.unwrap_or(defaults.max_size),
            overlap: self.overlap.unwrap_or(defaults.overlap),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    6
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LUMI_DATA_DIR") {
            self.data.dir = v;
        }
        if let Ok(v) = std::env::var("LUMI_INDEX_FILE") {
            self.data.index_file = v;
        }
        if let Ok(v) = std::env::var("LUMI_EMBED_PROVIDER") {
            match v.parse() {
                Ok(kind) => self.llm.embed_provider = kind,
                Err(_) => tracing::warn!("ignoring invalid LUMI_EMBED_PROVIDER value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("LUMI_CHAT_PROVIDER") {
            match v.parse() {
                Ok(kind) => self.llm.chat_provider = kind,
                Err(_) => tracing::warn!("ignoring invalid LUMI_CHAT_PROVIDER value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("LUMI_EMBED_MODEL") {
            self.llm.embed_model = Some(v);
        }
        if let Ok(v) = std::env::var("LUMI_CHAT_MODEL") {
            self.llm.chat_model = Some(v);
        }
        if let Ok(v) = std::env::var("LUMI_TOP_K")
            && let Ok(top_k) = v.parse::<usize>()
        {
            self.retrieval.top_k = top_k;
        }
        if let Ok(v) = std::env::var("LUMI_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
    }

    /// Default embedding model for a backend.
    #[must_use]
    pub fn embed_model_for(&self, kind: ProviderKind) -> String {
        self.llm.embed_model.clone().unwrap_or_else(|| {
            match kind {
                ProviderKind::Gemini => "text-embedding-004",
                _ => "text-embedding-3-small",
            }
            .to_owned()
        })
    }

    /// Default chat model for a backend.
    #[must_use]
    pub fn chat_model_for(&self, kind: ProviderKind) -> String {
        self.llm.chat_model.clone().unwrap_or_else(|| {
            match kind {
                ProviderKind::DeepSeek => "deepseek-chat",
                _ => "gpt-4o-mini",
            }
            .to_owned()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.data.dir, "data");
        assert_eq!(config.data.index_file, "index.json");
        assert_eq!(config.llm.embed_provider, ProviderKind::OpenAi);
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.gateway.port, 3000);
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [llm]
            embed_provider = "gemini"
            chat_provider = "deepseek"

            [retrieval]
            top_k = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.embed_provider, ProviderKind::Gemini);
        assert_eq!(config.llm.chat_provider, ProviderKind::DeepSeek);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.data.dir, "data");
    }

    #[test]
    fn provider_kind_round_trips() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::DeepSeek,
            ProviderKind::OpenRouter,
            ProviderKind::Gemini,
        ] {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_provider_name_rejected() {
        let err = "mistral".parse::<ProviderKind>().unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn per_provider_model_defaults() {
        let config = Config::default();
        assert_eq!(
            config.embed_model_for(ProviderKind::OpenAi),
            "text-embedding-3-small"
        );
        assert_eq!(
            config.embed_model_for(ProviderKind::Gemini),
            "text-embedding-004"
        );
        assert_eq!(config.chat_model_for(ProviderKind::DeepSeek), "deepseek-chat");
        assert_eq!(config.chat_model_for(ProviderKind::OpenAi), "gpt-4o-mini");
    }

    #[test]
    fn explicit_models_win_over_defaults() {
        let mut config = Config::default();
        config.llm.embed_model = Some("custom-embed".into());
        config.llm.chat_model = Some("custom-chat".into());
        assert_eq!(config.embed_model_for(ProviderKind::Gemini), "custom-embed");
        assert_eq!(config.chat_model_for(ProviderKind::DeepSeek), "custom-chat");
    }

    #[test]
    fn chunking_defaults_follow_mode() {
        let chars = ChunkingConfig::default().chunker_config();
        assert_eq!(chars.max_size, 1500);
        assert_eq!(chars.overlap, 200);

        let tokens = ChunkingConfig {
            mode: ChunkMode::Tokens,
            ..ChunkingConfig::default()
        }
        .chunker_config();
        assert_eq!(tokens.max_size, 750);
        assert_eq!(tokens.overlap, 100);
    }

    #[test]
    fn explicit_chunking_sizes_win() {
        let config = ChunkingConfig {
            mode: ChunkMode::Characters,
            max_size: Some(100),
            overlap: Some(10),
            tokenizer_path: None,
        }
        .chunker_config();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.overlap, 10);
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        // SAFETY: test runs serially; no other thread touches the env.
        unsafe {
            std::env::set_var("LUMI_DATA_DIR", "/tmp/docs");
            std::env::set_var("LUMI_EMBED_PROVIDER", "gemini");
            std::env::set_var("LUMI_TOP_K", "9");
        }

        let mut config = Config::default();
        config.apply_env_overrides();

        unsafe {
            std::env::remove_var("LUMI_DATA_DIR");
            std::env::remove_var("LUMI_EMBED_PROVIDER");
            std::env::remove_var("LUMI_TOP_K");
        }

        assert_eq!(config.data.dir, "/tmp/docs");
        assert_eq!(config.llm.embed_provider, ProviderKind::Gemini);
        assert_eq!(config.retrieval.top_k, 9);
    }

    #[test]
    #[serial]
    fn invalid_env_provider_ignored() {
        unsafe {
            std::env::set_var("LUMI_EMBED_PROVIDER", "nonsense");
        }

        let mut config = Config::default();
        config.apply_env_overrides();

        unsafe {
            std::env::remove_var("LUMI_EMBED_PROVIDER");
        }

        assert_eq!(config.llm.embed_provider, ProviderKind::OpenAi);
    }

    #[test]
    #[serial]
    fn load_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/lumi.toml")).unwrap();
        assert_eq!(config.data.dir, "data");
    }

    #[test]
    #[serial]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lumi.toml");
        std::fs::write(&path, "[data]\ndir = \"corpus\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.data.dir, "corpus");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lumi.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        assert!(Config::load(&path).is_err());
    }
}
