//! Lumi CLI: index a folder of documents and chat over them, in the
//! terminal or behind the SSE gateway.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;

use config::{Config, ProviderKind};
use lumi_gateway::RagServer;
use lumi_llm::any::AnyProvider;
use lumi_llm::compatible::CompatibleProvider;
use lumi_llm::gemini::GeminiProvider;
use lumi_llm::openai::OpenAiProvider;
use lumi_llm::provider::LlmProvider;
use lumi_rag::chunker::{ChunkMode, Chunker};
use lumi_rag::store::Index;
use lumi_rag::{builder, chat, document, store};

#[derive(Debug, Parser)]
#[command(name = "lumi", version, about = "Minimal RAG knowledge assistant")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "lumi.toml")]
    config: PathBuf,

    /// Directory scanned for .txt/.md documents.
    #[arg(long)]
    data_dir: Option<String>,

    /// Path of the persisted index.
    #[arg(long)]
    index_file: Option<String>,

    /// Rebuild the index even if it already exists.
    #[arg(long)]
    reindex: bool,

    /// Embedding backend: openai, deepseek, openrouter, or gemini.
    #[arg(long)]
    embed_provider: Option<String>,

    /// Chat backend: openai, deepseek, or openrouter.
    #[arg(long)]
    chat_provider: Option<String>,

    /// Embedding model override.
    #[arg(long)]
    embed_model: Option<String>,

    /// Chat model override.
    #[arg(long)]
    chat_model: Option<String>,

    /// Number of chunks retrieved per question.
    #[arg(long)]
    top_k: Option<usize>,

    /// Run the SSE gateway instead of the terminal chat.
    #[arg(long)]
    serve: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    apply_cli_overrides(&mut config, &cli)?;

    let embedder = create_provider(config.llm.embed_provider, &config)?;
    let chat_provider = create_provider(config.llm.chat_provider, &config)?;
    if !chat_provider.supports_chat() {
        bail!(
            "provider '{}' does not support chat — choose openai, deepseek, or openrouter",
            chat_provider.name()
        );
    }

    let chunker = build_chunker(&config)?;
    let data_dir = PathBuf::from(&config.data.dir);
    let index_path = PathBuf::from(&config.data.index_file);

    let index = if cli.reindex {
        tracing::info!(path = %index_path.display(), "reindex requested");
        let documents = document::load_documents(&data_dir).await?;
        if documents.is_empty() {
            bail!("no documents found in {}", data_dir.display());
        }
        builder::build_index(&documents, &chunker, &embedder, &index_path).await?
    } else {
        store::ensure(&data_dir, &index_path, &chunker, &embedder).await?
    };
    tracing::info!(entries = index.len(), "index ready");

    if cli.serve {
        serve(&config, index, embedder, chat_provider).await
    } else {
        repl(&config, &index, &embedder, &chat_provider).await
    }
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(ref dir) = cli.data_dir {
        config.data.dir = dir.clone();
    }
    if let Some(ref file) = cli.index_file {
        config.data.index_file = file.clone();
    }
    if let Some(ref provider) = cli.embed_provider {
        config.llm.embed_provider = provider.parse()?;
    }
    if let Some(ref provider) = cli.chat_provider {
        config.llm.chat_provider = provider.parse()?;
    }
    if let Some(ref model) = cli.embed_model {
        config.llm.embed_model = Some(model.clone());
    }
    if let Some(ref model) = cli.chat_model {
        config.llm.chat_model = Some(model.clone());
    }
    if let Some(top_k) = cli.top_k {
        config.retrieval.top_k = top_k;
    }
    Ok(())
}

fn require_env(var: &str, kind: ProviderKind) -> anyhow::Result<String> {
    std::env::var(var).with_context(|| format!("{var} is not set (required for provider '{kind}')"))
}

fn create_provider(kind: ProviderKind, config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    let embed_model = config.embed_model_for(kind);
    let chat_model = config.chat_model_for(kind);

    match kind {
        ProviderKind::OpenAi => {
            let key = require_env("OPENAI_API_KEY", kind)?;
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                key,
                "https://api.openai.com/v1".into(),
                chat_model,
                llm.max_tokens,
                embed_model,
                llm.embed_dimensions.unwrap_or(1536),
            )))
        }
        ProviderKind::DeepSeek => {
            let key = require_env("DEEPSEEK_API_KEY", kind)?;
            Ok(AnyProvider::Compatible(CompatibleProvider::new(
                "deepseek".into(),
                key,
                "https://api.deepseek.com".into(),
                chat_model,
                llm.max_tokens,
                embed_model,
                llm.embed_dimensions.unwrap_or(1536),
            )))
        }
        ProviderKind::OpenRouter => {
            let key = require_env("OPENROUTER_API_KEY", kind)?;
            Ok(AnyProvider::Compatible(CompatibleProvider::new(
                "openrouter".into(),
                key,
                "https://api.openrouter.ai/v1".into(),
                chat_model,
                llm.max_tokens,
                embed_model,
                llm.embed_dimensions.unwrap_or(1536),
            )))
        }
        ProviderKind::Gemini => {
            let key = require_env("GOOGLE_API_KEY", kind)?;
            let mut provider = GeminiProvider::new(key, embed_model)
                .with_text_cap(llm.text_cap)
                .with_request_delay(Duration::from_millis(llm.request_delay_ms));
            if let Some(dimensions) = llm.embed_dimensions {
                provider = provider.with_dimensions(dimensions);
            }
            Ok(AnyProvider::Gemini(provider))
        }
    }
}

fn build_chunker(config: &Config) -> anyhow::Result<Chunker> {
    let chunker_config = config.chunking.chunker_config();
    let chunker = match chunker_config.mode {
        ChunkMode::Characters => Chunker::new(chunker_config)?,
        ChunkMode::Tokens => {
            let path = config
                .chunking
                .tokenizer_path
                .as_deref()
                .context("chunking.tokenizer_path is required for token mode")?;
            Chunker::with_tokenizer(chunker_config, Path::new(path))?
        }
    };
    Ok(chunker)
}

async fn repl(
    config: &Config,
    index: &Index,
    embedder: &AnyProvider,
    chat_provider: &AnyProvider,
) -> anyhow::Result<()> {
    println!("LUMI is ready. Ask your questions! (exit to quit)");

    loop {
        let input = tokio::task::spawn_blocking(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("you")
                .allow_empty(true)
                .interact_text()
        })
        .await?;
        let Ok(line) = input else { break };

        let query = line.trim().to_owned();
        if query.is_empty() {
            continue;
        }
        if ["exit", "quit", "q"].contains(&query.to_lowercase().as_str()) {
            break;
        }

        match chat::answer(
            &query,
            &[],
            index,
            embedder,
            chat_provider,
            config.retrieval.top_k,
        )
        .await
        {
            Ok(answer) => println!("{answer}"),
            Err(e) => {
                tracing::error!("chat failed: {e}");
                println!("{}", chat::NO_INFORMATION_ANSWER);
            }
        }
    }

    Ok(())
}

async fn serve(
    config: &Config,
    index: Index,
    embedder: AnyProvider,
    chat_provider: AnyProvider,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let server = RagServer::new(
        &config.gateway.host,
        config.gateway.port,
        Arc::new(index),
        embedder,
        chat_provider,
        config.retrieval.top_k,
        shutdown_rx,
    );
    let handle = tokio::spawn(server.serve());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    handle.await??;
    Ok(())
}
