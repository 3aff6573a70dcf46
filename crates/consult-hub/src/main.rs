use std::net::SocketAddr;
use std::sync::Arc;

use consult_core::config::ConsultConfig;
use consult_core::embed::Embedder;
use consult_llm::gateway::ChatGateway;
use consult_llm::http::HttpChatGateway;
use consult_vectorstore::cache::SemanticCache;
use consult_vectorstore::manager::{SqliteVectorStore, VectorStore};
use consult_hub::{app, hub};
use rusqlite::Connection;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consult_hub=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("CONSULT_CONFIG").ok();
    let config = ConsultConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({}), using defaults", e);
        ConsultConfig::default()
    });
    let config = Arc::new(config);

    let chat_impl = Arc::new(HttpChatGateway::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
        config.llm.chat_model.clone(),
        config.llm.embedding_model.clone(),
    ));
    let chat: Arc<dyn ChatGateway> = chat_impl.clone();
    let embedder: Arc<dyn Embedder> = chat_impl;

    let store_conn = open_db(&config.vectorstore.db_path)?;
    consult_vectorstore::db::init_db(&store_conn)?;
    let vectorstore: Arc<dyn VectorStore> =
        Arc::new(SqliteVectorStore::new(store_conn, embedder.clone()));

    let cache_conn = open_db(&config.vectorstore.db_path)?;
    consult_vectorstore::db::init_db(&cache_conn)?;
    let faq_cache = Arc::new(SemanticCache::new(
        cache_conn,
        embedder,
        vectorstore.clone(),
        config.vectorstore.cache_threshold,
    ));

    let repo_conn = open_sessions_db(&config.vectorstore.db_path)?;
    consult_repo::db::init_db(&repo_conn)?;
    let repo = Arc::new(consult_repo::SessionRepo::new(repo_conn));

    let hub = Arc::new(hub::Hub::new(config.clone(), repo, chat, vectorstore, faq_cache));
    let router = app::build_router(hub);

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    info!("consult-hub listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn open_db(path: &str) -> anyhow::Result<Connection> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Connection::open(path)?)
}

fn open_sessions_db(vectorstore_path: &str) -> anyhow::Result<Connection> {
    let path = std::path::Path::new(vectorstore_path)
        .with_file_name("sessions.db");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Connection::open(path)?)
}
