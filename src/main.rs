// src/main.rs

// --- Declaração dos Módulos ---
mod camera;
mod clock;
mod config;
mod console;
mod db;
mod error;
mod models;
mod repository;
mod services;
mod state;

// --- Imports ---
use crate::{
    camera::{ReplayBackend, RqrrDecoder},
    clock::SystemClock,
    config::AppConfig,
    console::Console,
    repository::SqliteRepository,
    state::AppState,
};
use std::{env, sync::Arc};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Configuração do Logging (Tracing) ---
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                env::var("RUST_LOG")
                    .unwrap_or_else(|_| "presenca_qr=debug,sqlx=warn".into())
                    .into()
            }),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("🚀 Iniciando Presença QR...");

    let config = AppConfig::from_env()?;

    // --- Configuração da Base de Dados ---
    let db_pool = match db::create_db_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("❌ Falha crítica ao inicializar a base de dados: {}", e);
            return Err(anyhow::anyhow!("Falha ao conectar/migrar DB: {}", e));
        }
    };

    // --- Pastas de exportação ---
    let paths = config.export_paths();
    paths.ensure()?;
    tracing::info!("📁 Pasta 'datos QR' em: {}", paths.base().display());
    tracing::info!("🎞️ Câmaras de reprodução em: {}", config.replay_dir.display());

    // --- Criação do Estado da Aplicação ---
    let app_state = AppState::new(
        config.clone(),
        Arc::new(SqliteRepository::new(db_pool)),
        Arc::new(SystemClock),
    );

    let (console, capture_events) = Console::new(
        app_state,
        Arc::new(ReplayBackend::new(config.replay_dir.clone())),
        Arc::new(RqrrDecoder),
    );

    tracing::info!("✅ Pronto. Escreva 'ajuda' para ver os comandos.");
    if let Err(e) = console.run(capture_events).await {
        tracing::error!("❌ Erro fatal na consola: {}", e);
        return Err(e.into());
    }

    tracing::info!("👋 Presença QR terminada.");
    Ok(())
}
