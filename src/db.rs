// src/db.rs
use crate::error::AppResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub async fn create_db_pool(database_url: &str) -> AppResult<SqlitePool> {
    tracing::info!("Ligando à base de dados: {}", database_url);

    // Opções de conexão (criar se não existir, timeout)
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    // O SQLite não cria a pasta do ficheiro
    if let Some(parent) = Path::new(options.get_filename()).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Um único escritor lógico (a consola); poucas conexões chegam
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Cria o esquema se ainda não existir (ficheiros SQL em ./migrations).
pub async fn run_migrations(pool: &SqlitePool) -> AppResult<()> {
    tracing::info!("Executando migrações da base de dados...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrações concluídas.");
    Ok(())
}

/// Base de dados em memória para os testes: uma só conexão que nunca expira,
/// senão cada conexão nova veria uma base vazia.
#[cfg(test)]
pub async fn create_memory_pool() -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
