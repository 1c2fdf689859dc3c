// src/error.rs
use crate::{camera::CaptureError, services::qr_service::QrError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // Dados de entrada com formato inválido (campos obrigatórios vazios, etc.)
    #[error("Dados inválidos: {0}")]
    Validation(String),

    #[error("A matrícula {0} já está registada")]
    DuplicateCode(String),

    #[error("Aluno com matrícula {0} não encontrado")]
    NotFound(String),

    // A emissão do QR falhou; nenhum aluno foi criado
    #[error("Erro ao gerar o QR: {0}")]
    QrGeneration(#[from] QrError),

    #[error("Erro na câmara: {0}")]
    Capture(#[from] CaptureError),

    #[error("Erro na base de dados: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Erro de migração da base de dados: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Não há registos de presença para exportar")]
    EmptyDataset,

    #[error("Erro de ficheiro: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro ao escrever CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Erro de configuração: {0}")]
    Config(String),
}

impl AppError {
    /// Mensagem curta para mostrar ao operador (o detalhe vai para o log).
    pub fn user_message(&self) -> String {
        match self {
            AppError::Storage(_) | AppError::Migration(_) => "Erro ao aceder aos dados.".to_string(),
            AppError::Io(_) | AppError::Csv(_) => "Erro ao gravar o ficheiro.".to_string(),
            other => other.to_string(),
        }
    }
}

// Tipo Result padrão para a aplicação
pub type AppResult<T = ()> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_hide_details_from_the_operator() {
        let err = AppError::Storage(sqlx::Error::RowNotFound);
        assert_eq!(err.user_message(), "Erro ao aceder aos dados.");

        let err = AppError::DuplicateCode("2025001".into());
        assert_eq!(err.user_message(), "A matrícula 2025001 já está registada");
    }
}
