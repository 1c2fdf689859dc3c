// src/services/student_service.rs
use crate::{
    config::is_safe_file_component,
    error::{AppError, AppResult},
    models::student::{NewStudent, Student, StudentRecord, DEFAULT_QR_COLOR},
    services::qr_service,
    state::AppState,
};

/// Valida, gera o QR e regista o aluno.
///
/// O PNG é gravado antes da inserção e não é apagado se esta falhar
/// (ex: matrícula duplicada); volta a ser escrito no próximo registo.
pub async fn create_student(state: &AppState, new: NewStudent) -> AppResult<Student> {
    let code = new.code.trim();
    let first_name = new.first_name.trim();
    let last_name = new.last_name.trim();
    tracing::info!("Tentando registar aluno: {}", code);

    if code.is_empty() || first_name.is_empty() || last_name.is_empty() {
        tracing::warn!("Registo rejeitado: campos obrigatórios vazios");
        return Err(AppError::Validation(
            "Matrícula, nome e apelido não podem estar vazios".into(),
        ));
    }
    if !is_safe_file_component(code) {
        tracing::warn!("Registo rejeitado: matrícula '{}' com separadores de caminho", code);
        return Err(AppError::Validation(
            "A matrícula não pode conter '/', '\\' nem '..'".into(),
        ));
    }

    let course = new
        .course
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let qr_color = new
        .qr_color
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_QR_COLOR)
        .to_string();

    // 1. QR primeiro: sem QR não há aluno
    let qr_path = qr_service::issue(&state.paths, code, &qr_color).map_err(|e| {
        tracing::error!("Falha ao gerar QR para {}: {}", code, e);
        AppError::from(e)
    })?;

    // 2. Inserção (DuplicateCode vem do repositório)
    let record = StudentRecord {
        code: code.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        course,
        qr_color,
        registered_on: state.clock.now(),
    };
    let student = state.repo.insert_student(&record).await?;

    tracing::info!("✅ Aluno '{}' registado. QR em {}", student.code, qr_path.display());
    Ok(student)
}

/// Remove o aluno e todas as suas presenças (uma transação).
pub async fn delete_student(state: &AppState, code: &str) -> AppResult<()> {
    tracing::info!("Tentando remover aluno: {}", code);
    if state.repo.delete_student_cascade(code).await? {
        tracing::info!("✅ Aluno '{}' removido com as suas presenças.", code);
        Ok(())
    } else {
        tracing::warn!("Falha ao remover: aluno '{}' não encontrado.", code);
        Err(AppError::NotFound(code.to_string()))
    }
}

/// Todos os alunos, por ordem de registo.
pub async fn list_students(state: &AppState) -> AppResult<Vec<Student>> {
    state.repo.list_students().await
}

pub async fn find_student(state: &AppState, code: &str) -> AppResult<Option<Student>> {
    state.repo.find_student(code).await
}
