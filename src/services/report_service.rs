// src/services/report_service.rs
use crate::{
    config::{is_safe_file_component, ExportPaths},
    error::{AppError, AppResult},
    models::{attendance::ReportRow, student::Student},
    state::AppState,
};
use chrono::NaiveDateTime;
use std::{collections::HashMap, path::PathBuf};

pub const DEFAULT_REPORT_SUFFIX: &str = "asistencia_historico";

/// Junta cada presença com o seu aluno (pela matrícula).
/// Presenças de alunos que já não existem ficam de fora.
pub async fn build_report_rows(state: &AppState) -> AppResult<Vec<ReportRow>> {
    let events = state.repo.list_events().await?;
    let students: HashMap<String, Student> = state
        .repo
        .list_students()
        .await?
        .into_iter()
        .map(|student| (student.code.clone(), student))
        .collect();

    let rows: Vec<ReportRow> = events
        .into_iter()
        .filter_map(|event| {
            let student = students.get(&event.code)?;
            Some(ReportRow {
                event_id: event.id,
                code: event.code,
                first_name: student.first_name.clone(),
                last_name: student.last_name.clone(),
                course: student.course.clone(),
                date: event.scanned_at.format("%Y-%m-%d").to_string(),
                time: event.scanned_at.format("%H:%M:%S").to_string(),
            })
        })
        .collect();

    tracing::debug!("Relatório com {} linhas.", rows.len());
    Ok(rows)
}

/// Grava `<datos QR>/<AAAA-MM-DD>/<sufixo>_<HHMMSS>.csv` e devolve o caminho absoluto.
/// Dois relatórios no mesmo segundo escrevem o mesmo ficheiro (fica o último).
pub fn export_csv(
    paths: &ExportPaths,
    rows: &[ReportRow],
    suffix: &str,
    now: NaiveDateTime,
) -> AppResult<PathBuf> {
    if !is_safe_file_component(suffix) {
        return Err(AppError::Validation(format!(
            "Sufixo de relatório inválido: '{suffix}'"
        )));
    }
    if rows.is_empty() {
        return Err(AppError::EmptyDataset);
    }

    let folder = paths.report_dir(now.date());
    std::fs::create_dir_all(&folder)?;
    let file_path = folder.join(format!("{}_{}.csv", suffix, now.format("%H%M%S")));

    let mut writer = csv::Writer::from_path(&file_path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let absolute = std::fs::canonicalize(&file_path)?;
    tracing::info!("📄 Relatório gravado em {}", absolute.display());
    Ok(absolute)
}
