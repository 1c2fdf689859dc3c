// src/models/attendance.rs
use crate::models::student::Student;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Uma leitura aceite, lida da tabela `presencas`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AttendanceEvent {
    pub id: i64,
    pub student_id: i64, // informativo, sem FK
    pub code: String,    // cópia da matrícula no momento da leitura
    pub scanned_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Success,
    AlreadyRecorded,
    Unknown,
}

impl RecordStatus {
    /// Nível mostrado ao operador (verde / amarelo / vermelho).
    pub fn severity(self) -> &'static str {
        match self {
            RecordStatus::Success => "success",
            RecordStatus::AlreadyRecorded => "warning",
            RecordStatus::Unknown => "error",
        }
    }
}

/// Resultado de uma leitura de QR.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub status: RecordStatus,
    pub code: String,
    pub student: Option<Student>,
    /// Hora da presença nova (Success) ou da já existente (AlreadyRecorded).
    pub timestamp: Option<NaiveDateTime>,
}

impl RecordOutcome {
    pub fn unknown(code: &str) -> Self {
        Self {
            status: RecordStatus::Unknown,
            code: code.to_string(),
            student: None,
            timestamp: None,
        }
    }

    pub fn message(&self) -> String {
        match (&self.status, &self.student) {
            (RecordStatus::Success, Some(student)) => format!(
                "✅ Presença registada para {} ({}).",
                student.full_name(),
                self.code
            ),
            (RecordStatus::AlreadyRecorded, Some(student)) => format!(
                "⚠️ {} já registou presença hoje às {}.",
                student.full_name(),
                self.timestamp
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_default()
            ),
            _ => format!("❌ Matrícula não registada: {}", self.code),
        }
    }
}

/// Linha do relatório CSV (presença + dados do aluno).
/// Os nomes das colunas são os do ficheiro exportado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "ID_Asistencia")]
    pub event_id: i64,
    #[serde(rename = "Matrícula")]
    pub code: String,
    #[serde(rename = "Nombre")]
    pub first_name: String,
    #[serde(rename = "Apellido")]
    pub last_name: String,
    #[serde(rename = "Curso")]
    pub course: Option<String>,
    #[serde(rename = "Fecha")]
    pub date: String, // AAAA-MM-DD
    #[serde(rename = "Hora")]
    pub time: String, // HH:MM:SS
}
