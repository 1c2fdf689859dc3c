// src/models/student.rs
use chrono::NaiveDateTime;
use sqlx::FromRow;

/// Cor do QR quando o operador não escolhe nenhuma.
pub const DEFAULT_QR_COLOR: &str = "000000";

// Representa um aluno lido da tabela 'alunos'
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Student {
    pub id: i64, // SQLite usa i64 para inteiros
    /// Matrícula: única, imutável, é o conteúdo do QR.
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    pub course: Option<String>,
    pub qr_color: String, // 6 dígitos hex, ex: "800080"
    pub photo_path: Option<String>,
    pub registered_on: NaiveDateTime, // hora local
    // Guardado mas nunca usado como filtro
    pub active: bool,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Dados pedidos ao operador para registar um aluno.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewStudent {
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    pub course: Option<String>,
    pub qr_color: Option<String>,
}

/// Linha pronta a inserir (já validada e normalizada).
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    pub course: Option<String>,
    pub qr_color: String,
    pub registered_on: NaiveDateTime,
}
