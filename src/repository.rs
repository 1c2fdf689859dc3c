// src/repository.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        attendance::AttendanceEvent,
        student::{Student, StudentRecord},
    },
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::SqlitePool;

/// As únicas consultas de que os serviços precisam.
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    async fn find_student(&self, code: &str) -> AppResult<Option<Student>>;

    /// Todos os alunos, por ordem de inserção.
    async fn list_students(&self) -> AppResult<Vec<Student>>;

    /// Falha com `DuplicateCode` se a matrícula já existir.
    async fn insert_student(&self, record: &StudentRecord) -> AppResult<Student>;

    /// Apaga as presenças e o aluno numa só transação.
    /// Devolve `false` (sem alterações) se o aluno não existir.
    async fn delete_student_cascade(&self, code: &str) -> AppResult<bool>;

    /// Uma presença de `code` no dia civil `day`, se houver.
    async fn find_event_on_date(&self, code: &str, day: NaiveDate) -> AppResult<Option<AttendanceEvent>>;

    async fn insert_event(
        &self,
        student_id: i64,
        code: &str,
        scanned_at: NaiveDateTime,
    ) -> AppResult<AttendanceEvent>;

    /// Todas as presenças, por ordem de inserção.
    async fn list_events(&self) -> AppResult<Vec<AttendanceEvent>>;
}

#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const STUDENT_COLUMNS: &str =
    "id, code, first_name, last_name, course, qr_color, photo_path, registered_on, active";

#[async_trait]
impl AttendanceRepository for SqliteRepository {
    async fn find_student(&self, code: &str) -> AppResult<Option<Student>> {
        tracing::debug!("Buscando aluno por matrícula: {}", code);
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM alunos WHERE code = ?1");
        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(student)
    }

    async fn list_students(&self) -> AppResult<Vec<Student>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM alunos ORDER BY id ASC");
        let students = sqlx::query_as::<_, Student>(&sql)
            .fetch_all(&self.pool)
            .await?;
        tracing::debug!("Encontrados {} alunos.", students.len());
        Ok(students)
    }

    async fn insert_student(&self, record: &StudentRecord) -> AppResult<Student> {
        let mut tx = self.pool.begin().await?;

        let insert_result = sqlx::query(
            r#"
            INSERT INTO alunos (code, first_name, last_name, course, qr_color, photo_path, registered_on, active)
            VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, 1)
            "#,
        )
        .bind(&record.code)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.course)
        .bind(&record.qr_color)
        .bind(record.registered_on)
        .execute(&mut *tx)
        .await;

        let done = match insert_result {
            Ok(done) => done,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::warn!("Matrícula '{}' já existe.", record.code);
                tx.rollback().await?;
                return Err(AppError::DuplicateCode(record.code.clone()));
            }
            Err(e) => {
                tx.rollback().await?;
                return Err(e.into());
            }
        };

        tx.commit().await?;

        Ok(Student {
            id: done.last_insert_rowid(),
            code: record.code.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            course: record.course.clone(),
            qr_color: record.qr_color.clone(),
            photo_path: None,
            registered_on: record.registered_on,
            active: true,
        })
    }

    async fn delete_student_cascade(&self, code: &str) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM alunos WHERE code = ?1")
            .bind(code)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        // 1. Presenças primeiro, depois o aluno
        let removed_events = sqlx::query("DELETE FROM presencas WHERE code = ?1")
            .bind(code)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM alunos WHERE code = ?1")
            .bind(code)
            .execute(&mut *tx)
            .await?;

        // Se algo falhar acima, o drop de `tx` faz rollback
        tx.commit().await?;
        tracing::debug!("Removidas {} presenças de {}", removed_events, code);
        Ok(true)
    }

    async fn find_event_on_date(&self, code: &str, day: NaiveDate) -> AppResult<Option<AttendanceEvent>> {
        // Intervalo [dia 00:00, dia seguinte 00:00) na hora local guardada
        let start = day.and_time(NaiveTime::MIN);
        let end = day
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN))
            .unwrap_or(NaiveDateTime::MAX);

        let event = sqlx::query_as::<_, AttendanceEvent>(
            r#"
            SELECT id, student_id, code, scanned_at
            FROM presencas
            WHERE code = ?1 AND scanned_at >= ?2 AND scanned_at < ?3
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(code)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn insert_event(
        &self,
        student_id: i64,
        code: &str,
        scanned_at: NaiveDateTime,
    ) -> AppResult<AttendanceEvent> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query("INSERT INTO presencas (student_id, code, scanned_at) VALUES (?1, ?2, ?3)")
            .bind(student_id)
            .bind(code)
            .bind(scanned_at)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
        tx.commit().await?;

        Ok(AttendanceEvent {
            id,
            student_id,
            code: code.to_string(),
            scanned_at,
        })
    }

    async fn list_events(&self) -> AppResult<Vec<AttendanceEvent>> {
        let events = sqlx::query_as::<_, AttendanceEvent>(
            "SELECT id, student_id, code, scanned_at FROM presencas ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }
}
