// src/services/attendance_service.rs
use crate::{
    error::AppResult,
    models::attendance::{RecordOutcome, RecordStatus},
    state::AppState,
};

/// Regista a presença de uma matrícula lida no QR, no máximo uma por dia civil.
///
/// `Unknown` e `AlreadyRecorded` não alteram nada. Erros de base de dados
/// vêm como `Err`, distintos dos dois casos anteriores.
pub async fn record_attendance(state: &AppState, code: &str) -> AppResult<RecordOutcome> {
    // 1. O aluno existe?
    let Some(student) = state.repo.find_student(code).await? else {
        tracing::warn!("Leitura de matrícula não registada: {}", code);
        return Ok(RecordOutcome::unknown(code));
    };

    // 2. Já tem presença hoje? (dia civil da hora local)
    let now = state.clock.now();
    if let Some(existing) = state.repo.find_event_on_date(code, now.date()).await? {
        tracing::debug!("{} já registado hoje às {}", code, existing.scanned_at.format("%H:%M:%S"));
        return Ok(RecordOutcome {
            status: RecordStatus::AlreadyRecorded,
            code: code.to_string(),
            student: Some(student),
            timestamp: Some(existing.scanned_at),
        });
    }

    // 3. Regista
    let event = state.repo.insert_event(student.id, code, now).await?;
    tracing::info!("✅ Presença de {} ({}) às {}", student.full_name(), code, event.scanned_at);

    Ok(RecordOutcome {
        status: RecordStatus::Success,
        code: code.to_string(),
        student: Some(student),
        timestamp: Some(event.scanned_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::{Clock, FixedClock},
        error::AppError,
        models::student::NewStudent,
        services::student_service,
        state::testing::{test_state, test_state_with_pool},
    };
    use chrono::Duration;
    use std::sync::Arc;
    use testresult::TestResult;

    async fn register(state: &AppState, code: &str) -> TestResult {
        student_service::create_student(
            state,
            NewStudent {
                code: code.into(),
                first_name: "Juan".into(),
                last_name: "Pérez".into(),
                course: Some("Matemáticas I".into()),
                qr_color: Some("800080".into()),
            },
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn first_scan_succeeds_then_warns_then_unknown_code_errors() -> TestResult {
        let clock = Arc::new(FixedClock::at("2025-03-07 08:15:00"));
        let (state, _dir) = test_state(clock.clone()).await;
        register(&state, "2025001").await?;

        let first = record_attendance(&state, "2025001").await?;
        assert_eq!(first.status, RecordStatus::Success);
        assert_eq!(first.status.severity(), "success");
        assert_eq!(first.timestamp, Some(clock.now()));

        clock.advance(Duration::minutes(5));
        let second = record_attendance(&state, "2025001").await?;
        assert_eq!(second.status.severity(), "warning");
        // Mostra a hora da primeira leitura
        assert_eq!(second.timestamp, first.timestamp);
        assert!(second.message().contains("08:15:00"));

        let unknown = record_attendance(&state, "9999999").await?;
        assert_eq!(unknown.status.severity(), "error");
        assert!(unknown.student.is_none());
        assert!(unknown.message().contains("9999999"));

        assert_eq!(state.repo.list_events().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn next_calendar_day_records_again() -> TestResult {
        let clock = Arc::new(FixedClock::at("2025-03-07 23:59:00"));
        let (state, _dir) = test_state(clock.clone()).await;
        register(&state, "2025001").await?;

        assert_eq!(record_attendance(&state, "2025001").await?.status, RecordStatus::Success);

        clock.advance(Duration::minutes(2)); // 00:01 do dia seguinte
        assert_eq!(record_attendance(&state, "2025001").await?.status, RecordStatus::Success);
        assert_eq!(record_attendance(&state, "2025001").await?.status, RecordStatus::AlreadyRecorded);

        assert_eq!(state.repo.list_events().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_codes_leave_no_trace() -> TestResult {
        let (state, _dir) = test_state(Arc::new(FixedClock::at("2025-03-07 08:00:00"))).await;
        register(&state, "2025001").await?;

        for code in ["9999999", "", "2025001 ", "2025"] {
            assert_eq!(record_attendance(&state, code).await?.status, RecordStatus::Unknown);
        }
        assert!(state.repo.list_events().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn database_down_is_an_error_not_an_unknown_code() -> TestResult {
        let (state, pool, _dir) = test_state_with_pool(Arc::new(FixedClock::at("2025-03-07 08:00:00"))).await;
        register(&state, "2025001").await?;

        pool.close().await;
        let result = record_attendance(&state, "2025001").await;
        assert!(matches!(result, Err(AppError::Storage(_))), "{result:?}");
        Ok(())
    }

    #[tokio::test]
    async fn failed_insert_is_an_error_and_records_nothing() -> TestResult {
        let (state, pool, _dir) = test_state_with_pool(Arc::new(FixedClock::at("2025-03-07 08:00:00"))).await;
        register(&state, "2025001").await?;

        sqlx::query(
            "CREATE TRIGGER recusar_presencas BEFORE INSERT ON presencas \
             BEGIN SELECT RAISE(ABORT, 'disco cheio'); END",
        )
        .execute(&pool)
        .await?;

        let result = record_attendance(&state, "2025001").await;
        assert!(matches!(result, Err(AppError::Storage(_))), "{result:?}");
        assert!(state.repo.list_events().await?.is_empty());
        Ok(())
    }
}
