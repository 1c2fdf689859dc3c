// src/console/mod.rs
//! Consola de operação: comandos por stdin e leitura de QR em simultâneo.

pub mod commands;

use crate::{
    camera::{list_devices, CameraBackend, CaptureEvent, CaptureLoop, CaptureState, CodeDecoder},
    error::{AppError, AppResult},
    models::attendance::RecordOutcome,
    services::{attendance_service, report_service, student_service},
    state::AppState,
};
use commands::{parse_command, Command, HELP};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// De quanto em quanto tempo se verifica se a captura morreu sozinha.
const CAPTURE_WATCH_INTERVAL: Duration = Duration::from_millis(500);

pub struct Console {
    state: AppState,
    backend: Arc<dyn CameraBackend>,
    decoder: Arc<dyn CodeDecoder>,
    events_tx: mpsc::Sender<CaptureEvent>,
    capture: Option<CaptureLoop>,
    /// Matrículas já tratadas desde a última pausa.
    scan_window: HashSet<String>,
}

impl Console {
    /// Devolve a consola e o recetor dos eventos da câmara.
    pub fn new(
        state: AppState,
        backend: Arc<dyn CameraBackend>,
        decoder: Arc<dyn CodeDecoder>,
    ) -> (Self, mpsc::Receiver<CaptureEvent>) {
        let (events_tx, events_rx) = mpsc::channel(state.config.event_buffer);
        let console = Self {
            state,
            backend,
            decoder,
            events_tx,
            capture: None,
            scan_window: HashSet::new(),
        };
        (console, events_rx)
    }

    /// Ciclo principal até `sair` ou fim do stdin.
    pub async fn run(mut self, mut events_rx: mpsc::Receiver<CaptureEvent>) -> AppResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut watch = tokio::time::interval(CAPTURE_WATCH_INTERVAL);
        println!("{HELP}");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match parse_command(&line) {
                        Ok(Command::Quit) => break,
                        Ok(command) => {
                            if let Some(reply) = self.execute(command).await {
                                println!("{reply}");
                            }
                        }
                        Err(usage) => println!("{usage}"),
                    }
                }
                Some(event) = events_rx.recv() => {
                    if let Some(reply) = self.on_capture_event(event).await {
                        println!("{reply}");
                    }
                }
                _ = watch.tick() => {}
            }

            if let Some(reply) = self.reap_finished_capture().await {
                println!("{reply}");
            }

            // Eventos de uma captura já terminada não contam
            if self.capture.is_none() {
                while events_rx.try_recv().is_ok() {}
            }
        }

        self.stop_capture().await;
        Ok(())
    }

    /// Executa um comando e devolve o texto a mostrar.
    pub async fn execute(&mut self, command: Command) -> Option<String> {
        let reply = match command {
            Command::Empty | Command::Quit => return None,
            Command::Help => Ok(HELP.to_string()),
            Command::ListStudents => self.list_students().await,
            Command::Register(new) => student_service::create_student(&self.state, new)
                .await
                .map(|s| {
                    format!(
                        "✅ Aluno {} registado. QR guardado em {}",
                        s.full_name(),
                        self.state.paths.qr_file(&s.code).display()
                    )
                }),
            Command::Remove(code) => student_service::delete_student(&self.state, &code)
                .await
                .map(|()| format!("✅ Aluno {code} removido com as suas presenças.")),
            Command::Report(suffix) => self.export_report(suffix).await,
            Command::Cameras => self.cameras().await.map(|ids| {
                if ids.is_empty() {
                    "❌ Nenhuma câmara detetada.".to_string()
                } else {
                    let ids: Vec<String> = ids.iter().map(u32::to_string).collect();
                    format!("Câmaras disponíveis: {}", ids.join(", "))
                }
            }),
            Command::Start(device_id) => self.start_capture(device_id).await,
            Command::Stop => {
                if self.capture.is_some() {
                    self.stop_capture().await;
                    Ok("Leitura terminada.".to_string())
                } else {
                    Ok("A leitura não está ativa.".to_string())
                }
            }
        };

        Some(reply.unwrap_or_else(|e| {
            tracing::error!("Comando falhou: {:?}", e);
            format!("❌ {}", e.user_message())
        }))
    }

    async fn list_students(&self) -> AppResult<String> {
        let students = student_service::list_students(&self.state).await?;
        if students.is_empty() {
            return Ok("Nenhum aluno registado.".to_string());
        }
        let lines: Vec<String> = students
            .iter()
            .map(|s| {
                format!(
                    "{:<12} {:<30} {:<20} {}",
                    s.code,
                    s.full_name(),
                    s.course.as_deref().unwrap_or("N/A"),
                    s.registered_on.format("%Y-%m-%d")
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }

    async fn export_report(&self, suffix: Option<String>) -> AppResult<String> {
        let rows = report_service::build_report_rows(&self.state).await?;
        let suffix = suffix.as_deref().unwrap_or(report_service::DEFAULT_REPORT_SUFFIX);
        let path = report_service::export_csv(&self.state.paths, &rows, suffix, self.state.clock.now())?;
        Ok(format!("✅ Relatório gravado ({} linhas): {}", rows.len(), path.display()))
    }

    // Abrir câmaras pode bloquear: fora do runtime
    async fn cameras(&self) -> AppResult<Vec<u32>> {
        let backend = self.backend.clone();
        let probe = self.state.config.camera_probe;
        tokio::task::spawn_blocking(move || list_devices(&*backend, probe))
            .await
            .map_err(|e| AppError::Io(std::io::Error::other(e)))
    }

    async fn start_capture(&mut self, device_id: Option<u32>) -> AppResult<String> {
        let lost = self.reap_finished_capture().await;
        if let Some(capture) = &self.capture {
            return Ok(format!("A câmara {} já está ativa.", capture.device_id()));
        }

        let device_id = match device_id {
            Some(id) => id,
            None => match self.cameras().await?.first() {
                Some(&id) => id,
                None => return Ok("❌ Nenhuma câmara detetada.".to_string()),
            },
        };

        let capture = CaptureLoop::start(
            &*self.backend,
            device_id,
            self.decoder.clone(),
            self.events_tx.clone(),
        )?;
        self.capture = Some(capture);
        let started = format!("📷 Câmara {device_id} ativa. À espera de QR...");
        Ok(match lost {
            Some(lost) => format!("{lost}\n{started}"),
            None => started,
        })
    }

    /// Fecha uma captura que terminou sem `parar` (câmara perdida).
    /// Olha para o estado e não para o evento `DeviceLost`, que se perde
    /// se o canal estiver cheio.
    async fn reap_finished_capture(&mut self) -> Option<String> {
        let capture = self.capture.as_ref()?;
        if capture.state() != CaptureState::Stopped {
            return None;
        }
        let reason = capture
            .lost_reason()
            .unwrap_or_else(|| "a leitura terminou".to_string());
        tracing::warn!("Captura da câmara {} terminou: {}", capture.device_id(), reason);
        self.stop_capture().await;
        Some(format!("❌ Câmara perdida: {reason}"))
    }

    /// `stop()` espera pela thread: corre fora do runtime.
    async fn stop_capture(&mut self) {
        let Some(mut capture) = self.capture.take() else {
            return;
        };
        if let Err(e) = tokio::task::spawn_blocking(move || capture.stop()).await {
            tracing::error!("Erro ao parar a captura: {:?}", e);
        }
    }

    /// Trata um evento da câmara; devolve texto para o operador quando há.
    pub async fn on_capture_event(&mut self, event: CaptureEvent) -> Option<String> {
        match event {
            CaptureEvent::FrameReady { frame, detections } => {
                // A imagem é para uma interface gráfica; aqui só fica no log
                tracing::trace!(
                    "Frame {}x{} com {} QR",
                    frame.width(),
                    frame.height(),
                    detections.len()
                );
                None
            }
            CaptureEvent::CodeDetected(code) => self.on_code(code).await,
            // Só conta se for da captura atual (que então já está parada)
            CaptureEvent::DeviceLost(reason) => {
                tracing::debug!("Evento de câmara perdida: {}", reason);
                self.reap_finished_capture().await
            }
        }
    }

    /// Pausa a câmara, regista a presença e retoma depois do atraso configurado.
    /// Outros QR do mesmo frame chegam já em pausa e também são registados;
    /// repetições dentro da pausa são ignoradas.
    async fn on_code(&mut self, code: String) -> Option<String> {
        let capture = self.capture.as_ref()?;
        match capture.state() {
            CaptureState::Running => {
                capture.pause();
                let handle = capture.handle();
                let delay = self.state.config.resume_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    handle.resume();
                });
                self.scan_window.clear();
            }
            CaptureState::Paused if !self.scan_window.contains(&code) => {
                tracing::info!("Mais um QR no mesmo frame: {}", code);
            }
            _ => {
                tracing::debug!("QR '{}' ignorado (câmara em pausa)", code);
                return None;
            }
        }
        self.scan_window.insert(code.clone());

        let reply = match attendance_service::record_attendance(&self.state, &code).await {
            Ok(outcome) => format_outcome(&outcome),
            Err(e) => {
                tracing::error!("Erro ao registar presença de {}: {:?}", code, e);
                format!("[error] ❌ {}", e.user_message())
            }
        };
        Some(reply)
    }
}

fn format_outcome(outcome: &RecordOutcome) -> String {
    format!("[{}] {}", outcome.status.severity(), outcome.message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        camera::{CaptureError, Detection, Frame, FrameSource},
        clock::FixedClock,
        state::testing::test_state,
    };
    use image::Rgb;
    use std::time::Duration;
    use testresult::TestResult;

    struct OneCamera;

    impl CameraBackend for OneCamera {
        fn open(&self, device_id: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
            if device_id == 1 {
                Ok(Box::new(BlankSource))
            } else {
                Err(CaptureError::DeviceUnavailable {
                    device_id,
                    reason: "não existe".into(),
                })
            }
        }
    }

    struct BlankSource;

    impl FrameSource for BlankSource {
        fn read_frame(&mut self) -> Result<Frame, CaptureError> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(Frame::from_pixel(4, 4, Rgb([255, 255, 255])))
        }
    }

    /// Câmara 0: três frames e depois falha.
    struct FlakyCamera;

    impl CameraBackend for FlakyCamera {
        fn open(&self, device_id: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
            if device_id == 0 {
                Ok(Box::new(FlakySource { remaining: 3 }))
            } else {
                Err(CaptureError::DeviceUnavailable {
                    device_id,
                    reason: "não existe".into(),
                })
            }
        }
    }

    struct FlakySource {
        remaining: usize,
    }

    impl FrameSource for FlakySource {
        fn read_frame(&mut self) -> Result<Frame, CaptureError> {
            std::thread::sleep(Duration::from_millis(2));
            if self.remaining == 0 {
                return Err(CaptureError::DeviceLost {
                    device_id: 0,
                    reason: "cabo desligado".into(),
                });
            }
            self.remaining -= 1;
            Ok(Frame::from_pixel(4, 4, Rgb([255, 255, 255])))
        }
    }

    struct NoCodes;

    impl CodeDecoder for NoCodes {
        fn decode(&self, _frame: &Frame) -> Vec<Detection> {
            Vec::new()
        }
    }

    async fn console() -> (Console, mpsc::Receiver<CaptureEvent>, tempfile::TempDir) {
        console_with(Arc::new(OneCamera), 8).await
    }

    async fn console_with(
        backend: Arc<dyn CameraBackend>,
        event_buffer: usize,
    ) -> (Console, mpsc::Receiver<CaptureEvent>, tempfile::TempDir) {
        let (mut state, dir) = test_state(Arc::new(FixedClock::at("2025-03-07 08:00:00"))).await;
        state.config.event_buffer = event_buffer;
        let (console, rx) = Console::new(state, backend, Arc::new(NoCodes));
        (console, rx, dir)
    }

    async fn run(console: &mut Console, line: &str) -> String {
        let command = parse_command(line).expect("comando de teste válido");
        console.execute(command).await.unwrap_or_default()
    }

    #[tokio::test]
    async fn register_list_report_and_remove() -> TestResult {
        let (mut console, _rx, _dir) = console().await;

        assert!(run(&mut console, "relatorio").await.starts_with("❌"));
        assert!(run(&mut console, "registrar 2025001;Juan;Pérez;Matemáticas I;800080").await.starts_with("✅"));
        assert!(run(&mut console, "registrar 2025001;Otro;Nombre").await.contains("já está registada"));
        assert!(run(&mut console, "alunos").await.contains("Juan Pérez"));

        console.capture = None;
        let scan = console.on_capture_event(CaptureEvent::CodeDetected("2025001".into())).await;
        assert_eq!(scan, None); // sem captura ativa não há leitura

        console.state.repo.insert_event(1, "2025001", console.state.clock.now()).await?;
        assert!(run(&mut console, "relatorio turma_a").await.contains("turma_a_080000.csv"));

        assert!(run(&mut console, "remover 2025001").await.starts_with("✅"));
        assert!(run(&mut console, "remover 2025001").await.contains("não encontrado"));
        Ok(())
    }

    #[tokio::test]
    async fn scan_pauses_records_and_resumes_after_delay() -> TestResult {
        let (mut console, _rx, _dir) = console().await;
        run(&mut console, "registrar 2025001;Juan;Pérez").await;

        assert_eq!(run(&mut console, "cameras").await, "Câmaras disponíveis: 1");
        assert!(run(&mut console, "iniciar").await.contains("Câmara 1 ativa"));
        assert!(run(&mut console, "iniciar 1").await.contains("já está ativa"));

        let first = console.on_capture_event(CaptureEvent::CodeDetected("2025001".into())).await;
        assert!(first.is_some_and(|m| m.starts_with("[success]")));
        let handle = console.capture.as_ref().map(CaptureLoop::handle).expect("captura ativa");
        assert_eq!(handle.state(), CaptureState::Paused);

        // Durante a pausa as leituras repetidas são ignoradas
        let ignored = console.on_capture_event(CaptureEvent::CodeDetected("2025001".into())).await;
        assert_eq!(ignored, None);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.state(), CaptureState::Running);

        let second = console.on_capture_event(CaptureEvent::CodeDetected("2025001".into())).await;
        assert!(second.is_some_and(|m| m.starts_with("[warning]")));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let unknown = console.on_capture_event(CaptureEvent::CodeDetected("9999999".into())).await;
        assert!(unknown.is_some_and(|m| m.starts_with("[error]")));

        assert_eq!(run(&mut console, "parar").await, "Leitura terminada.");
        assert_eq!(handle.state(), CaptureState::Stopped);
        assert_eq!(run(&mut console, "parar").await, "A leitura não está ativa.");
        Ok(())
    }

    #[tokio::test]
    async fn lost_device_stops_the_session() -> TestResult {
        let (mut console, mut rx, _dir) = console_with(Arc::new(FlakyCamera), 8).await;
        assert!(run(&mut console, "iniciar 4").await.contains("indisponível"));

        run(&mut console, "iniciar 0").await;
        let lost = loop {
            match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await? {
                Some(event @ CaptureEvent::DeviceLost(_)) => break event,
                Some(_) => continue,
                None => panic!("canal fechado"),
            }
        };
        let reply = console.on_capture_event(lost).await;
        assert!(reply.is_some_and(|m| m.contains("cabo desligado")));
        assert!(console.capture.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn lost_device_is_noticed_even_when_its_event_is_dropped() -> TestResult {
        let (mut console, _rx, _dir) = console_with(Arc::new(FlakyCamera), 2).await;
        assert!(run(&mut console, "iniciar 0").await.contains("Câmara 0 ativa"));

        // Ninguém lê o canal: enche com os primeiros frames e o DeviceLost perde-se
        let handle = console.capture.as_ref().map(CaptureLoop::handle).expect("captura ativa");
        for _ in 0..200 {
            if handle.state() == CaptureState::Stopped {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handle.state(), CaptureState::Stopped);

        let again = run(&mut console, "iniciar 0").await;
        assert!(again.contains("Câmara perdida: "), "{again}");
        assert!(again.contains("Câmara 0 ativa"), "{again}");

        assert_eq!(run(&mut console, "parar").await, "Leitura terminada.");
        Ok(())
    }

    #[tokio::test]
    async fn stale_loss_event_does_not_stop_a_running_capture() -> TestResult {
        let (mut console, _rx, _dir) = console().await;
        run(&mut console, "iniciar 1").await;

        let reply = console.on_capture_event(CaptureEvent::DeviceLost("antiga".into())).await;
        assert_eq!(reply, None);
        assert!(console.capture.as_ref().is_some_and(|c| c.state() == CaptureState::Running));
        Ok(())
    }

    #[tokio::test]
    async fn every_student_in_the_same_frame_is_recorded() -> TestResult {
        let (mut console, _rx, _dir) = console().await;
        run(&mut console, "registrar 2025001;Juan;Pérez").await;
        run(&mut console, "registrar 2025002;Ana;Gómez").await;
        console.state.config.resume_delay = Duration::from_secs(5);
        run(&mut console, "iniciar 1").await;

        // Dois QR no mesmo frame: o segundo chega já com a câmara em pausa
        for code in ["2025001", "2025002"] {
            let reply = console.on_capture_event(CaptureEvent::CodeDetected(code.into())).await;
            assert!(reply.is_some_and(|m| m.starts_with("[success]")), "{code}");
        }
        let repeated = console.on_capture_event(CaptureEvent::CodeDetected("2025001".into())).await;
        assert_eq!(repeated, None);

        let events = console.state.repo.list_events().await?;
        let codes: Vec<&str> = events.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["2025001", "2025002"]);
        Ok(())
    }
}
