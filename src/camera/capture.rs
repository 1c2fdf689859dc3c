// src/camera/capture.rs
use super::{CameraBackend, CaptureError, CodeDecoder, Frame, FrameSource};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Eventos enviados pela thread de captura.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Frame para mostrar, com o contorno de cada QR encontrado.
    FrameReady {
        frame: Arc<Frame>,
        detections: Vec<[(i32, i32); 4]>,
    },
    /// Conteúdo de um QR (um evento por QR, pela ordem do descodificador).
    CodeDetected(String),
    /// A leitura falhou e o ciclo terminou. Falta chamar `stop()`.
    DeviceLost(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<CaptureState>,
    wake: Condvar,
    /// Motivo da falha da câmara, se o ciclo terminou por ela.
    lost: Mutex<Option<String>>,
}

/// Controlo de pausa/retoma que pode ser clonado e usado noutras tasks.
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    shared: Arc<Shared>,
}

impl CaptureHandle {
    pub fn state(&self) -> CaptureState {
        *self.shared.state.lock()
    }

    /// O ciclo fica parado antes de ler o próximo frame.
    pub fn pause(&self) {
        let mut state = self.shared.state.lock();
        if *state == CaptureState::Running {
            *state = CaptureState::Paused;
            tracing::debug!("Captura em pausa");
        }
    }

    /// Só retoma um ciclo em pausa; um ciclo parado continua parado.
    pub fn resume(&self) {
        let mut state = self.shared.state.lock();
        if *state == CaptureState::Paused {
            *state = CaptureState::Running;
            self.shared.wake.notify_all();
            tracing::debug!("Captura retomada");
        }
    }

    /// Preenchido quando a leitura falhou. Não depende do evento
    /// `DeviceLost` chegar ao consumidor.
    pub fn lost_reason(&self) -> Option<String> {
        self.shared.lost.lock().clone()
    }

    fn mark_stopped(&self) {
        *self.shared.state.lock() = CaptureState::Stopped;
        self.shared.wake.notify_all();
    }
}

/// Ciclo de captura a correr numa thread dedicada.
///
/// A thread é dona da câmara enquanto corre e devolve-a ao terminar;
/// `stop()` espera pela thread e só então liberta a câmara.
pub struct CaptureLoop {
    device_id: u32,
    handle: CaptureHandle,
    worker: Option<JoinHandle<Box<dyn FrameSource>>>,
}

impl std::fmt::Debug for CaptureLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureLoop")
            .field("device_id", &self.device_id)
            .field("state", &self.handle.state())
            .finish()
    }
}

impl CaptureLoop {
    /// Abre a câmara e arranca a thread. Falha com `DeviceUnavailable`
    /// sem criar thread nenhuma.
    pub fn start(
        backend: &dyn CameraBackend,
        device_id: u32,
        decoder: Arc<dyn CodeDecoder>,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<Self, CaptureError> {
        let source = backend.open(device_id)?;

        let handle = CaptureHandle {
            shared: Arc::new(Shared {
                state: Mutex::new(CaptureState::Running),
                wake: Condvar::new(),
                lost: Mutex::new(None),
            }),
        };

        let worker_handle = handle.clone();
        let worker = std::thread::Builder::new()
            .name(format!("captura-cam{device_id}"))
            .spawn(move || run_worker(device_id, source, decoder, events, worker_handle))
            .map_err(|e| CaptureError::DeviceUnavailable {
                device_id,
                reason: format!("não foi possível criar a thread: {e}"),
            })?;

        tracing::info!("📷 Captura iniciada na câmara {}", device_id);
        Ok(Self {
            device_id,
            handle,
            worker: Some(worker),
        })
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn handle(&self) -> CaptureHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> CaptureState {
        self.handle.state()
    }

    pub fn lost_reason(&self) -> Option<String> {
        self.handle.lost_reason()
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    /// Para o ciclo, espera pela thread e liberta a câmara.
    /// Pode ser chamado de qualquer thread e mais de uma vez.
    pub fn stop(&mut self) {
        self.handle.mark_stopped();

        let Some(worker) = self.worker.take() else {
            return;
        };
        match worker.join() {
            Ok(source) => {
                drop(source);
                tracing::info!("Captura da câmara {} terminada.", self.device_id);
            }
            Err(_) => {
                tracing::error!("A thread de captura da câmara {} entrou em pânico", self.device_id);
            }
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Corpo da thread: devolve a câmara para ser libertada por `stop()`.
fn run_worker(
    device_id: u32,
    mut source: Box<dyn FrameSource>,
    decoder: Arc<dyn CodeDecoder>,
    events: mpsc::Sender<CaptureEvent>,
    handle: CaptureHandle,
) -> Box<dyn FrameSource> {
    loop {
        {
            let mut state = handle.shared.state.lock();
            while *state == CaptureState::Paused {
                handle.shared.wake.wait(&mut state);
            }
            if *state == CaptureState::Stopped {
                break;
            }
        }

        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("❌ Câmara {}: {}", device_id, e);
                *handle.shared.lost.lock() = Some(e.to_string());
                handle.mark_stopped();
                let _ = events.try_send(CaptureEvent::DeviceLost(e.to_string()));
                break;
            }
        };

        let detections = decoder.decode(&frame);
        let mut outlines = Vec::with_capacity(detections.len());
        let mut receiver_gone = false;
        for detection in detections {
            outlines.push(detection.polygon);
            receiver_gone |= !deliver(&events, CaptureEvent::CodeDetected(detection.payload));
        }
        receiver_gone |= !deliver(
            &events,
            CaptureEvent::FrameReady {
                frame: Arc::new(frame),
                detections: outlines,
            },
        );

        if receiver_gone {
            tracing::warn!("Ninguém a ouvir a câmara {}; a terminar captura.", device_id);
            handle.mark_stopped();
            break;
        }
    }
    source
}

/// Nunca bloqueia: com o canal cheio o evento perde-se (o mesmo QR volta
/// a aparecer no frame seguinte). Devolve `false` se o recetor já não existe.
fn deliver(events: &mpsc::Sender<CaptureEvent>, event: CaptureEvent) -> bool {
    match events.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(dropped)) => {
            tracing::trace!("Canal cheio, evento descartado: {:?}", std::mem::discriminant(&dropped));
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
