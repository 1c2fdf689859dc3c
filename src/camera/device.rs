// src/camera/device.rs
use super::{CaptureError, Frame};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Uma câmara aberta. Fechar = fazer drop.
pub trait FrameSource: Send {
    /// Bloqueia até haver um frame. Um erro termina o ciclo de captura.
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;
}

pub trait CameraBackend: Send + Sync {
    fn open(&self, device_id: u32) -> Result<Box<dyn FrameSource>, CaptureError>;
}

/// Testa os índices 0..probe_count e devolve os que abrem.
/// Cada dispositivo é libertado logo a seguir.
pub fn list_devices(backend: &dyn CameraBackend, probe_count: u32) -> Vec<u32> {
    (0..probe_count)
        .filter(|&device_id| match backend.open(device_id) {
            Ok(_source) => true,
            Err(e) => {
                tracing::trace!("Câmara {} não disponível: {}", device_id, e);
                false
            }
        })
        .collect()
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
const REPLAY_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// "Câmaras" gravadas: o dispositivo N é a pasta `<raiz>/cam<N>` com imagens,
/// reproduzidas por ordem de nome em ciclo, a ~30 fps.
#[derive(Debug, Clone)]
pub struct ReplayBackend {
    root: PathBuf,
}

impl ReplayBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn device_dir(&self, device_id: u32) -> PathBuf {
        self.root.join(format!("cam{device_id}"))
    }
}

fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

impl CameraBackend for ReplayBackend {
    fn open(&self, device_id: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
        let dir = self.device_dir(device_id);
        let unavailable = |reason: String| CaptureError::DeviceUnavailable { device_id, reason };

        let files = list_images(&dir).map_err(|e| unavailable(format!("{}: {}", dir.display(), e)))?;
        if files.is_empty() {
            return Err(unavailable(format!("{} não tem imagens", dir.display())));
        }

        tracing::debug!("Câmara de reprodução {} aberta ({} imagens)", device_id, files.len());
        Ok(Box::new(ReplaySource {
            device_id,
            files,
            next: 0,
            last_read: None,
        }))
    }
}

struct ReplaySource {
    device_id: u32,
    files: Vec<PathBuf>,
    next: usize,
    last_read: Option<Instant>,
}

impl FrameSource for ReplaySource {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        // Ritmo de uma câmara real
        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < REPLAY_FRAME_INTERVAL {
                std::thread::sleep(REPLAY_FRAME_INTERVAL - elapsed);
            }
        }
        self.last_read = Some(Instant::now());

        let path = self.files.get(self.next).ok_or_else(|| CaptureError::DeviceLost {
            device_id: self.device_id,
            reason: "sem imagens".into(),
        })?;
        self.next = (self.next + 1) % self.files.len();

        image::open(path)
            .map(|img| img.to_rgb8())
            .map_err(|e| CaptureError::DeviceLost {
                device_id: self.device_id,
                reason: format!("{}: {}", path.display(), e),
            })
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        tracing::debug!("Câmara de reprodução {} libertada", self.device_id);
    }
}
