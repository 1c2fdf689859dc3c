// src/camera/mod.rs
//! Câmara: dispositivos, descodificação de QR e o ciclo de captura.
//!
//! O ciclo corre numa thread própria e envia eventos por um canal `mpsc`;
//! quem consome decide quando pausar e retomar.

pub mod capture;
pub mod decoder;
pub mod device;

pub use capture::{CaptureEvent, CaptureHandle, CaptureLoop, CaptureState};
pub use decoder::{CodeDecoder, Detection, RqrrDecoder};
pub use device::{list_devices, CameraBackend, FrameSource, ReplayBackend};

use thiserror::Error;

/// Imagem de câmara em RGB.
pub type Frame = image::RgbImage;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Câmara {device_id} indisponível: {reason}")]
    DeviceUnavailable { device_id: u32, reason: String },

    #[error("Ligação à câmara {device_id} perdida: {reason}")]
    DeviceLost { device_id: u32, reason: String },
}
