// src/camera/decoder.rs
use super::Frame;

/// Um QR encontrado num frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub payload: String,
    /// Cantos do QR no frame, em pixels.
    pub polygon: [(i32, i32); 4],
}

pub trait CodeDecoder: Send + Sync {
    /// Todos os QR legíveis do frame, pela ordem do descodificador.
    fn decode(&self, frame: &Frame) -> Vec<Detection>;
}

/// Descodificador baseado em `rqrr` (trabalha em tons de cinzento).
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl CodeDecoder for RqrrDecoder {
    fn decode(&self, frame: &Frame) -> Vec<Detection> {
        let gray = image::imageops::grayscale(frame);
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            gray.width() as usize,
            gray.height() as usize,
            |x, y| gray.get_pixel(x as u32, y as u32).0[0],
        );

        prepared
            .detect_grids()
            .into_iter()
            .filter_map(|grid| {
                let polygon = grid.bounds.map(|p| (p.x, p.y));
                match grid.decode() {
                    Ok((_meta, payload)) => Some(Detection { payload, polygon }),
                    Err(e) => {
                        // QR visto mas ilegível (desfocado, cortado...)
                        tracing::trace!("QR ignorado: {:?}", e);
                        None
                    }
                }
            })
            .collect()
    }
}
