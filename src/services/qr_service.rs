// src/services/qr_service.rs
use crate::config::ExportPaths;
use image::{ImageFormat, Rgb, RgbImage};
use qrcode::{Color, EcLevel, QrCode};
use std::path::PathBuf;
use thiserror::Error;

/// Pixels por módulo do QR.
const MODULE_SIZE: u32 = 10;
/// Margem branca, em módulos.
const BORDER_MODULES: u32 = 4;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Error)]
pub enum QrError {
    #[error("Cor inválida '{0}': esperados 6 dígitos hexadecimais")]
    InvalidColor(String),

    #[error("Falha ao desenhar/gravar o QR: {0}")]
    RenderFailure(String),
}

/// Converte "RRGGBB" nos três canais RGB.
pub fn parse_hex_color(color: &str) -> Result<Rgb<u8>, QrError> {
    let invalid = || QrError::InvalidColor(color.to_string());
    if color.len() != 6 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&color[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Desenha `data` como QR (correção de erros alta) com a cor pedida sobre branco.
pub fn render_qr(data: &str, fill: Rgb<u8>) -> Result<RgbImage, QrError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)
        .map_err(|e| QrError::RenderFailure(e.to_string()))?;

    let modules = u32::try_from(code.width())
        .map_err(|e| QrError::RenderFailure(e.to_string()))?;
    let side = (modules + 2 * BORDER_MODULES) * MODULE_SIZE;
    let mut img = RgbImage::from_pixel(side, side, BACKGROUND);

    for (index, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let index = index as u32;
        let x0 = (index % modules + BORDER_MODULES) * MODULE_SIZE;
        let y0 = (index / modules + BORDER_MODULES) * MODULE_SIZE;
        for dy in 0..MODULE_SIZE {
            for dx in 0..MODULE_SIZE {
                img.put_pixel(x0 + dx, y0 + dy, fill);
            }
        }
    }
    Ok(img)
}

/// Gera o QR de `code` e grava-o em `datos QR/QR/student_<code>.png`,
/// substituindo o ficheiro anterior se existir.
pub fn issue(paths: &ExportPaths, code: &str, color: &str) -> Result<PathBuf, QrError> {
    let fill = parse_hex_color(color)?;
    let img = render_qr(code, fill)?;

    let io_err = |e: std::io::Error| QrError::RenderFailure(e.to_string());
    std::fs::create_dir_all(paths.qr_dir()).map_err(io_err)?;

    // Grava num temporário e renomeia: nunca fica um PNG a meio
    let target = paths.qr_file(code);
    let tmp = target.with_extension("png.tmp");
    if let Err(e) = img.save_with_format(&tmp, ImageFormat::Png) {
        let _ = std::fs::remove_file(&tmp);
        return Err(QrError::RenderFailure(e.to_string()));
    }
    std::fs::rename(&tmp, &target).map_err(io_err)?;

    tracing::debug!("QR de {} gravado em {}", code, target.display());
    Ok(target)
}
