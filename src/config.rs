// src/config.rs
use crate::error::{AppError, AppResult};
use chrono::NaiveDate;
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

/// Pasta obrigatória de exportação (QR e relatórios), dentro da raiz de exportação.
pub const EXPORT_FOLDER_NAME: &str = "datos QR";
const QR_FOLDER_NAME: &str = "QR";

const DEFAULT_DATABASE_URL: &str = "sqlite://base_datos/presenca.db";
const DEFAULT_REPLAY_DIR: &str = "camaras";
const DEFAULT_RESUME_DELAY_MS: u64 = 3000;
const DEFAULT_CAMERA_PROBE: u32 = 5;
const DEFAULT_EVENT_BUFFER: usize = 32;

/// Configuração lida uma vez no arranque.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub export_root: PathBuf,
    /// Raiz das "câmaras" de reprodução (uma subpasta `cam<N>` por dispositivo).
    pub replay_dir: PathBuf,
    /// Tempo de pausa da câmara depois de cada leitura.
    pub resume_delay: Duration,
    /// Quantos índices de câmara testar em `cameras` (0..N-1).
    pub camera_probe: u32,
    pub event_buffer: usize,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok(); // Carrega .env se existir

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());
        let export_root = env::var("PRESENCA_EXPORT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_export_root());
        let replay_dir = env::var("PRESENCA_REPLAY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPLAY_DIR));
        let resume_delay_ms = parse_var("PRESENCA_RESUME_DELAY_MS", DEFAULT_RESUME_DELAY_MS)?;
        let camera_probe = parse_var("PRESENCA_CAMERA_PROBE", DEFAULT_CAMERA_PROBE)?;

        Ok(Self {
            database_url,
            export_root,
            replay_dir,
            resume_delay: Duration::from_millis(resume_delay_ms),
            camera_probe,
            event_buffer: DEFAULT_EVENT_BUFFER,
        })
    }

    pub fn export_paths(&self) -> ExportPaths {
        ExportPaths::new(&self.export_root)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} inválido: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

/// Escritório do utilizador se existir, senão a pasta pessoal.
pub fn default_export_root() -> PathBuf {
    dirs::desktop_dir()
        .filter(|desktop| desktop.is_dir())
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Caminhos derivados da raiz de exportação.
#[derive(Debug, Clone)]
pub struct ExportPaths {
    base: PathBuf,
}

impl ExportPaths {
    pub fn new(export_root: &Path) -> Self {
        Self {
            base: export_root.join(EXPORT_FOLDER_NAME),
        }
    }

    /// `<raiz>/datos QR`
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// `<raiz>/datos QR/QR`
    pub fn qr_dir(&self) -> PathBuf {
        self.base.join(QR_FOLDER_NAME)
    }

    pub fn qr_file(&self, code: &str) -> PathBuf {
        self.qr_dir().join(format!("student_{code}.png"))
    }

    /// `<raiz>/datos QR/<AAAA-MM-DD>`
    pub fn report_dir(&self, day: NaiveDate) -> PathBuf {
        self.base.join(day.format("%Y-%m-%d").to_string())
    }

    /// Cria `datos QR` e `datos QR/QR` (idempotente).
    pub fn ensure(&self) -> AppResult<()> {
        std::fs::create_dir_all(self.qr_dir())?;
        Ok(())
    }
}

/// Um nome que entra num caminho (matrícula, sufixo de relatório) não pode
/// subir nem descer de pasta.
pub fn is_safe_file_component(name: &str) -> bool {
    !name.contains(['/', '\\']) && !name.contains("..")
}
