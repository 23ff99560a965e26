//! Transient user-visible notifications ("toasts").
//!
//! User-facing copy is in the clinic locale (pt-BR); log output stays in English.

use tokio::sync::mpsc;
use tracing::{error, info};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A single transient notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: "Sucesso!".to_string(),
            description: description.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: "Erro".to_string(),
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

/// Sink for notifications, implemented by the UI shell.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications over an unbounded channel.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // Receiver gone means the view was torn down.
        let _ = self.tx.send(notification);
    }
}

/// Writes notifications to the log. For headless callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => info!(title = %notification.title, "{}", notification.description),
            NotificationLevel::Error => error!(title = %notification.title, "{}", notification.description),
        }
    }
}

/// Notification copy.
pub mod messages {
    pub const SEARCH_FAILED: &str = "Erro ao buscar pacientes. Tente novamente.";
    pub const TIMELINE_LOAD_FAILED: &str = "Erro ao carregar histórico médico. Tente novamente.";

    pub const PATIENT_CREATED: &str = "Paciente cadastrado com sucesso.";
    pub const PATIENT_UPDATED: &str = "Paciente atualizado com sucesso.";
    pub const PATIENT_CREATE_FAILED: &str = "Erro ao cadastrar paciente. Tente novamente.";
    pub const PATIENT_UPDATE_FAILED: &str = "Erro ao atualizar paciente. Tente novamente.";

    pub const OWNER_CREATED: &str = "Tutor cadastrado com sucesso.";
    pub const OWNER_UPDATED: &str = "Tutor atualizado com sucesso.";
    pub const OWNER_CREATE_FAILED: &str = "Erro ao cadastrar tutor. Tente novamente.";
    pub const OWNER_UPDATE_FAILED: &str = "Erro ao atualizar tutor. Tente novamente.";

    pub const RECORD_CREATED: &str = "Registro médico criado com sucesso.";
    pub const RECORD_UPDATED: &str = "Registro médico atualizado com sucesso.";
    pub const RECORD_CREATE_FAILED: &str = "Erro ao criar registro médico. Tente novamente.";
    pub const RECORD_UPDATE_FAILED: &str = "Erro ao atualizar registro médico. Tente novamente.";

    pub const PHOTO_UPLOADED: &str = "Foto enviada com sucesso.";
    pub const PHOTO_NOT_IMAGE: &str = "Selecione um arquivo de imagem.";
    pub const PHOTO_UPLOAD_FAILED: &str = "Erro ao enviar foto. Tente novamente.";

    const MEGABYTE: u64 = 1024 * 1024;

    /// Size-limit message for the configured photo limit.
    pub fn photo_too_large(limit_bytes: u64) -> String {
        let size = if limit_bytes % MEGABYTE == 0 {
            (limit_bytes / MEGABYTE).to_string()
        } else {
            format!("{:.1}", limit_bytes as f64 / MEGABYTE as f64).replace('.', ",")
        };
        format!("A foto deve ter no máximo {size} MB.")
    }
}
