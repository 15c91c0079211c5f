use thiserror::Error;

/// Errores que pueden burbujear desde los handlers hasta el dispatcher.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("error de base de datos: {0}")]
    Database(#[from] sqlx::Error),

    #[error("error de la API de Telegram: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("error del procesador de pagos: {0}")]
    Payments(#[from] reqwest::Error),

    #[error("respuesta inesperada del procesador de pagos: {message}")]
    PaymentsProtocol { message: String },

    #[error("configuración inválida: {message}")]
    Config { message: String },

    #[error("{message}")]
    Validation { message: String },
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        AppError::Config { message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation { message: message.into() }
    }

    pub fn payments_protocol(message: impl Into<String>) -> Self {
        AppError::PaymentsProtocol { message: message.into() }
    }
}
