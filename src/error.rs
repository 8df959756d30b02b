use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Processing error: {0}")]
    ProcessingError(String),

    #[error("Document error: {0}")]
    DocumentError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`SignError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl SignError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a validation error (caller-correctable input).
    validation => ValidationError,
    /// Create an image processing error.
    processing => ProcessingError,
    /// Create a document error.
    document => DocumentError,
    /// Create a configuration error.
    config => ConfigError,
    /// Create an internal error.
    internal => InternalError,
}

impl SignError {
    /// バッチ全体を中断すべきエラーかどうか。
    ///
    /// Validation / Processing は個々の配置のスキップで済むが、
    /// ドキュメント・IO・内部エラーはバッチを失敗させる。
    pub fn is_batch_fatal(&self) -> bool {
        !matches!(self, Self::ValidationError(_) | Self::ProcessingError(_))
    }
}

impl From<lopdf::Error> for SignError {
    fn from(e: lopdf::Error) -> Self {
        Self::DocumentError(e.to_string())
    }
}

impl From<image::ImageError> for SignError {
    fn from(e: image::ImageError) -> Self {
        Self::ProcessingError(e.to_string())
    }
}

impl From<serde_json::Error> for SignError {
    fn from(e: serde_json::Error) -> Self {
        Self::ValidationError(e.to_string())
    }
}

impl From<serde_yml::Error> for SignError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<tempfile::PersistError> for SignError {
    fn from(e: tempfile::PersistError) -> Self {
        Self::IoError(e.error)
    }
}

pub type Result<T> = std::result::Result<T, SignError>;
