use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailerError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("header parse error: {0}")]
    HeaderParse(#[from] serde_json::Error),

    #[error("template render error: {0}")]
    Render(#[from] tera::Error),

    #[error("transcode error: unmappable character for charset {charset}")]
    Transcode { charset: String },

    #[error("address error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("envelope error: {0}")]
    Envelope(#[from] lettre::error::Error),

    #[error("smtp transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("file transport error: {0}")]
    File(#[from] lettre::transport::file::Error),

    #[error("sendmail transport error: {0}")]
    Sendmail(#[from] lettre::transport::sendmail::Error),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MailerError>;
