//! Templated email composition and dispatch.
//!
//! Loads header/body templates, renders them with caller-supplied
//! variables, transcodes text for regional charsets, and hands the
//! assembled message to an SMTP, sendmail, or file (dry-run) transport.
//!
//! ```ignore
//! use mailplate::prelude::*;
//!
//! let config = MailerConfig::from_env()?;
//! let mailer = Mailer::new(&config)?;
//!
//! let template = mailer.template("welcome").await?;
//! mailer
//!     .send_template(
//!         &template,
//!         Some(&serde_json::json!({"name": "World"})),
//!         &[Address::new("user@example.com")],
//!     )
//!     .await?;
//! ```

pub mod charset;
pub mod config;
pub mod error;
pub mod headers;
pub mod mailer;
pub mod message;
pub mod render;
pub mod template;
pub mod transports;

pub use charset::{Charset, TransferEncoding};
pub use config::{MailerConfig, TlsType, TransportConfig};
pub use error::{MailerError, Result};
pub use headers::{Address, HeaderMap, HeaderValue};
pub use mailer::Mailer;
pub use message::AttachFile;
pub use render::{FunctionProvider, TemplateEngine};
pub use template::{DirTemplateStore, MailTemplate, TemplateStore};
pub use transports::{FileTransport, SendmailTransport, SmtpTransport, Transport};

pub mod prelude {
    pub use crate::{
        Address, AttachFile, Charset, DirTemplateStore, FileTransport, HeaderMap, HeaderValue,
        MailTemplate, Mailer, MailerConfig, MailerError, SendmailTransport, SmtpTransport,
        TemplateEngine, TemplateStore, TransferEncoding, Transport, TransportConfig,
    };
}
