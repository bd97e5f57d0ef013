mod file;
mod sendmail;
mod smtp;

pub use file::FileTransport;
pub use sendmail::SendmailTransport;
pub use smtp::{SmtpTransport, SmtpTransportBuilder, TlsConfig};

use async_trait::async_trait;
use lettre::address::Envelope;

use crate::error::Result;

/// Delivery seam: accepts a fully assembled message and either delivers
/// it or fails. The file transport is the dry-run variant of this
/// capability; it satisfies the same contract without touching the
/// network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, envelope: &Envelope, message: &[u8]) -> Result<()>;
}
