use async_trait::async_trait;
use lettre::Transport as LettreTransport;
use lettre::address::Envelope;
use lettre::transport::sendmail::SendmailTransport as LettreTransportImpl;

use crate::error::{MailerError, Result};
use crate::transports::Transport;

#[derive(Debug, Clone)]
pub struct SendmailTransport {
    transport: LettreTransportImpl,
}

impl SendmailTransport {
    pub fn new() -> Self {
        Self {
            transport: LettreTransportImpl::new(),
        }
    }

    pub fn with_command<S: Into<String>>(command: S) -> Self {
        Self {
            transport: LettreTransportImpl::new_with_command(command.into()),
        }
    }
}

impl Default for SendmailTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SendmailTransport {
    async fn deliver(&self, envelope: &Envelope, message: &[u8]) -> Result<()> {
        // lettre's sendmail transport is sync, so run it off the runtime.
        let recipients = envelope.to().len();
        let transport = self.transport.clone();
        let envelope = envelope.clone();
        let message = message.to_vec();
        tokio::task::spawn_blocking(move || transport.send_raw(&envelope, &message))
            .await
            .map_err(|e| MailerError::Delivery(format!("sendmail task failed: {e}")))??;

        tracing::info!(recipients, "message handed to sendmail");
        Ok(())
    }
}
