use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lettre::Transport as LettreTransport;
use lettre::address::Envelope;
use lettre::transport::file::FileTransport as LettreFileTransport;

use crate::error::{MailerError, Result};
use crate::transports::Transport;

/// Dry-run transport: writes every assembled message to a directory as
/// an `.eml` file instead of delivering it. Substitutes for the SMTP
/// transport in testing and staging configurations.
#[derive(Debug, Clone)]
pub struct FileTransport {
    transport: LettreFileTransport,
    output_dir: PathBuf,
}

impl FileTransport {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();

        if !output_dir.exists() {
            std::fs::create_dir_all(&output_dir)?;
        }

        let transport = LettreFileTransport::new(&output_dir);

        Ok(Self {
            transport,
            output_dir,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn deliver(&self, envelope: &Envelope, message: &[u8]) -> Result<()> {
        // lettre's file transport is sync, so run it off the runtime.
        let transport = self.transport.clone();
        let envelope = envelope.clone();
        let message = message.to_vec();
        tokio::task::spawn_blocking(move || transport.send_raw(&envelope, &message))
            .await
            .map_err(|e| MailerError::Delivery(format!("file delivery task failed: {e}")))??;

        tracing::info!(dir = %self.output_dir.display(), "message written to file (dry run)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_message_to_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let transport = FileTransport::new(temp_dir.path()).unwrap();

        let envelope = Envelope::new(
            Some("sender@example.com".parse().unwrap()),
            vec!["recipient@example.com".parse().unwrap()],
        )
        .unwrap();

        let result = transport
            .deliver(&envelope, b"Subject: Test\r\n\r\nHello")
            .await;
        assert!(result.is_ok());

        let entries = std::fs::read_dir(temp_dir.path()).unwrap();
        assert!(entries.count() > 0);
    }
}
