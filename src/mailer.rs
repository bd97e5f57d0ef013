//! The mailer facade: public send operations.

use serde_json::Value;

use crate::charset::Charset;
use crate::config::MailerConfig;
use crate::error::{MailerError, Result};
use crate::headers::{Address, HeaderMap};
use crate::message::{AssembledMessage, AttachFile, BodyContent, assemble};
use crate::render::{FunctionProvider, TemplateEngine};
use crate::template::{DirTemplateStore, HTML_BODY_FILE, MailTemplate, TEXT_BODY_FILE, TemplateStore};
use crate::transports::Transport;

/// Composes and dispatches messages through a configured transport.
///
/// Built once at process initialization; the transport, template store,
/// and function registry are read-only afterward, so concurrent sends
/// through a shared mailer are safe.
pub struct Mailer {
    transport: Box<dyn Transport>,
    engine: TemplateEngine,
    store: Option<Box<dyn TemplateStore>>,
}

impl Mailer {
    /// Builds a mailer from configuration, constructing the configured
    /// transport and, when a template directory is set, a filesystem
    /// template store.
    pub fn new(config: &MailerConfig) -> Result<Self> {
        let mut mailer = Self::with_transport(config.build_transport()?);
        if let Some(dir) = &config.template_dir {
            mailer.store = Some(Box::new(DirTemplateStore::new(dir)));
        }
        Ok(mailer)
    }

    /// Builds a mailer around an explicit transport. Useful for tests
    /// and for transports not expressible in configuration.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            engine: TemplateEngine::new(),
            store: None,
        }
    }

    /// Registers the custom template function provider.
    #[must_use]
    pub fn functions(mut self, provider: FunctionProvider) -> Self {
        self.engine = TemplateEngine::with_functions(provider);
        self
    }

    /// Replaces the template store.
    #[must_use]
    pub fn template_store(mut self, store: Box<dyn TemplateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Loads a named template from the configured store.
    pub async fn template(&self, name: &str) -> Result<MailTemplate> {
        let store = self
            .store
            .as_deref()
            .ok_or_else(|| MailerError::Config("no template store configured".to_string()))?;
        MailTemplate::load(store, name).await
    }

    /// Sends a plain-text message.
    ///
    /// `body` bytes are taken as already rendered and transcoded; headers,
    /// subject, and addresses are resolved here against `variables`.
    /// Call-time recipients are added on top of any `To` header entries.
    pub async fn send(
        &self,
        charset: Option<&str>,
        headers: &HeaderMap,
        body: &[u8],
        variables: Option<&Value>,
        file: Option<&AttachFile>,
        to: &[Address],
    ) -> Result<()> {
        let message = assemble(
            &self.engine,
            charset,
            headers,
            BodyContent::Text(body),
            variables,
            file,
            to,
        )?;
        self.deliver(message).await
    }

    /// Sends an HTML-only message.
    pub async fn send_html(
        &self,
        charset: Option<&str>,
        headers: &HeaderMap,
        body: &[u8],
        variables: Option<&Value>,
        file: Option<&AttachFile>,
        to: &[Address],
    ) -> Result<()> {
        let message = assemble(
            &self.engine,
            charset,
            headers,
            BodyContent::Html(body),
            variables,
            file,
            to,
        )?;
        self.deliver(message).await
    }

    /// Sends a multipart/alternative message carrying both renderings.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_multipart(
        &self,
        charset: Option<&str>,
        headers: &HeaderMap,
        text_body: &[u8],
        html_body: &[u8],
        variables: Option<&Value>,
        file: Option<&AttachFile>,
        to: &[Address],
    ) -> Result<()> {
        let message = assemble(
            &self.engine,
            charset,
            headers,
            BodyContent::Alternative {
                text: text_body,
                html: html_body,
            },
            variables,
            file,
            to,
        )?;
        self.deliver(message).await
    }

    /// Renders a template's bodies and dispatches to the send operation
    /// matching which bodies are present. A template with neither body
    /// sends nothing and succeeds; loading already rejects that case.
    pub async fn send_template(
        &self,
        template: &MailTemplate,
        variables: Option<&Value>,
        to: &[Address],
    ) -> Result<()> {
        let headers = template.headers();
        let charset = headers.charset().map(Charset::parse).unwrap_or_default();

        let text = match &template.text {
            Some(source) => {
                let rendered = self.engine.render(TEXT_BODY_FILE, source, variables)?;
                Some(charset.encode(&rendered)?)
            }
            None => None,
        };
        let html = match &template.html {
            Some(source) => {
                let rendered = self.engine.render(HTML_BODY_FILE, source, variables)?;
                Some(charset.encode(&rendered)?)
            }
            None => None,
        };

        let charset = Some(charset.name());
        let file = template.file.as_ref();
        match (&text, &html) {
            (Some(text), Some(html)) => {
                self.send_multipart(charset, headers, text, html, variables, file, to)
                    .await
            }
            (Some(text), None) => self.send(charset, headers, text, variables, file, to).await,
            (None, Some(html)) => {
                self.send_html(charset, headers, html, variables, file, to)
                    .await
            }
            (None, None) => {
                tracing::debug!("template has no body, nothing to send");
                Ok(())
            }
        }
    }

    async fn deliver(&self, message: AssembledMessage) -> Result<()> {
        tracing::debug!(
            recipients = message.envelope.to().len(),
            size = message.bytes.len(),
            "delivering message"
        );
        self.transport.deliver(&message.envelope, &message.bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{HEADER_FILE, TEXT_BODY_FILE};
    use lettre::address::Envelope;
    use serde_json::json;
    use std::sync::Mutex;

    /// Test double recording every delivery.
    #[derive(Default)]
    struct RecordingTransport {
        deliveries: Mutex<Vec<(Envelope, Vec<u8>)>>,
    }

    #[async_trait::async_trait]
    impl Transport for RecordingTransport {
        async fn deliver(&self, envelope: &Envelope, message: &[u8]) -> Result<()> {
            self.deliveries
                .lock()
                .unwrap()
                .push((envelope.clone(), message.to_vec()));
            Ok(())
        }
    }

    fn recording_mailer() -> (Mailer, std::sync::Arc<RecordingTransport>) {
        // Share the double so assertions can see through the Box.
        let transport = std::sync::Arc::new(RecordingTransport::default());

        struct Shared(std::sync::Arc<RecordingTransport>);
        #[async_trait::async_trait]
        impl Transport for Shared {
            async fn deliver(&self, envelope: &Envelope, message: &[u8]) -> Result<()> {
                self.0.deliver(envelope, message).await
            }
        }

        let mailer = Mailer::with_transport(Box::new(Shared(transport.clone())));
        (mailer, transport)
    }

    fn headers_with_recipient() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.set("From", Address::new("sender@example.com"));
        headers.set("To", Address::new("to@example.com"));
        headers
    }

    #[tokio::test]
    async fn send_delivers_once() {
        let (mailer, transport) = recording_mailer();
        mailer
            .send(None, &headers_with_recipient(), b"hello", None, None, &[])
            .await
            .unwrap();

        let deliveries = transport.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        let text = String::from_utf8_lossy(&deliveries[0].1);
        assert!(text.contains("Content-Type: text/plain"));
    }

    #[tokio::test]
    async fn render_failure_delivers_nothing() {
        let (mailer, transport) = recording_mailer();
        let mut headers = headers_with_recipient();
        headers.set("Subject", "{{ broken");

        let result = mailer
            .send(
                None,
                &headers,
                b"hello",
                Some(&json!({})),
                None,
                &[],
            )
            .await;

        assert!(result.is_err());
        assert_eq!(transport.deliveries.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn template_with_both_bodies_sends_multipart() {
        let (mailer, transport) = recording_mailer();
        let mut template = MailTemplate::new(
            Some("Hello {{ name }}".to_string()),
            Some("<p>Hello {{ name }}</p>".to_string()),
        );
        template
            .set_header("From", Address::new("sender@example.com"))
            .set_header("Subject", "Greetings");

        mailer
            .send_template(
                &template,
                Some(&json!({"name": "World"})),
                &[Address::new("to@example.com")],
            )
            .await
            .unwrap();

        let deliveries = transport.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        let text = String::from_utf8_lossy(&deliveries[0].1);
        assert!(text.contains("multipart/alternative"));
        assert!(text.contains("Subject: Greetings"));
        // Default base64 on the text part, forced quoted-printable on HTML.
        assert!(text.contains("Content-Transfer-Encoding: base64"));
        assert!(text.contains("Content-Transfer-Encoding: quoted-printable"));
    }

    #[tokio::test]
    async fn template_with_text_only_sends_single_part() {
        let (mailer, transport) = recording_mailer();
        let mut template = MailTemplate::new(Some("plain {{ name }}".to_string()), None);
        template.set_header("From", Address::new("sender@example.com"));

        mailer
            .send_template(
                &template,
                Some(&json!({"name": "text"})),
                &[Address::new("to@example.com")],
            )
            .await
            .unwrap();

        let deliveries = transport.deliveries.lock().unwrap();
        let text = String::from_utf8_lossy(&deliveries[0].1);
        assert!(text.contains("Content-Type: text/plain"));
        assert!(!text.contains("multipart"));
    }

    #[tokio::test]
    async fn template_without_bodies_sends_nothing() {
        let (mailer, transport) = recording_mailer();
        let template = MailTemplate::new(None, None);

        let result = mailer
            .send_template(&template, None, &[Address::new("to@example.com")])
            .await;

        assert!(result.is_ok());
        assert_eq!(transport.deliveries.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn file_transport_substitutes_for_delivery() {
        // Dry-run path: a mailer configured with the file transport makes
        // zero network deliveries and materializes the message on disk.
        let tmp = tempfile::tempdir().unwrap();
        let config = MailerConfig {
            transport: crate::config::TransportConfig::File {
                output_dir: tmp.path().to_path_buf(),
            },
            template_dir: None,
        };
        let mailer = Mailer::new(&config).unwrap();

        mailer
            .send(None, &headers_with_recipient(), b"dry run", None, None, &[])
            .await
            .unwrap();

        assert!(std::fs::read_dir(tmp.path()).unwrap().count() > 0);
    }

    #[tokio::test]
    async fn loads_and_sends_named_template() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("welcome");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(HEADER_FILE),
            r#"{"From":[{"Address":"noreply@example.com"}],"Subject":"Hi {{ name }}"}"#,
        )
        .unwrap();
        std::fs::write(dir.join(TEXT_BODY_FILE), "Welcome, {{ name }}!").unwrap();

        let (mailer, transport) = recording_mailer();
        let mailer = mailer.template_store(Box::new(DirTemplateStore::new(tmp.path())));

        let template = mailer.template("welcome").await.unwrap();
        mailer
            .send_template(
                &template,
                Some(&json!({"name": "World"})),
                &[Address::new("to@example.com")],
            )
            .await
            .unwrap();

        let deliveries = transport.deliveries.lock().unwrap();
        let text = String::from_utf8_lossy(&deliveries[0].1);
        assert!(text.contains("Subject: Hi World"));
        assert!(text.contains("From: noreply@example.com"));
    }

    #[tokio::test]
    async fn template_lookup_without_store_is_config_error() {
        let (mailer, _) = recording_mailer();
        let result = mailer.template("anything").await;
        assert!(matches!(result, Err(MailerError::Config(_))));
    }
}
