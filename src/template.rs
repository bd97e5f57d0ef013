//! Named mail templates and the store they are loaded from.
//!
//! A template is a directory namespace holding an optional `header.json`
//! document plus `body.tmpl` and/or `body.html` sources. At least one
//! body must exist or loading fails.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{MailerError, Result};
use crate::headers::{HeaderMap, HeaderValue};
use crate::mailer::Mailer;
use crate::message::AttachFile;

/// Header document file name within a template namespace.
pub const HEADER_FILE: &str = "header.json";
/// Plain-text body template file name.
pub const TEXT_BODY_FILE: &str = "body.tmpl";
/// HTML body template file name.
pub const HTML_BODY_FILE: &str = "body.html";

/// Source of template files, addressed by template name and file name.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Looks up a raw document; `None` when the file does not exist.
    async fn search(&self, name: &str, file: &str) -> Result<Option<Vec<u8>>>;

    /// Reads a template source; `None` when the file does not exist.
    async fn read(&self, name: &str, file: &str) -> Result<Option<String>>;
}

/// Filesystem-backed template store using the `<root>/<name>/<file>`
/// directory convention.
#[derive(Debug, Clone)]
pub struct DirTemplateStore {
    root: PathBuf,
}

impl DirTemplateStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path(&self, name: &str, file: &str) -> PathBuf {
        self.root.join(name).join(file)
    }
}

#[async_trait]
impl TemplateStore for DirTemplateStore {
    async fn search(&self, name: &str, file: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(name, file)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, name: &str, file: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(name, file)).await {
            Ok(source) => Ok(Some(source)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// A loaded mail template: layered headers plus body template sources
/// and an optional attachment.
#[derive(Debug, Clone, Default)]
pub struct MailTemplate {
    headers: HeaderMap,
    pub text: Option<String>,
    pub html: Option<String>,
    pub file: Option<AttachFile>,
}

impl MailTemplate {
    /// Builds a template directly from body sources, without a store.
    pub fn new(text: Option<String>, html: Option<String>) -> Self {
        Self {
            text,
            html,
            ..Self::default()
        }
    }

    /// Loads a named template from the store.
    ///
    /// A missing `header.json` is fine; a malformed one is a header
    /// parse error. Both bodies missing is [`MailerError::TemplateNotFound`].
    pub async fn load(store: &dyn TemplateStore, name: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(data) = store.search(name, HEADER_FILE).await? {
            let document: serde_json::Map<String, Value> = serde_json::from_slice(&data)?;
            headers = HeaderMap::from_json(&document);
        }

        let text = store.read(name, TEXT_BODY_FILE).await?;
        let html = store.read(name, HTML_BODY_FILE).await?;
        if text.is_none() && html.is_none() {
            return Err(MailerError::TemplateNotFound(name.to_string()));
        }

        tracing::debug!(
            template = name,
            text = text.is_some(),
            html = html.is_some(),
            "loaded template"
        );
        Ok(Self {
            headers,
            text,
            html,
            file: None,
        })
    }

    /// Layers an additional header onto the template, following the
    /// header map's merge contract.
    pub fn set_header(&mut self, key: &str, value: impl Into<HeaderValue>) -> &mut Self {
        self.headers.set(key, value);
        self
    }

    /// Attaches a file to every message sent from this template.
    pub fn attach(&mut self, file: AttachFile) -> &mut Self {
        self.file = Some(file);
        self
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Resolves headers and bodies against `variables` and dispatches
    /// through the mailer. Equivalent to [`Mailer::send_template`].
    pub async fn send(
        &self,
        mailer: &Mailer,
        variables: Option<&Value>,
        to: &[crate::headers::Address],
    ) -> Result<()> {
        mailer.send_template(self, variables, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Address;
    use std::fs;

    fn write_template(root: &Path, name: &str, files: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (file, content) in files {
            fs::write(dir.join(file), content).unwrap();
        }
    }

    #[tokio::test]
    async fn loads_template_with_headers_and_bodies() {
        let tmp = tempfile::tempdir().unwrap();
        write_template(
            tmp.path(),
            "welcome",
            &[
                (
                    HEADER_FILE,
                    r#"{"Subject":"Hi {{ name }}","From":[{"Address":"noreply@example.com"}]}"#,
                ),
                (TEXT_BODY_FILE, "Hello {{ name }}"),
                (HTML_BODY_FILE, "<p>Hello {{ name }}</p>"),
            ],
        );

        let store = DirTemplateStore::new(tmp.path());
        let template = MailTemplate::load(&store, "welcome").await.unwrap();

        assert_eq!(template.headers().first("Subject"), Some("Hi {{ name }}"));
        assert_eq!(template.text.as_deref(), Some("Hello {{ name }}"));
        assert_eq!(template.html.as_deref(), Some("<p>Hello {{ name }}</p>"));
    }

    #[tokio::test]
    async fn missing_header_document_is_fine() {
        let tmp = tempfile::tempdir().unwrap();
        write_template(tmp.path(), "plain", &[(TEXT_BODY_FILE, "body")]);

        let store = DirTemplateStore::new(tmp.path());
        let template = MailTemplate::load(&store, "plain").await.unwrap();
        assert!(template.headers().is_empty());
        assert!(template.html.is_none());
    }

    #[tokio::test]
    async fn missing_bodies_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        write_template(tmp.path(), "empty", &[(HEADER_FILE, "{}")]);

        let store = DirTemplateStore::new(tmp.path());
        let result = MailTemplate::load(&store, "empty").await;
        assert!(matches!(result, Err(MailerError::TemplateNotFound(name)) if name == "empty"));
    }

    #[tokio::test]
    async fn malformed_header_document_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_template(
            tmp.path(),
            "broken",
            &[(HEADER_FILE, "not json"), (TEXT_BODY_FILE, "body")],
        );

        let store = DirTemplateStore::new(tmp.path());
        let result = MailTemplate::load(&store, "broken").await;
        assert!(matches!(result, Err(MailerError::HeaderParse(_))));
    }

    #[test]
    fn set_header_chains() {
        let mut template = MailTemplate::new(Some("body".to_string()), None);
        template
            .set_header("To", Address::new("a@example.com"))
            .set_header("To", Address::new("b@example.com"))
            .set_header("X-Campaign", "launch");

        match template.headers().get("To") {
            Some(HeaderValue::AddressList(addresses)) => assert_eq!(addresses.len(), 2),
            other => panic!("unexpected value: {other:?}"),
        }
        assert_eq!(template.headers().first("X-Campaign"), Some("launch"));
    }
}
