//! Template rendering for bodies and inline header fields.

use std::sync::Arc;

use serde_json::Value;
use tera::{Context, Tera};

use crate::error::Result;

/// Hook that installs custom helper functions into a template engine
/// instance. Registered once at configuration time and applied to every
/// render after that.
pub type FunctionProvider = Arc<dyn Fn(&mut Tera) + Send + Sync>;

/// Tera-backed renderer.
///
/// Every render runs against a fresh engine seeded with the registered
/// functions, so template sources never accumulate across sends and a
/// shared engine needs no interior locking.
#[derive(Clone, Default)]
pub struct TemplateEngine {
    functions: Option<FunctionProvider>,
}

impl TemplateEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_functions(provider: FunctionProvider) -> Self {
        Self {
            functions: Some(provider),
        }
    }

    fn instance(&self) -> Tera {
        let mut tera = Tera::default();
        if let Some(install) = &self.functions {
            install(&mut tera);
        }
        tera
    }

    /// Renders a template source against the variables value.
    ///
    /// Variable autoescaping follows the template name, so HTML bodies
    /// registered under an `.html` name get their variables escaped while
    /// plain-text bodies do not.
    pub fn render(&self, name: &str, source: &str, variables: Option<&Value>) -> Result<String> {
        let mut tera = self.instance();
        tera.add_raw_template(name, source)?;
        let context = match variables {
            Some(value) => Context::from_value(value.clone())?,
            None => Context::new(),
        };
        Ok(tera.render(name, &context)?)
    }

    /// Renders an inline header field (subject, address name, address
    /// value). When no variables are supplied the field is used verbatim,
    /// without a template pass.
    pub fn render_field(&self, source: &str, variables: Option<&Value>) -> Result<String> {
        match variables {
            None => Ok(source.to_string()),
            Some(_) => self.render("field", source, variables),
        }
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("functions", &self.functions.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_variables() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("field", "Hello {{ name }}", Some(&json!({"name": "World"})))
            .unwrap();
        assert_eq!(out, "Hello World");
    }

    #[test]
    fn variable_free_template_is_identity() {
        let engine = TemplateEngine::new();
        let source = "no expressions here";
        let out = engine
            .render("field", source, Some(&json!({"anything": 42})))
            .unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn field_without_variables_is_verbatim() {
        let engine = TemplateEngine::new();
        let out = engine.render_field("literal {{ not.rendered }}", None).unwrap();
        assert_eq!(out, "literal {{ not.rendered }}");
    }

    #[test]
    fn syntax_error_fails() {
        let engine = TemplateEngine::new();
        let result = engine.render("field", "{{ unclosed", Some(&json!({})));
        assert!(result.is_err());
    }

    #[test]
    fn html_template_escapes_variables() {
        let engine = TemplateEngine::new();
        let out = engine
            .render(
                "body.html",
                "<p>{{ name }}</p>",
                Some(&json!({"name": "<b>x</b>"})),
            )
            .unwrap();
        assert_eq!(out, "<p>&lt;b&gt;x&lt;&#x2F;b&gt;</p>");
    }

    #[test]
    fn custom_functions_are_available() {
        let provider: FunctionProvider = Arc::new(|tera: &mut Tera| {
            tera.register_function("greet", |_: &std::collections::HashMap<String, Value>| {
                Ok(Value::String("hi".to_string()))
            });
        });
        let engine = TemplateEngine::with_functions(provider);
        let out = engine
            .render("field", "{{ greet() }}", Some(&json!({})))
            .unwrap();
        assert_eq!(out, "hi");
    }
}
