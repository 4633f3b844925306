//! HTML pages from the embedded tera templates

use rust_embed::Embed;
use serde::Serialize;
use tera::Tera;

use super::RenderError;

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

/// Tera instance holding every embedded page template
pub struct HtmlRenderer {
    tera: Tera,
}

impl HtmlRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut templates = Vec::new();
        for file in EmbeddedTemplates::iter() {
            let name = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(name) {
                let source = std::str::from_utf8(&content.data).map_err(|_| RenderError::Utf8)?;
                templates.push((name.to_string(), source.to_string()));
            }
        }

        let mut tera = Tera::default();
        // Added in one batch so `extends` can resolve regardless of order
        tera.add_raw_templates(templates)
            .map_err(|e| RenderError::Template(e.to_string()))?;
        Ok(Self { tera })
    }

    /// Render `<page>.html.tera` with the payload as context
    pub fn render<T: Serialize>(&self, page: &str, payload: &T) -> Result<String, RenderError> {
        let name = format!("{}.html.tera", page);
        if !self.tera.get_template_names().any(|n| n == name) {
            return Err(RenderError::TemplateNotFound(name));
        }
        let context = tera::Context::from_serialize(payload)
            .map_err(|e| RenderError::Template(e.to_string()))?;
        self.tera
            .render(&name, &context)
            .map_err(|e| RenderError::Template(format!("{:?}", e)))
    }
}
