//! DOCX template rendering
//!
//! A DOCX file is a zip package; the visible text lives in a handful of
//! WordprocessingML parts. Those parts are normalized (see `xml_patch`),
//! rendered as templates and written back; every other entry is copied
//! through untouched.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use minijinja::{AutoEscape, Environment};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::filters;
use super::xml_patch::prepare_template_xml;
use super::RenderError;

/// Values available to a template: placeholder -> text
pub type TemplateContext = BTreeMap<String, String>;

/// Template engine shared by all requests
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Substituted values end up inside XML text nodes
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_keep_trailing_newline(true);
        filters::register(&mut env);
        Self { env }
    }

    /// Render one WordprocessingML part
    pub fn render_xml(&self, xml: &str, context: &TemplateContext) -> Result<String, RenderError> {
        let prepared = prepare_template_xml(xml);
        Ok(self.env.render_str(&prepared, context)?)
    }

    /// Render a whole DOCX package and return the new package bytes
    pub fn render_docx(&self, template: &[u8], context: &TemplateContext) -> Result<Vec<u8>, RenderError> {
        let mut archive = ZipArchive::new(Cursor::new(template))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let name = entry.name().to_string();

            if is_template_part(&name) {
                let mut xml = String::new();
                entry.read_to_string(&mut xml)?;
                let rendered = self.render_xml(&xml, context)?;
                writer.start_file(name, options)?;
                writer.write_all(rendered.as_bytes())?;
            } else {
                writer.raw_copy_file(entry)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// Parts that may contain template tags: body, headers, footers, notes
fn is_template_part(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    let Some(stem) = file.strip_suffix(".xml") else {
        return false;
    };
    if stem.contains('/') {
        return false;
    }
    matches!(stem, "document" | "footnotes" | "endnotes")
        || stem.starts_with("header")
        || stem.starts_with("footer")
}
