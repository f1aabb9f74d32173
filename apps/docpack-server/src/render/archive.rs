//! Batch rendering into a ZIP archive
//!
//! Templates are processed in catalog order. A template that fails for any
//! reason is replaced by a `.ERROR.txt` entry describing the failure; the
//! rest of the batch is unaffected.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::convert::DocumentConverter;
use super::docx::{TemplateContext, TemplateEngine};
use super::naming::{entry_path, error_file_name, output_file_name, record_folder};
use super::RenderError;
use crate::catalog::{OutputFormat, TemplateDescriptor};
use crate::record::Record;

/// One file written into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub template_id: String,
    pub path: String,
    /// `false` for `.ERROR.txt` stubs
    pub ok: bool,
}

#[derive(Debug, Clone)]
pub struct Archive {
    pub bytes: Vec<u8>,
    pub entries: Vec<ArchiveEntry>,
}

impl Archive {
    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| !e.ok).count()
    }
}

/// Render every template against `record` and pack the results
pub fn build_archive(
    engine: &TemplateEngine,
    converter: &dyn DocumentConverter,
    templates: &[&TemplateDescriptor],
    record: &Record,
) -> Result<Archive, RenderError> {
    let folder = record_folder(record);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut used = HashSet::new();
    let mut entries = Vec::with_capacity(templates.len());

    for template in templates {
        let (path, content, ok) = match render_one(engine, converter, template, record, &folder) {
            Ok((path, content)) => (path, content, true),
            Err(e) => {
                tracing::warn!(
                    template = %template.id,
                    path = %template.path,
                    error = %e,
                    "Template failed, writing error stub"
                );
                let path = format!("{}/{}", folder, error_file_name(&template.out));
                let message = format!("Error ({}): {}: {}", template.path, e.kind(), e);
                (path, message.into_bytes(), false)
            }
        };

        let path = unique_path(&mut used, path);
        writer.start_file(path.clone(), options)?;
        writer.write_all(&content)?;

        tracing::info!(template = %template.id, entry = %path, ok, "Archive entry written");
        entries.push(ArchiveEntry {
            template_id: template.id.clone(),
            path,
            ok,
        });
    }

    let bytes = writer.finish()?.into_inner();
    Ok(Archive { bytes, entries })
}

fn render_one(
    engine: &TemplateEngine,
    converter: &dyn DocumentConverter,
    template: &TemplateDescriptor,
    record: &Record,
    folder: &str,
) -> Result<(String, Vec<u8>), RenderError> {
    let source = std::fs::read(&template.source).map_err(|source| RenderError::TemplateRead {
        path: template.source.clone(),
        source,
    })?;

    let context: TemplateContext = template
        .fields
        .iter()
        .map(|(placeholder, column)| (placeholder.clone(), record.value(column).trim().to_string()))
        .collect();

    let docx = engine.render_docx(&source, &context)?;
    let name = output_file_name(&template.out, record, template.output);
    let path = entry_path(folder, template.dir.as_deref(), &name, record);

    let content = match template.output {
        OutputFormat::Pdf => converter.docx_to_pdf(&docx)?,
        OutputFormat::Docx => docx,
    };
    Ok((path, content))
}

/// `path`, or `stem_N.ext` with the smallest N >= 2 not yet used
fn unique_path(used: &mut HashSet<String>, path: String) -> String {
    if used.insert(path.clone()) {
        return path;
    }

    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let (stem, ext) = match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => path.split_at(file_start + dot),
        _ => (path.as_str(), ""),
    };

    let mut n = 2;
    loop {
        let candidate = format!("{}_{}{}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
