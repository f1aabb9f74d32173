//! Document rendering
//!
//! DOCX templates are filled from a [`Record`](crate::record::Record),
//! optionally converted to PDF and packed into a single ZIP archive.

mod archive;
mod convert;
mod docx;
mod filters;
mod naming;
mod xml_patch;

use std::path::PathBuf;

use thiserror::Error;

pub use archive::{build_archive, Archive, ArchiveEntry};
pub use convert::{ConvertError, DocumentConverter, SofficeConverter};
pub use docx::{TemplateContext, TemplateEngine};
pub use filters::letter;
pub use naming::{fill_pattern, output_file_name, record_folder, slugify, slugify_path};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to read template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Template(#[from] minijinja::Error),

    #[error("{0}")]
    Package(#[from] zip::result::ZipError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Convert(#[from] ConvertError),
}

impl RenderError {
    /// Short error class name written into `.ERROR.txt` stubs
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::TemplateRead { .. } => "TemplateNotFound",
            RenderError::Template(_) => "TemplateError",
            RenderError::Package(_) => "PackageError",
            RenderError::Io(_) => "IoError",
            RenderError::Convert(_) => "ConversionError",
        }
    }
}

#[cfg(test)]
pub(crate) use docx::tests::build_docx;
