//! DOCX -> PDF conversion through an office suite's headless CLI
//!
//! Every call gets its own temporary directory holding `input.docx` and an
//! `out/` directory the converter writes into. The directory is removed when
//! the call returns.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to prepare conversion workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("Failed to start converter {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("DOCX->PDF conversion failed ({status}):\n{output}")]
    Failed { status: String, output: String },
}

/// Anything that can turn a DOCX package into PDF bytes
pub trait DocumentConverter: Send + Sync {
    fn docx_to_pdf(&self, docx: &[u8]) -> Result<Vec<u8>, ConvertError>;
}

/// Converter backed by `soffice --headless --convert-to pdf`
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    bin: String,
}

impl SofficeConverter {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }
}

impl DocumentConverter for SofficeConverter {
    fn docx_to_pdf(&self, docx: &[u8]) -> Result<Vec<u8>, ConvertError> {
        let workspace = tempfile::tempdir()?;
        let input = workspace.path().join("input.docx");
        let out_dir = workspace.path().join("out");
        std::fs::create_dir_all(&out_dir)?;
        std::fs::write(&input, docx)?;

        let result = Command::new(&self.bin)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(&out_dir)
            .arg(&input)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ConvertError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;

        let mut output = String::from_utf8_lossy(&result.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&result.stderr));

        let produced = first_pdf(&out_dir)?;
        match produced {
            Some(pdf) if result.status.success() => {
                tracing::debug!(bin = %self.bin, pdf = %pdf.display(), "Converted DOCX to PDF");
                Ok(std::fs::read(pdf)?)
            }
            _ => Err(ConvertError::Failed {
                status: result.status.to_string(),
                output,
            }),
        }
    }
}

/// First `*.pdf` in `dir`, by file name
fn first_pdf(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                    .unwrap_or(false)
        })
        .collect();
    pdfs.sort();
    Ok(pdfs.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_a_spawn_error() {
        let converter = SofficeConverter::new("/nonexistent/docpack-soffice");
        let err = converter.docx_to_pdf(b"PK").unwrap_err();
        assert!(matches!(err, ConvertError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_success_without_output_is_a_failure() {
        let converter = SofficeConverter::new("true");
        let err = converter.docx_to_pdf(b"PK").unwrap_err();
        assert!(matches!(err, ConvertError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_a_failure() {
        let converter = SofficeConverter::new("false");
        match converter.docx_to_pdf(b"PK").unwrap_err() {
            ConvertError::Failed { status, .. } => assert!(!status.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_first_pdf_is_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"b").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"a").unwrap();
        std::fs::write(dir.path().join("0.txt"), b"x").unwrap();

        let first = first_pdf(dir.path()).unwrap().unwrap();
        assert_eq!(first.file_name().unwrap(), "a.PDF");
    }

    #[test]
    fn test_first_pdf_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(first_pdf(dir.path()).unwrap().is_none());
    }
}
