//! Template catalog
//!
//! The catalog is a static JSON list of template descriptors loaded once at
//! startup. Each descriptor names a DOCX template, maps template placeholders
//! to spreadsheet columns and describes how the rendered file is named.

mod ids;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

pub use ids::{normalize_header, slug_id, template_id};

/// Column holding the student's full name; it also names the archive folder
pub const PRIMARY_FIELD: &str = "ФИО";

/// Columns every upload is expected to have
pub const REQUIRED_FIELDS: [&str; 2] = ["ФИО", "Группа"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read template catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid template catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate template id {id:?} ({first} and {second})")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },
}

/// Requested ids matched nothing in the catalog
#[derive(Debug, Clone, Error)]
#[error("No template matches the requested ids")]
pub struct SelectionError {
    /// Requested ids, sorted
    pub requested: Vec<String>,
    /// Every id in the catalog, in catalog order
    pub available: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Docx,
    Pdf,
}

impl OutputFormat {
    /// Anything other than `pdf` (case-insensitive) means DOCX
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("pdf") => OutputFormat::Pdf,
            _ => OutputFormat::Docx,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Docx => ".docx",
            OutputFormat::Pdf => ".pdf",
        }
    }
}

/// Descriptor as written in the catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct RawDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    pub path: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub out: String,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TemplateDescriptor {
    pub id: String,
    /// Catalog path with `/` separators, as shown to clients
    pub path: String,
    /// Resolved location of the DOCX file
    pub source: PathBuf,
    /// Template placeholder -> spreadsheet column
    pub fields: BTreeMap<String, String>,
    /// Output filename pattern (`{column}` placeholders)
    pub out: String,
    /// Optional subfolder pattern inside the record folder
    pub dir: Option<String>,
    pub output: OutputFormat,
}

impl TemplateDescriptor {
    /// Display title: file stem plus `.docx`
    pub fn title(&self) -> String {
        let stem = Path::new(&self.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.path);
        format!("{}.docx", stem)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<TemplateDescriptor>,
    expected_headers: HashSet<String>,
}

impl TemplateCatalog {
    /// Load the catalog file; template paths resolve against `base_dir`
    pub fn load(path: &Path, base_dir: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json, base_dir)
    }

    pub fn from_json(json: &str, base_dir: &Path) -> Result<Self, CatalogError> {
        let raw: Vec<RawDescriptor> = serde_json::from_str(json)?;
        Self::from_raw(raw, base_dir)
    }

    pub fn from_raw(raw: Vec<RawDescriptor>, base_dir: &Path) -> Result<Self, CatalogError> {
        let mut templates: Vec<TemplateDescriptor> = Vec::with_capacity(raw.len());

        for (index, descriptor) in raw.into_iter().enumerate() {
            let path = descriptor.path.replace('\\', "/");
            let id = match descriptor.id {
                Some(id) if !id.trim().is_empty() => id.trim().to_lowercase(),
                _ => template_id(&path, index),
            };

            if let Some(existing) = templates.iter().find(|t| t.id == id) {
                return Err(CatalogError::DuplicateId {
                    id,
                    first: existing.path.clone(),
                    second: path,
                });
            }

            templates.push(TemplateDescriptor {
                id,
                source: base_dir.join(&path),
                path,
                fields: descriptor.fields,
                out: descriptor.out,
                dir: descriptor.dir.filter(|d| !d.trim().is_empty()),
                output: OutputFormat::parse(descriptor.output.as_deref()),
            });
        }

        let expected_headers = expected_headers(&templates);
        Ok(Self {
            templates,
            expected_headers,
        })
    }

    pub fn templates(&self) -> &[TemplateDescriptor] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TemplateDescriptor> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.templates.iter().map(|t| t.id.clone()).collect()
    }

    /// Templates whose path starts with `prefix` (`\` treated as `/`)
    pub fn with_prefix(&self, prefix: Option<&str>) -> Vec<&TemplateDescriptor> {
        match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => {
                let prefix = prefix.replace('\\', "/");
                self.templates
                    .iter()
                    .filter(|t| t.path.starts_with(&prefix))
                    .collect()
            }
            None => self.templates.iter().collect(),
        }
    }

    /// Apply a comma-separated id filter. A missing or blank filter selects
    /// every template; a filter that matches nothing is an error.
    pub fn select(&self, include: Option<&str>) -> Result<Vec<&TemplateDescriptor>, SelectionError> {
        let requested: BTreeSet<String> = include
            .unwrap_or("")
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        if requested.is_empty() {
            return Ok(self.templates.iter().collect());
        }

        let selected: Vec<&TemplateDescriptor> = self
            .templates
            .iter()
            .filter(|t| requested.contains(&t.id))
            .collect();

        if selected.is_empty() {
            return Err(SelectionError {
                requested: requested.into_iter().collect(),
                available: self.ids(),
            });
        }
        Ok(selected)
    }

    /// How many of `columns` look like headers the catalog knows about
    pub fn score_columns<S: AsRef<str>>(&self, columns: &[S]) -> usize {
        columns
            .iter()
            .filter(|c| {
                let name: &str = (*c).as_ref();
                self.expected_headers.contains(&normalize_header(name))
            })
            .count()
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^}]+)\}").unwrap())
}

fn expected_headers(templates: &[TemplateDescriptor]) -> HashSet<String> {
    let mut expected: HashSet<String> = REQUIRED_FIELDS.iter().map(|f| normalize_header(f)).collect();
    for template in templates {
        expected.extend(template.fields.values().map(|column| normalize_header(column)));
        expected.extend(
            placeholder_re()
                .captures_iter(&template.out)
                .map(|c| normalize_header(&c[1])),
        );
    }
    expected
}
