//! Application state management

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::TemplateCatalog;
use crate::config::Config;
use crate::record::SheetClient;
use crate::render::{DocumentConverter, SofficeConverter, TemplateEngine};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    catalog: TemplateCatalog,
    engine: TemplateEngine,
    converter: Arc<dyn DocumentConverter>,
    sheets: SheetClient,
}

impl AppState {
    /// Create the state with the configured `soffice` converter
    pub fn new(config: Config, catalog: TemplateCatalog) -> Self {
        let converter = Arc::new(SofficeConverter::new(config.converter.soffice_bin.clone()));
        Self::with_converter(config, catalog, converter)
    }

    pub fn with_converter(
        config: Config,
        catalog: TemplateCatalog,
        converter: Arc<dyn DocumentConverter>,
    ) -> Self {
        let sheets = SheetClient::with_export_base(
            Duration::from_secs(config.sheets.timeout_secs),
            config.sheets.export_base.clone(),
        );
        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                engine: TemplateEngine::new(),
                converter,
                sheets,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the template catalog
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.inner.catalog
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.inner.engine
    }

    pub fn converter(&self) -> &Arc<dyn DocumentConverter> {
        &self.inner.converter
    }

    /// Get the Google Sheets client
    pub fn sheets(&self) -> &SheetClient {
        &self.inner.sheets
    }
}
