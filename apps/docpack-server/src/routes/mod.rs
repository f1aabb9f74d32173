//! Route modules for Docpack Server

pub mod catalog;
pub mod downloads;
pub mod form;
pub mod generate;
pub mod health;
pub mod index;
pub mod inspect;

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;

    use axum_test::TestServer;
    use tempfile::TempDir;

    use crate::catalog::TemplateCatalog;
    use crate::config::{AssetsConfig, Config};
    use crate::render::{build_docx, ConvertError, DocumentConverter};
    use crate::state::AppState;

    pub const KIT1_BYTES: &[u8] = b"PK\x03\x04 first kit workbook";

    const CATALOG: &str = r#"[
        {"path": "input/first/Дневник.docx", "fields": {"FIO": "ФИО", "GROUP": "Группа"},
         "out": "Дневник_{ФИО}_{Группа}.docx"},
        {"path": "input/first/Отчёт.docx", "fields": {"FIO": "ФИО"},
         "out": "Отчёт_{ФИО}.docx", "output": "pdf"},
        {"path": "input/second/Сломан.docx", "out": "Сломан_{ФИО}.docx"}
    ]"#;

    /// Converter that never shells out
    pub struct FakeConverter;

    impl DocumentConverter for FakeConverter {
        fn docx_to_pdf(&self, _docx: &[u8]) -> Result<Vec<u8>, ConvertError> {
            Ok(b"%PDF-1.4 fake".to_vec())
        }
    }

    /// Asset directory plus a server running on top of it
    pub struct Fixture {
        pub dir: TempDir,
        pub server: TestServer,
    }

    fn write(base: &Path, rel: &str, content: &[u8]) {
        let path = base.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// State with an empty catalog and default config
    pub fn empty_state() -> AppState {
        AppState::with_converter(Config::default(), TemplateCatalog::default(), Arc::new(FakeConverter))
    }

    pub fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        write(base, "templates.json", CATALOG.as_bytes());
        write(base, "input/first/Дневник.docx", &build_docx("{{ FIO }} / {{ GROUP }}"));
        write(base, "input/first/Отчёт.docx", &build_docx("{{ FIO|letter(0) }}."));
        write(base, "input/second/Сломан.docx", &build_docx("{% if %}"));
        write(base, "table_templates/First шаблон.xlsx", KIT1_BYTES);

        let config = Config {
            assets: AssetsConfig::from_base_dir(base),
            ..Config::default()
        };
        let catalog = TemplateCatalog::load(&config.assets.catalog_path, &config.assets.base_dir).unwrap();
        let state = AppState::with_converter(config, catalog, Arc::new(FakeConverter));
        let server = TestServer::new(crate::app(state)).unwrap();

        Fixture { dir, server }
    }
}
