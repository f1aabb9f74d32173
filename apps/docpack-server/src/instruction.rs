//! Filling instructions for the spreadsheet
//!
//! A hand-written instruction file placed in the asset directory always
//! wins. Without one, a small DOCX is generated from the template catalog.

use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::catalog::TemplateCatalog;

/// Name the instruction is always downloaded as
pub const DOWNLOAD_NAME: &str = "instruction.docx";

/// Looked up in this order inside the asset directory
const CANDIDATES: [&str; 4] = [
    "instruction.docx",
    "инструкция.docx",
    "instruction.doc",
    "instruction.dock",
];

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

#[derive(Debug, Error)]
pub enum InstructionError {
    #[error("Failed to write instruction XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Failed to package instruction: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// First existing instruction file in `base_dir`
pub fn find_instruction_file(base_dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| base_dir.join(name))
        .find(|path| path.is_file())
}

enum Block {
    Title(String),
    Heading(String),
    Paragraph(String),
    Bullet(String),
}

const RULES: [&str; 8] = [
    "Формат даты: ДД.ММ.ГГГГ (например, 17.10.2025).",
    "Телефон в формате +7 999 123-45-67 или 8 999 123-45-67.",
    "E-mail: user@example.org.",
    "ФИО в именительном падеже: Иванов Иван Иванович.",
    "Поле «Курс» — целое число (1, 2, 3, 4...).",
    "ИНН организации — 10 или 12 цифр, без пробелов.",
    "Адреса указывайте полностью, как в официальных документах.",
    "Если колонка продублирована (например, «АдресОрганизации» и «АдрессОрганизации»), \
     укажите одно и то же значение в обеих.",
];

const MAIN_FIELDS: [(&str, &str); 14] = [
    ("ФИО", "Полное имя студента. Пример: Иванов Иван Иванович."),
    ("Группа", "Учебная группа. Пример: Изу-101."),
    ("Курс", "Номер курса. Пример: 3."),
    ("ТипПрактики / ВидПрактика", "Например: производственная, преддипломная."),
    ("НачалоПрактики / КонецПрактики", "Даты в формате ДД.ММ.ГГГГ."),
    ("БазаПрактики", "Наименование организации. Пример: ООО «Ромашка»."),
    (
        "АдресОрганизации / АдрессОрганизации",
        "Почтовый адрес организации (одно и то же значение в обеих колонках).",
    ),
    ("ЮрАдресПрофОрг", "Юридический адрес учебного подразделения."),
    ("ОргИНН", "ИНН организации."),
    ("РукПрофОрг / РукВУЗФИО / РукВУЗ", "ФИО и должности руководителей от организации и вуза."),
    ("Кафедра / КафедраРП", "Название кафедры."),
    (
        "Научный руководитель",
        "ФИО, должность, степень, звание: ФИОНаучРук, ДолжНаучРук, СтепеньНаучРук, ЗваниеНаучРук.",
    ),
    ("ФИОДП", "ФИО студента в требуемом падеже для ВКР (обычно родительный)."),
    ("СегодняшняяДата", "Текущая дата формирования документов."),
];

fn instruction_blocks(catalog: &TemplateCatalog) -> Vec<Block> {
    let mut blocks = vec![
        Block::Title("Инструкция по заполнению таблицы".to_string()),
        Block::Paragraph(
            "Таблица содержит один лист. В первой строке расположены названия полей, \
             во второй строке — значения для одного студента. На основании этих значений \
             формируются все документы из набора шаблонов."
                .to_string(),
        ),
        Block::Heading("Общие правила".to_string()),
    ];
    blocks.extend(RULES.iter().map(|rule| Block::Bullet(rule.to_string())));

    blocks.push(Block::Heading("Список основных полей".to_string()));
    blocks.extend(
        MAIN_FIELDS
            .iter()
            .map(|(name, description)| Block::Bullet(format!("{}: {}", name, description))),
    );

    blocks.push(Block::Heading("Имена выходных файлов".to_string()));
    blocks.push(Block::Paragraph(
        "Имена документов формируются автоматически и включают ФИО и группу, \
         например: «Дневник_{ФИО}_{Группа}.docx». Все документы одного студента \
         складываются в папку «001_<ФИО>» внутри архива."
            .to_string(),
    ));

    blocks.push(Block::Heading("Где используются данные".to_string()));
    if catalog.is_empty() {
        blocks.push(Block::Paragraph("Набор шаблонов пуст.".to_string()));
    }
    for template in catalog.templates() {
        let columns: BTreeSet<&str> = template.fields.values().map(String::as_str).collect();
        let columns = if columns.is_empty() {
            "—".to_string()
        } else {
            columns.into_iter().collect::<Vec<_>>().join(", ")
        };
        blocks.push(Block::Bullet(format!("{} ({}): {}", template.title(), template.id, columns)));
    }
    blocks.push(Block::Paragraph(
        "Заполняйте все поля без пропусков — пустые ячейки приводят к незаполненным местам в результатах."
            .to_string(),
    ));

    blocks
}

/// Generate the default instruction document
pub fn build_instruction_docx(catalog: &TemplateCatalog) -> Result<Vec<u8>, InstructionError> {
    let document = document_xml(&instruction_blocks(catalog))?;
    let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
        ("word/document.xml", document),
        ("word/styles.xml", STYLES.to_string()),
        ("docProps/core.xml", core_properties(&created)),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

fn document_xml(blocks: &[Block]) -> Result<String, InstructionError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut root = BytesStart::new("w:document");
    root.push_attribute(("xmlns:w", W_NS));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("w:body")))?;

    for block in blocks {
        match block {
            Block::Title(text) => write_paragraph(&mut writer, Some("Title"), text)?,
            Block::Heading(text) => write_paragraph(&mut writer, Some("Heading1"), text)?,
            Block::Paragraph(text) => write_paragraph(&mut writer, None, text)?,
            Block::Bullet(text) => write_paragraph(&mut writer, Some("ListBullet"), &format!("• {}", text))?,
        }
    }

    writer.write_event(Event::End(BytesEnd::new("w:body")))?;
    writer.write_event(Event::End(BytesEnd::new("w:document")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_paragraph<W: Write>(writer: &mut Writer<W>, style: Option<&str>, text: &str) -> Result<(), InstructionError> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    if let Some(style) = style {
        writer.write_event(Event::Start(BytesStart::new("w:pPr")))?;
        let mut style_elem = BytesStart::new("w:pStyle");
        style_elem.push_attribute(("w:val", style));
        writer.write_event(Event::Empty(style_elem))?;
        writer.write_event(Event::End(BytesEnd::new("w:pPr")))?;
    }
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    let mut text_elem = BytesStart::new("w:t");
    text_elem.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(text_elem))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

fn core_properties(created: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>Инструкция</dc:title><dc:creator>docpack-server</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{0}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{0}</dcterms:modified></cp:coreProperties>"#,
        created
    )
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Arial" w:hAnsi="Arial" w:cs="Arial"/><w:sz w:val="22"/></w:rPr></w:rPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:pPr><w:spacing w:after="120"/></w:pPr></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="40"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/><w:basedOn w:val="Normal"/><w:pPr><w:ind w:left="280"/></w:pPr></w:style></w:styles>"#;

#[cfg(test)]
mod tests {
    use std::io::Read;

    use zip::ZipArchive;

    use super::*;

    const CATALOG: &str = r#"[
        {"path": "input/Дневник.docx", "fields": {"FIO": "ФИО", "G": "Группа", "G2": "Группа"}, "out": "x"},
        {"path": "input/Титул.docx", "out": "y"}
    ]"#;

    fn read_part(package: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(package)).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_generated_package_structure() {
        let catalog = TemplateCatalog::from_json(CATALOG, Path::new(".")).unwrap();
        let package = build_instruction_docx(&catalog).unwrap();

        let archive = ZipArchive::new(Cursor::new(package.as_slice())).unwrap();
        let mut names: Vec<_> = archive.file_names().collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "[Content_Types].xml",
                "_rels/.rels",
                "docProps/core.xml",
                "word/_rels/document.xml.rels",
                "word/document.xml",
                "word/styles.xml",
            ]
        );

        let core = read_part(&package, "docProps/core.xml");
        assert!(core.contains("<dcterms:created xsi:type=\"dcterms:W3CDTF\">20"));
    }

    #[test]
    fn test_document_lists_catalog_templates() {
        let catalog = TemplateCatalog::from_json(CATALOG, Path::new(".")).unwrap();
        let package = build_instruction_docx(&catalog).unwrap();
        let document = read_part(&package, "word/document.xml");

        assert!(document.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(document.contains("<w:pStyle w:val=\"Title\"/>"));
        assert!(document.contains("• Дневник.docx (input_дневник): Группа, ФИО"));
        assert!(document.contains("• Титул.docx (input_титул): —"));
        // `<ФИО>` in the naming paragraph must be escaped
        assert!(document.contains("001_&lt;ФИО&gt;"));
    }

    #[test]
    fn test_document_describes_rules_and_fields() {
        let package = build_instruction_docx(&TemplateCatalog::default()).unwrap();
        let document = read_part(&package, "word/document.xml");

        for expected in [
            "+7 999 123-45-67",
            "E-mail: user@example.org.",
            "АдресОрганизации / АдрессОрганизации",
            "ЮрАдресПрофОрг",
            "РукПрофОрг / РукВУЗФИО / РукВУЗ",
            "ФИОНаучРук, ДолжНаучРук, СтепеньНаучРук, ЗваниеНаучРук",
            "ФИОДП",
            "СегодняшняяДата",
        ] {
            assert!(document.contains(expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_find_instruction_file_order() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_instruction_file(dir.path()).is_none());

        std::fs::write(dir.path().join("instruction.dock"), b"typo").unwrap();
        assert_eq!(
            find_instruction_file(dir.path()).unwrap(),
            dir.path().join("instruction.dock")
        );

        std::fs::write(dir.path().join("инструкция.docx"), b"ru").unwrap();
        assert_eq!(
            find_instruction_file(dir.path()).unwrap(),
            dir.path().join("инструкция.docx")
        );
    }
}
