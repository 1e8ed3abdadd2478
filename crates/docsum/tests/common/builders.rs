//! Builders for creating test documents programmatically.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Builder for single-font PDFs with one line of text per page.
pub struct PdfBuilder {
    pages: Vec<String>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// Add a page showing `text`. Parentheses and backslashes are not escaped.
    pub fn page(mut self, text: &str) -> Self {
        self.pages.push(text.to_string());
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in &self.pages {
            let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("Failed to write PDF");
        bytes
    }
}

/// Builder for DOCX files holding plain paragraphs.
pub struct DocxBuilder {
    paragraphs: Vec<String>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self {
            paragraphs: Vec::new(),
        }
    }

    pub fn paragraph(mut self, text: &str) -> Self {
        self.paragraphs.push(text.to_string());
        self
    }

    pub fn build(self) -> Vec<u8> {
        let body: String = self
            .paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        zip_archive(&[("word/document.xml", document)])
    }
}

/// Builder for XLSX workbooks whose cells are all inline strings.
pub struct XlsxBuilder {
    sheets: Vec<(String, Vec<Vec<String>>)>,
}

impl XlsxBuilder {
    pub fn new() -> Self {
        Self { sheets: Vec::new() }
    }

    pub fn sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        self.sheets.push((name.to_string(), rows));
        self
    }

    pub fn build(self) -> Vec<u8> {
        const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
        const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
        const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

        let mut overrides = String::new();
        let mut sheet_list = String::new();
        let mut rels = String::new();
        let mut worksheets = Vec::new();

        for (i, (name, rows)) in self.sheets.iter().enumerate() {
            let n = i + 1;
            overrides.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
            sheet_list.push_str(&format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="{NS_REL}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
            ));

            let mut data = String::new();
            for (r, row) in rows.iter().enumerate() {
                data.push_str(&format!(r#"<row r="{}">"#, r + 1));
                for (c, value) in row.iter().enumerate() {
                    let col = (b'A' + c as u8) as char;
                    data.push_str(&format!(
                        r#"<c r="{col}{}" t="inlineStr"><is><t>{value}</t></is></c>"#,
                        r + 1
                    ));
                }
                data.push_str("</row>");
            }
            worksheets.push((
                format!("xl/worksheets/sheet{n}.xml"),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{NS_MAIN}"><sheetData>{data}</sheetData></worksheet>"#
                ),
            ));
        }

        let mut entries: Vec<(String, String)> = vec![
            (
                "[Content_Types].xml".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
                ),
            ),
            (
                "_rels/.rels".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_PKG_REL}"><Relationship Id="rId1" Type="{NS_REL}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/workbook.xml".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheets>{sheet_list}</sheets></workbook>"#
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_PKG_REL}">{rels}</Relationships>"#
                ),
            ),
        ];
        entries.extend(worksheets);

        let borrowed: Vec<(&str, String)> = entries
            .iter()
            .map(|(name, xml)| (name.as_str(), xml.clone()))
            .collect();
        zip_archive(&borrowed)
    }
}

fn zip_archive(entries: &[(&str, String)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        writer
            .write_all(contents.as_bytes())
            .expect("Failed to write zip entry");
    }
    writer
        .finish()
        .expect("Failed to finish zip archive")
        .into_inner()
}
