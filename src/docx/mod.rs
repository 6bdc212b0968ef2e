//! Minimal WordprocessingML (`.docx`) support.
//!
//! A [`Document`] keeps every part of the package in memory, parses the main
//! document part into a typed [`Body`] and writes everything back on save.
//! Parts the builder never edits (headers, footers, numbering, theme, ...)
//! pass through byte for byte.

pub mod body;
pub mod compose;
pub mod package;
pub mod picture;
pub mod xml;

use std::path::Path;

use log::debug;

pub use body::{Block, Body, Cell, Paragraph, Run, Table, TextContainer};
pub use compose::Composer;
pub use package::{ContentTypes, Package, Relationships};
pub use picture::Inches;
use xml::{Node, XmlPart};

use crate::error::DocxError;

const DEFAULT_MAIN_PART: &str = "word/document.xml";

/// An opened `.docx` document.
#[derive(Debug, Clone)]
pub struct Document {
    package: Package,
    main_part: String,
    /// `w:document` with its `w:body` child taken out into `body`.
    root: XmlPart,
    body_index: usize,
    body: Body,
    relationships: Relationships,
}

impl Document {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocxError> {
        let path = path.as_ref();
        debug!("opening {}", path.display());
        Self::from_package(Package::open(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        Self::from_package(Package::from_bytes(bytes)?)
    }

    /// An empty document with a single default paragraph style.
    pub fn blank() -> Result<Self, DocxError> {
        let mut package = Package::default();
        package.insert(package::CONTENT_TYPES_PART, BLANK_CONTENT_TYPES.as_bytes().to_vec());
        package.insert(package::PACKAGE_RELS_PART, BLANK_PACKAGE_RELS.as_bytes().to_vec());
        package.insert(DEFAULT_MAIN_PART, BLANK_DOCUMENT.as_bytes().to_vec());
        package.insert("word/_rels/document.xml.rels", BLANK_DOCUMENT_RELS.as_bytes().to_vec());
        package.insert("word/styles.xml", BLANK_STYLES.as_bytes().to_vec());
        Self::from_package(package)
    }

    pub fn from_package(package: Package) -> Result<Self, DocxError> {
        let main_part = Relationships::load(&package, package::PACKAGE_RELS_PART)?
            .by_type(package::REL_OFFICE_DOCUMENT)
            .map(|rel| package::resolve_target("", &rel.target))
            .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());

        let mut root = package.part_xml(&main_part)?;
        if !root.root.is("w:document") {
            return Err(DocxError::Malformed(format!(
                "{main_part} has root <{}>, expected <w:document>",
                root.root.name
            )));
        }
        let body_index = root
            .root
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.is("w:body")))
            .ok_or_else(|| DocxError::Malformed(format!("{main_part} has no <w:body>")))?;
        // The body lives in `body` until save; keep its slot with an empty node.
        let body_element = match root.root.children.remove(body_index) {
            Node::Element(e) => e,
            other => {
                return Err(DocxError::Malformed(format!(
                    "{main_part}: unexpected node {other:?} in place of <w:body>"
                )));
            }
        };
        root.root.children.insert(body_index, Node::Text(String::new()));

        let relationships = Relationships::load(&package, &package::rels_part_for(&main_part))?;

        Ok(Document {
            package,
            main_part,
            root,
            body_index,
            body: Body::from_element(body_element),
            relationships,
        })
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn main_part(&self) -> &str {
        &self.main_part
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Package, &mut Relationships, &mut Body) {
        (&mut self.package, &mut self.relationships, &mut self.body)
    }

    /// Serialise the body and relationships back into the package.
    pub fn to_package(&self) -> Result<Package, DocxError> {
        let mut package = self.package.clone();

        let mut root = self.root.clone();
        root.root.children[self.body_index] = Node::Element(self.body.clone().into_element());
        package.set_part_xml(&self.main_part, &root)?;
        package.set_part_xml(
            &package::rels_part_for(&self.main_part),
            &self.relationships.to_part(),
        )?;
        Ok(package)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        self.to_package()?.to_bytes()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DocxError> {
        let path = path.as_ref();
        debug!("saving {}", path.display());
        self.to_package()?.save(path)
    }

    /// Largest `wp:docPr` id used in the body; drawing ids must be unique.
    pub(crate) fn max_drawing_id(&self) -> u32 {
        let mut max = 0;
        for block in &self.body.blocks {
            block.walk_elements(&mut |e| {
                if e.is("wp:docPr") {
                    if let Some(id) = e.attr("id").and_then(|v| v.parse::<u32>().ok()) {
                        max = max.max(id);
                    }
                }
            });
        }
        max
    }
}

const BLANK_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const BLANK_PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const BLANK_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><w:body><w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#;

const BLANK_DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const BLANK_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style></w:styles>"#;
