//! Zip container, content types and relationship parts.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::xml::{Element, Node, XmlPart};
use crate::error::DocxError;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// All parts of an OPC package, keyed by part name without a leading slash.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

/// Upper bound on the buffer reserved up front for one part.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

impl Package {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocxError> {
        let file = File::open(path)?;
        Self::read_from(file)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        Self::read_from(Cursor::new(bytes))
    }

    fn read_from<R: Read + std::io::Seek>(reader: R) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut parts = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            // The declared size comes from the archive and is only a hint.
            let mut data = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
            entry.read_to_end(&mut data)?;
            parts.insert(entry.name().trim_start_matches('/').to_string(), data);
        }
        Ok(Package { parts })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        // Consumers expect the content types part first.
        if let Some(data) = self.parts.get(CONTENT_TYPES_PART) {
            zip.start_file(CONTENT_TYPES_PART, options)?;
            zip.write_all(data)?;
        }
        for (name, data) in &self.parts {
            if name == CONTENT_TYPES_PART {
                continue;
            }
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DocxError> {
        let bytes = self.to_bytes()?;
        let mut file = File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    /// Part names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.parts.insert(name.into(), data);
    }

    pub fn part_xml(&self, name: &str) -> Result<XmlPart, DocxError> {
        let data = self
            .get(name)
            .ok_or_else(|| DocxError::MissingPart(name.to_string()))?;
        XmlPart::parse_bytes(data)
    }

    pub fn set_part_xml(&mut self, name: &str, part: &XmlPart) -> Result<(), DocxError> {
        self.insert(name, part.to_bytes()?);
        Ok(())
    }

    /// Pick a name like `word/media/image3.png` that is not yet taken.
    pub fn unique_part_name(&self, dir: &str, stem: &str, ext: &str) -> String {
        (1..)
            .map(|n| format!("{dir}/{stem}{n}.{ext}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| format!("{dir}/{stem}.{ext}"))
    }
}

/// Name of the relationships part that belongs to `part_name`.
pub fn rels_part_for(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_name}.rels"),
    }
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Target of `part_name` written relative to the directory of `source_part`.
pub fn relative_target(source_part: &str, part_name: &str) -> String {
    match source_part.rsplit_once('/') {
        Some((dir, _)) => match part_name.strip_prefix(&format!("{dir}/")) {
            Some(rest) => rest.to_string(),
            None => format!("/{part_name}"),
        },
        None => part_name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    pub fn load(package: &Package, rels_part: &str) -> Result<Self, DocxError> {
        if !package.contains(rels_part) {
            return Ok(Relationships::default());
        }
        let xml = package.part_xml(rels_part)?;
        let items = xml
            .root
            .child_elements()
            .filter(|e| e.is("Relationship"))
            .filter_map(|e| {
                Some(Relationship {
                    id: e.attr("Id")?.to_string(),
                    rel_type: e.attr("Type")?.to_string(),
                    target: e.attr("Target")?.to_string(),
                    external: e.attr("TargetMode") == Some("External"),
                })
            })
            .collect();
        Ok(Relationships { items })
    }

    pub fn to_part(&self) -> XmlPart {
        let mut root = Element::new("Relationships").with_attr("xmlns", RELS_NS);
        for rel in &self.items {
            let mut e = Element::new("Relationship")
                .with_attr("Id", rel.id.as_str())
                .with_attr("Type", rel.rel_type.as_str())
                .with_attr("Target", rel.target.as_str());
            if rel.external {
                e.set_attr("TargetMode", "External");
            }
            root = root.with_child(e);
        }
        XmlPart::new(root)
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    pub fn by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.rel_type == rel_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    /// Add a relationship under a fresh `rIdN` and return that id.
    pub fn add(&mut self, rel_type: &str, target: &str, external: bool) -> String {
        let next = self
            .items
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{next}");
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external,
        });
        id
    }
}

/// `[Content_Types].xml`, edited in place.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    part: XmlPart,
}

impl ContentTypes {
    pub fn load(package: &Package) -> Result<Self, DocxError> {
        Ok(ContentTypes {
            part: package.part_xml(CONTENT_TYPES_PART)?,
        })
    }

    pub fn store(&self, package: &mut Package) -> Result<(), DocxError> {
        package.set_part_xml(CONTENT_TYPES_PART, &self.part)
    }

    /// Content type that applies to `part_name`, override first.
    pub fn content_type_of(&self, part_name: &str) -> Option<&str> {
        let absolute = format!("/{part_name}");
        let overridden = self
            .part
            .root
            .child_elements()
            .filter(|e| e.is("Override"))
            .find(|e| e.attr("PartName") == Some(absolute.as_str()))
            .and_then(|e| e.attr("ContentType"));
        if overridden.is_some() {
            return overridden;
        }
        let ext = part_name.rsplit_once('.')?.1;
        self.default_for(ext)
    }

    pub fn default_for(&self, ext: &str) -> Option<&str> {
        self.part
            .root
            .child_elements()
            .filter(|e| e.is("Default"))
            .find(|e| {
                e.attr("Extension")
                    .is_some_and(|x| x.eq_ignore_ascii_case(ext))
            })
            .and_then(|e| e.attr("ContentType"))
    }

    pub fn ensure_default(&mut self, ext: &str, content_type: &str) {
        if self.default_for(ext).is_some() {
            return;
        }
        let default = Element::new("Default")
            .with_attr("Extension", ext)
            .with_attr("ContentType", content_type);
        // Defaults conventionally precede overrides.
        let at = self
            .part
            .root
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.is("Override")))
            .unwrap_or(self.part.root.children.len());
        self.part
            .root
            .children
            .insert(at, Node::Element(default));
    }

    pub fn add_override(&mut self, part_name: &str, content_type: &str) {
        let absolute = format!("/{part_name}");
        let exists = self
            .part
            .root
            .child_elements()
            .any(|e| e.is("Override") && e.attr("PartName") == Some(absolute.as_str()));
        if !exists {
            self.part.root.children.push(Node::Element(
                Element::new("Override")
                    .with_attr("PartName", absolute)
                    .with_attr("ContentType", content_type),
            ));
        }
    }
}
