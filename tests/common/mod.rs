#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use proposal_builder::docx::{Block, Document, Paragraph, TextContainer};
use proposal_builder::{DocxError, ProposalConfig, ScopedImage, TemplateSource, UploadPolicy};
use tempfile::TempDir;

/// A template library on disk plus a config pointing at it.
pub struct Fixture {
    pub dir: TempDir,
    pub config: ProposalConfig,
}

impl Fixture {
    /// Master, Design, NGFW, SD-WAN, FG-100F and FG-601F fragments.
    /// The catalog also lists SASE and FG-60F, which have no file.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("templates");
        std::fs::create_dir_all(base.join("Models")).unwrap();

        let mut config = ProposalConfig::default();
        config.templates.base_dir = base.clone();
        config.output.dir = dir.path().join("out");
        config.output.history_file = dir.path().join("submissions.json");
        config.catalog.technologies = ids(&["NGFW", "SD-WAN", "SASE"]);
        config.catalog.models = ids(&["FG-100F", "FG-601F", "FG-60F"]);

        write_docx(
            &config.master_path(),
            &["(Logo)", "Technical Proposal for <<Customer Name>>", "Project: (Proj)"],
        );
        write_docx(
            &config.design_path(),
            &["Design for <<Customer Name>>", "<<Design>>", "<<Design Describtion>>"],
        );
        for tech in ["NGFW", "SD-WAN"] {
            write_docx(&config.technology_path(tech), &[&format!("{tech} for <<Customer Name>>")]);
        }
        for model in ["FG-100F", "FG-601F"] {
            write_docx_with_table(
                &config.model_path(model),
                &format!("{model} datasheet"),
                "Prepared for <<Customer Name>>",
            );
        }

        Fixture { dir, config }
    }

    pub fn policy(&self) -> UploadPolicy {
        UploadPolicy::from(&self.config.uploads)
    }

    /// A PNG staged as an upload, plus the path of its temporary file.
    pub fn upload(&self, field: &'static str, width: u32, height: u32) -> (ScopedImage, PathBuf) {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        let image = ScopedImage::from_bytes(field, &format!("{field}.png"), Some("image/png"), &bytes, &self.policy())
            .unwrap()
            .unwrap();
        let path = image.path().to_path_buf();
        (image, path)
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn write_docx(path: &Path, paragraphs: &[&str]) {
    let mut doc = Document::blank().unwrap();
    for text in paragraphs {
        doc.body_mut().push(Paragraph::with_text(text));
    }
    doc.save(path).unwrap();
}

/// A heading paragraph followed by a one-cell table holding `cell_text`.
pub fn write_docx_with_table(path: &Path, heading: &str, cell_text: &str) {
    let mut doc = Document::blank().unwrap();
    doc.body_mut().push(Paragraph::with_text(heading));
    let table = proposal_builder::docx::xml::parse_element(&format!(
        "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
        cell_text.replace('<', "&lt;").replace('>', "&gt;")
    ))
    .unwrap();
    doc.body_mut().push(Block::from(table));
    doc.save(path).unwrap();
}

pub fn texts(doc: &Document) -> Vec<String> {
    doc.body().all_paragraph_texts()
}

pub fn drawing_count(doc: &Document) -> usize {
    let mut count = 0;
    for block in &doc.body().blocks {
        block.walk_elements(&mut |e| {
            if e.is("w:drawing") {
                count += 1;
            }
        });
    }
    count
}

/// Records every path it is asked to load.
#[derive(Default)]
pub struct RecordingSource {
    pub loads: RefCell<Vec<PathBuf>>,
}

impl TemplateSource for RecordingSource {
    fn load(&self, path: &Path) -> Result<Document, DocxError> {
        self.loads.borrow_mut().push(path.to_path_buf());
        Document::open(path)
    }
}
