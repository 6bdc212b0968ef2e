//! Inline pictures: media part, image relationship and `w:drawing` markup.

use std::io::Cursor;
use std::path::Path;

use image::ImageFormat;
use log::debug;
use serde::{Deserialize, Serialize};

use super::package::{self, ContentTypes, REL_IMAGE};
use super::xml::Element;
use super::{Document, Run};
use crate::error::DocxError;

const EMU_PER_INCH: f64 = 914_400.0;

const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// A display length in inches.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inches(pub f64);

impl Inches {
    /// English Metric Units, the unit DrawingML extents are written in.
    pub fn emu(self) -> u64 {
        (self.0 * EMU_PER_INCH).round().max(0.0) as u64
    }
}

fn media_kind(format: ImageFormat) -> Result<(&'static str, &'static str), DocxError> {
    match format {
        ImageFormat::Png => Ok(("png", "image/png")),
        ImageFormat::Jpeg => Ok(("jpeg", "image/jpeg")),
        ImageFormat::Gif => Ok(("gif", "image/gif")),
        ImageFormat::Bmp => Ok(("bmp", "image/bmp")),
        other => Err(DocxError::Malformed(format!(
            "image format {other:?} cannot be embedded"
        ))),
    }
}

impl Document {
    /// Embed the image at `image_path` into the package and return a run that
    /// shows it `width` wide, height following the image's aspect ratio.
    ///
    /// The file is only read; it is not moved or deleted.
    pub fn picture_run(&mut self, image_path: &Path, width: Inches) -> Result<Run, DocxError> {
        let bytes = std::fs::read(image_path)?;
        let reader = image::io::Reader::new(Cursor::new(&bytes)).with_guessed_format()?;
        let format = reader
            .format()
            .ok_or_else(|| DocxError::Malformed(format!("{} is not a known image type", image_path.display())))?;
        let (ext, content_type) = media_kind(format)?;
        let (px_w, px_h) = reader.into_dimensions()?;
        if px_w == 0 || px_h == 0 {
            return Err(DocxError::Malformed(format!("{} has no pixels", image_path.display())));
        }

        let cx = width.emu();
        let cy = (cx as f64 * f64::from(px_h) / f64::from(px_w)).round() as u64;
        let drawing_id = self.max_drawing_id() + 1;

        let main_part = self.main_part().to_string();
        let media_dir = match main_part.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/media"),
            None => "media".to_string(),
        };

        let (pkg, rels, _) = self.parts_mut();
        let part_name = pkg.unique_part_name(&media_dir, "image", ext);
        let file_name = part_name.rsplit('/').next().unwrap_or(&part_name).to_string();
        pkg.insert(part_name.as_str(), bytes);

        let mut content_types = ContentTypes::load(pkg)?;
        content_types.ensure_default(ext, content_type);
        content_types.store(pkg)?;

        let r_id = rels.add(REL_IMAGE, &package::relative_target(&main_part, &part_name), false);
        debug!("embedded {} as {part_name} ({r_id}), {cx}x{cy} EMU", image_path.display());

        Ok(Run::with_element(inline_drawing(&r_id, drawing_id, &file_name, cx, cy)))
    }
}

fn inline_drawing(r_id: &str, drawing_id: u32, file_name: &str, cx: u64, cy: u64) -> Element {
    let (cx, cy) = (cx.to_string(), cy.to_string());

    let blip_fill = Element::new("pic:blipFill")
        .with_child(
            Element::new("a:blip")
                .with_attr("xmlns:r", NS_R)
                .with_attr("r:embed", r_id),
        )
        .with_child(Element::new("a:stretch").with_child(Element::new("a:fillRect")));

    let shape = Element::new("pic:spPr")
        .with_child(
            Element::new("a:xfrm")
                .with_child(Element::new("a:off").with_attr("x", "0").with_attr("y", "0"))
                .with_child(
                    Element::new("a:ext")
                        .with_attr("cx", cx.as_str())
                        .with_attr("cy", cy.as_str()),
                ),
        )
        .with_child(
            Element::new("a:prstGeom")
                .with_attr("prst", "rect")
                .with_child(Element::new("a:avLst")),
        );

    let pic = Element::new("pic:pic")
        .with_attr("xmlns:pic", NS_PIC)
        .with_child(
            Element::new("pic:nvPicPr")
                .with_child(
                    Element::new("pic:cNvPr")
                        .with_attr("id", "0")
                        .with_attr("name", file_name),
                )
                .with_child(Element::new("pic:cNvPicPr")),
        )
        .with_child(blip_fill)
        .with_child(shape);

    let inline = Element::new("wp:inline")
        .with_attr("xmlns:wp", NS_WP)
        .with_attr("distT", "0")
        .with_attr("distB", "0")
        .with_attr("distL", "0")
        .with_attr("distR", "0")
        .with_child(
            Element::new("wp:extent")
                .with_attr("cx", cx.as_str())
                .with_attr("cy", cy.as_str()),
        )
        .with_child(
            Element::new("wp:docPr")
                .with_attr("id", drawing_id.to_string())
                .with_attr("name", format!("Picture {drawing_id}")),
        )
        .with_child(
            Element::new("wp:cNvGraphicFramePr").with_child(
                Element::new("a:graphicFrameLocks")
                    .with_attr("xmlns:a", NS_A)
                    .with_attr("noChangeAspect", "1"),
            ),
        )
        .with_child(
            Element::new("a:graphic").with_attr("xmlns:a", NS_A).with_child(
                Element::new("a:graphicData")
                    .with_attr("uri", NS_PIC)
                    .with_child(pic),
            ),
        );

    Element::new("w:drawing").with_child(inline)
}
