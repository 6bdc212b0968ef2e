//! Placeholder substitution.
//!
//! Templates carry literal marker strings such as `<<Customer Name>>` or
//! `(Logo)`. Text markers are replaced run by run, so a replaced run keeps its
//! formatting. Image markers are cut out of their paragraph and a picture is
//! appended to that paragraph instead.
//!
//! Both operations walk the body and, recursively, every table cell through
//! [`TextContainer`].

use std::ops::ControlFlow;
use std::path::Path;

use log::debug;

use crate::docx::{Document, Inches, TextContainer};
use crate::error::DocxError;

/// Replace every occurrence of `token` in every run under `container`.
///
/// A token is only found when it sits inside a single run. Tokens that Word
/// split over several runs (for example after partial re-formatting) are left
/// alone.
///
/// # Arguments
/// * `container` - The body or table cell to walk
/// * `token` - The literal marker to look for
/// * `replacement` - The text written in its place
///
/// # Returns
/// * `usize` - Number of occurrences replaced; 0 when the token is absent
///
/// # Examples
/// ```
/// use proposal_builder::docx::{Document, Paragraph, TextContainer};
/// use proposal_builder::placeholder::substitute_text;
///
/// let mut doc = Document::blank().unwrap();
/// doc.body_mut().push(Paragraph::with_text("Dear <<Customer Name>>,"));
/// assert_eq!(substitute_text(doc.body_mut(), "<<Customer Name>>", "Acme"), 1);
/// assert_eq!(doc.body().all_paragraph_texts(), vec!["Dear Acme,"]);
/// ```
pub fn substitute_text<C: TextContainer + ?Sized>(container: &mut C, token: &str, replacement: &str) -> usize {
    if token.is_empty() {
        return 0;
    }
    let mut replaced = 0;
    let _ = container.visit_paragraphs_mut(&mut |paragraph| {
        for run in paragraph.runs_mut() {
            let text = run.text();
            let hits = text.matches(token).count();
            if hits > 0 {
                run.set_text(&text.replace(token, replacement));
                replaced += hits;
            }
        }
        ControlFlow::Continue(())
    });
    if replaced > 0 {
        debug!("replaced {replaced} occurrence(s) of {token:?}");
    }
    replaced
}

/// Swap the first paragraph containing `token` for the same paragraph
/// without the token and with a picture of `image_path` appended.
///
/// The picture is `width` wide; its height follows the image's aspect ratio.
/// When no paragraph contains the token the document is left untouched,
/// the image is not read and `Ok(false)` is returned. Only the first match is
/// replaced. The image file is never deleted here.
pub fn substitute_image(
    document: &mut Document,
    token: &str,
    image_path: &Path,
    width: Inches,
) -> Result<bool, DocxError> {
    if token.is_empty() || !contains_token(document, token) {
        debug!("image placeholder {token:?} not present");
        return Ok(false);
    }

    // Embedding first means a bad image leaves the paragraph as it was.
    let picture = document.picture_run(image_path, width)?;

    let mut picture = Some(picture);
    let _ = document.body_mut().visit_paragraphs_mut(&mut |paragraph| {
        if !paragraph.text().contains(token) {
            return ControlFlow::Continue(());
        }
        paragraph.remove_text(token);
        if let Some(run) = picture.take() {
            paragraph.push_run(run);
        }
        ControlFlow::Break(())
    });
    debug!("placed {} at {token:?}", image_path.display());
    Ok(true)
}

fn contains_token(document: &Document, token: &str) -> bool {
    document
        .body()
        .visit_paragraphs(&mut |p| {
            if p.text().contains(token) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .is_break()
}
