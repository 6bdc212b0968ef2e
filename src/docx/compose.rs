//! Concatenating documents.
//!
//! [`Composer`] appends the body of one document to another. Appended content
//! keeps working in its new home: pictures and other referenced parts are
//! copied under fresh relationship ids, hyperlinks are re-registered,
//! paragraph styles, list definitions and namespace declarations that the
//! target lacks are carried over, and drawing ids are renumbered.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use super::body::Block;
use super::package::{self, ContentTypes, REL_STYLES, Relationship};
use super::xml::{Element, Node, XmlPart};
use super::Document;
use crate::error::DocxError;

const REL_NUMBERING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
const NUMBERING_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml";
const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Relationship-valued attributes use the `r:` prefix (`r:id`, `r:embed`,
/// `r:link`, `r:dm`, ...).
fn is_relationship_attr(key: &str) -> bool {
    key.starts_with("r:")
}

/// Accumulates documents onto a master document.
pub struct Composer {
    document: Document,
}

impl Composer {
    pub fn new(master: Document) -> Self {
        Composer { document: master }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Append the body of `fragment`, minus its final section properties.
    ///
    /// Either the whole fragment is appended or, on error, the composed
    /// document is left exactly as it was.
    pub fn append(&mut self, fragment: Document) -> Result<(), DocxError> {
        let mut staged = Composer {
            document: self.document.clone(),
        };
        staged.append_staged(fragment)?;
        self.document = staged.document;
        Ok(())
    }

    fn append_staged(&mut self, mut fragment: Document) -> Result<(), DocxError> {
        self.merge_namespaces(&fragment)?;
        let mut blocks = std::mem::take(&mut fragment.body_mut().blocks);

        // Section breaks inside the fragment keep page setup but inherit the
        // master's headers and footers.
        for block in &mut blocks {
            block.walk_elements_mut(&mut |e| {
                if e.is("w:sectPr") {
                    e.children.retain(|n| {
                        !matches!(n, Node::Element(c)
                            if c.is("w:headerReference") || c.is("w:footerReference"))
                    });
                }
            });
        }

        let id_map = self.import_relationships(&fragment, &blocks)?;
        let mut next_drawing_id = self.document.max_drawing_id();
        for block in &mut blocks {
            block.walk_elements_mut(&mut |e| {
                for (key, value) in e.attributes.iter_mut() {
                    if is_relationship_attr(key) {
                        if let Some(new_id) = id_map.get(value.as_str()) {
                            *value = new_id.clone();
                        }
                    }
                }
                if e.is("wp:docPr") {
                    next_drawing_id += 1;
                    e.set_attr("id", next_drawing_id.to_string());
                }
            });
        }

        self.merge_styles(&fragment)?;
        self.merge_numbering(&fragment, &mut blocks)?;

        debug!("appending {} blocks", blocks.len());
        self.document.body_mut().blocks.extend(blocks);
        Ok(())
    }

    /// Declare on the master root every namespace prefix the fragment root
    /// declares, and extend `mc:Ignorable` with the fragment's prefixes.
    fn merge_namespaces(&mut self, fragment: &Document) -> Result<(), DocxError> {
        let source = &fragment.root.root;
        let target = &mut self.document.root.root;

        for (key, uri) in &source.attributes {
            let Some(prefix) = key.strip_prefix("xmlns:") else {
                continue;
            };
            match target.attr(key) {
                Some(bound) if bound == uri => {}
                Some(bound) => {
                    return Err(DocxError::Malformed(format!(
                        "namespace prefix {prefix} is bound to {bound} in the master but to {uri} in the appended document"
                    )));
                }
                None => target.set_attr(key.as_str(), uri.as_str()),
            }
        }

        if let Some(ignorable) = source.attr("mc:Ignorable") {
            let mut prefixes: Vec<String> = target
                .attr("mc:Ignorable")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            let before = prefixes.len();
            for prefix in ignorable.split_whitespace() {
                if !prefixes.iter().any(|p| p == prefix) {
                    prefixes.push(prefix.to_string());
                }
            }
            if prefixes.len() != before {
                target.set_attr("mc:Ignorable", prefixes.join(" "));
            }
        }
        Ok(())
    }

    fn import_relationships(
        &mut self,
        fragment: &Document,
        blocks: &[Block],
    ) -> Result<HashMap<String, String>, DocxError> {
        let mut referenced = BTreeSet::new();
        for block in blocks {
            block.walk_elements(&mut |e| {
                for (key, value) in &e.attributes {
                    if is_relationship_attr(key) {
                        referenced.insert(value.clone());
                    }
                }
            });
        }

        let mut id_map = HashMap::new();
        for old_id in referenced {
            let Some(rel) = fragment.relationships().get(&old_id) else {
                continue;
            };
            let new_id = self.import_relationship(fragment, rel)?;
            id_map.insert(old_id, new_id);
        }
        Ok(id_map)
    }

    fn import_relationship(&mut self, fragment: &Document, rel: &Relationship) -> Result<String, DocxError> {
        let main_part = self.document.main_part().to_string();
        let (pkg, rels, _) = self.document.parts_mut();

        if rel.external {
            if let Some(existing) = rels
                .iter()
                .find(|r| r.external && r.rel_type == rel.rel_type && r.target == rel.target)
            {
                return Ok(existing.id.clone());
            }
            return Ok(rels.add(&rel.rel_type, &rel.target, true));
        }

        let source_name = package::resolve_target(fragment.main_part(), &rel.target);
        let data = fragment
            .package()
            .get(&source_name)
            .ok_or_else(|| DocxError::MissingPart(source_name.clone()))?
            .to_vec();

        let target_name = if pkg.get(&source_name) == Some(data.as_slice()) {
            source_name.clone()
        } else if !pkg.contains(&source_name) {
            pkg.insert(source_name.as_str(), data);
            source_name.clone()
        } else {
            let (dir, file) = source_name.rsplit_once('/').unwrap_or(("", source_name.as_str()));
            let (stem, ext) = file.rsplit_once('.').unwrap_or((file, "bin"));
            let stem = stem.trim_end_matches(|c: char| c.is_ascii_digit());
            let name = pkg.unique_part_name(dir, stem, ext);
            pkg.insert(name.as_str(), data);
            name
        };

        let source_types = ContentTypes::load(fragment.package())?;
        if let Some(content_type) = source_types.content_type_of(&source_name) {
            let mut target_types = ContentTypes::load(pkg)?;
            let ext = target_name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
            let by_default = source_types
                .default_for(source_name.rsplit_once('.').map(|(_, e)| e).unwrap_or(""))
                == Some(content_type);
            if by_default && target_types.default_for(ext).is_none_or(|ct| ct == content_type) {
                target_types.ensure_default(ext, content_type);
            } else {
                target_types.add_override(&target_name, content_type);
            }
            target_types.store(pkg)?;
        }

        let target = package::relative_target(&main_part, &target_name);
        if let Some(existing) = rels
            .iter()
            .find(|r| !r.external && r.rel_type == rel.rel_type && r.target == target)
        {
            return Ok(existing.id.clone());
        }
        Ok(rels.add(&rel.rel_type, &target, false))
    }

    /// Copy styles the master does not define, matched by `w:styleId`.
    fn merge_styles(&mut self, fragment: &Document) -> Result<(), DocxError> {
        let (Some(source_name), Some(target_name)) = (
            internal_part(fragment, REL_STYLES),
            internal_part(&self.document, REL_STYLES),
        ) else {
            return Ok(());
        };
        let source = fragment.package().part_xml(&source_name)?;
        let mut target = self.document.package().part_xml(&target_name)?;

        let known: BTreeSet<String> = target
            .root
            .child_elements()
            .filter(|e| e.is("w:style"))
            .filter_map(|e| e.attr("w:styleId").map(str::to_string))
            .collect();
        let missing: Vec<Element> = source
            .root
            .child_elements()
            .filter(|e| e.is("w:style"))
            .filter(|e| e.attr("w:styleId").is_some_and(|id| !known.contains(id)))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        debug!("carrying over {} styles", missing.len());
        target
            .root
            .children
            .extend(missing.into_iter().map(Node::Element));
        let (pkg, _, _) = self.document.parts_mut();
        pkg.set_part_xml(&target_name, &target)
    }

    /// Copy the list definitions used by `blocks` under fresh ids.
    fn merge_numbering(&mut self, fragment: &Document, blocks: &mut [Block]) -> Result<(), DocxError> {
        let mut used = BTreeSet::new();
        for block in blocks.iter() {
            block.walk_elements(&mut |e| {
                if e.is("w:numId") {
                    if let Some(v) = e.attr("w:val") {
                        used.insert(v.to_string());
                    }
                }
            });
        }
        // numId 0 switches numbering off.
        used.remove("0");
        if used.is_empty() {
            return Ok(());
        }
        let Some(source_name) = internal_part(fragment, REL_NUMBERING) else {
            return Ok(());
        };
        let source = fragment.package().part_xml(&source_name)?;

        let (target_name, mut target) = match internal_part(&self.document, REL_NUMBERING) {
            Some(name) => {
                let xml = self.document.package().part_xml(&name)?;
                (name, xml)
            }
            None => self.create_numbering_part()?,
        };

        let mut next_abstract = max_numeric_attr(&target.root, "w:abstractNum", "w:abstractNumId") + 1;
        let mut next_num = max_numeric_attr(&target.root, "w:num", "w:numId") + 1;
        let mut abstract_map: HashMap<String, u32> = HashMap::new();
        let mut num_map: HashMap<String, String> = HashMap::new();

        for old_num in &used {
            let Some(num) = source
                .root
                .child_elements()
                .find(|e| e.is("w:num") && e.attr("w:numId") == Some(old_num.as_str()))
            else {
                continue;
            };
            let mut num = num.clone();

            if let Some(old_abstract) = num
                .find_child("w:abstractNumId")
                .and_then(|a| a.attr("w:val"))
                .map(str::to_string)
            {
                let known = abstract_map.get(&old_abstract).copied();
                let new_abstract = match known {
                    Some(id) => id,
                    None => {
                        let definition = source.root.child_elements().find(|e| {
                            e.is("w:abstractNum") && e.attr("w:abstractNumId") == Some(old_abstract.as_str())
                        });
                        let Some(definition) = definition else {
                            continue;
                        };
                        let mut definition = definition.clone();
                        let id = next_abstract;
                        next_abstract += 1;
                        definition.set_attr("w:abstractNumId", id.to_string());
                        // Abstract definitions must precede every w:num.
                        let at = target
                            .root
                            .children
                            .iter()
                            .position(|n| matches!(n, Node::Element(e) if e.is("w:num")))
                            .unwrap_or(target.root.children.len());
                        target.root.children.insert(at, Node::Element(definition));
                        abstract_map.insert(old_abstract, id);
                        id
                    }
                };
                if let Some(link) = num.find_child_mut("w:abstractNumId") {
                    link.set_attr("w:val", new_abstract.to_string());
                }
            }

            let id = next_num;
            next_num += 1;
            num.set_attr("w:numId", id.to_string());
            target.root.children.push(Node::Element(num));
            num_map.insert(old_num.clone(), id.to_string());
        }

        for block in blocks.iter_mut() {
            block.walk_elements_mut(&mut |e| {
                if e.is("w:numId") {
                    let new_id = e.attr("w:val").and_then(|v| num_map.get(v)).cloned();
                    if let Some(new_id) = new_id {
                        e.set_attr("w:val", new_id);
                    }
                }
            });
        }

        let (pkg, _, _) = self.document.parts_mut();
        pkg.set_part_xml(&target_name, &target)
    }

    fn create_numbering_part(&mut self) -> Result<(String, XmlPart), DocxError> {
        let main_part = self.document.main_part().to_string();
        let dir = main_part.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        let name = if dir.is_empty() {
            "numbering.xml".to_string()
        } else {
            format!("{dir}/numbering.xml")
        };

        let (pkg, rels, _) = self.document.parts_mut();
        let mut types = ContentTypes::load(pkg)?;
        types.add_override(&name, NUMBERING_CONTENT_TYPE);
        types.store(pkg)?;
        rels.add(REL_NUMBERING, &package::relative_target(&main_part, &name), false);

        Ok((name, XmlPart::new(Element::new("w:numbering").with_attr("xmlns:w", NS_W))))
    }
}

fn internal_part(document: &Document, rel_type: &str) -> Option<String> {
    document
        .relationships()
        .iter()
        .find(|r| r.rel_type == rel_type && !r.external)
        .map(|r| package::resolve_target(document.main_part(), &r.target))
}

fn max_numeric_attr(root: &Element, element: &str, attr: &str) -> u32 {
    root.child_elements()
        .filter(|e| e.is(element))
        .filter_map(|e| e.attr(attr).and_then(|v| v.parse::<u32>().ok()))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::package::{REL_IMAGE, Package};
    use crate::docx::xml::parse_element;
    use crate::docx::{Inches, Paragraph, TextContainer};

    fn with_paragraphs(texts: &[&str]) -> Document {
        let mut doc = Document::blank().unwrap();
        for t in texts {
            doc.body_mut().push(Paragraph::with_text(t));
        }
        doc
    }

    fn rewrite_part(doc: Document, name: &str, xml: &str) -> Document {
        let mut package: Package = doc.to_package().unwrap();
        package.insert(name, xml.as_bytes().to_vec());
        Document::from_package(package).unwrap()
    }

    #[test]
    fn appended_blocks_follow_master_and_keep_section_last() {
        let mut composer = Composer::new(with_paragraphs(&["master"]));
        composer.append(with_paragraphs(&["one"])).unwrap();
        composer.append(with_paragraphs(&["two", "three"])).unwrap();

        let doc = composer.into_document();
        assert_eq!(doc.body().paragraph_texts(), vec!["master", "one", "two", "three"]);
        assert!(doc.body().section.is_some());
    }

    #[test]
    fn pictures_are_copied_with_new_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        image::RgbImage::new(3, 3).save(&path).unwrap();

        let mut master = with_paragraphs(&["master"]);
        let run = master.picture_run(&path, Inches(1.0)).unwrap();
        master.body_mut().blocks[0] = {
            let mut p = Paragraph::with_text("logo");
            p.push_run(run);
            p.into()
        };

        let mut fragment = with_paragraphs(&[]);
        let other = dir.path().join("b.png");
        image::RgbImage::new(5, 2).save(&other).unwrap();
        let run = fragment.picture_run(&other, Inches(2.0)).unwrap();
        let mut p = Paragraph::with_text("diagram");
        p.push_run(run);
        fragment.body_mut().push(p);

        let mut composer = Composer::new(master);
        composer.append(fragment).unwrap();
        let doc = composer.into_document();

        // Both fragments named their picture image1.png; the second was renamed.
        assert!(doc.package().contains("word/media/image1.png"));
        assert!(doc.package().contains("word/media/image2.png"));

        let mut embeds = Vec::new();
        let mut doc_pr_ids = Vec::new();
        for block in &doc.body().blocks {
            block.walk_elements(&mut |e| {
                if let Some(id) = e.attr("r:embed") {
                    embeds.push(id.to_string());
                }
                if e.is("wp:docPr") {
                    doc_pr_ids.push(e.attr("id").unwrap().to_string());
                }
            });
        }
        assert_eq!(embeds.len(), 2);
        assert_ne!(embeds[0], embeds[1]);
        for id in &embeds {
            let rel = doc.relationships().get(id).unwrap();
            assert_eq!(rel.rel_type, REL_IMAGE);
        }
        assert_eq!(doc_pr_ids, vec!["1", "2"]);
    }

    #[test]
    fn hyperlinks_are_registered_as_external() {
        let fragment = with_paragraphs(&[]);
        let mut package = fragment.to_package().unwrap();
        package.insert(
            "word/_rels/document.xml.rels",
            br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/></Relationships>"#.to_vec(),
        );
        let mut fragment = Document::from_package(package).unwrap();
        fragment.body_mut().push(Block::from(
            parse_element(r#"<w:p><w:hyperlink r:id="rId9"><w:r><w:t>site</w:t></w:r></w:hyperlink></w:p>"#).unwrap(),
        ));

        let mut composer = Composer::new(with_paragraphs(&["master"]));
        composer.append(fragment).unwrap();
        let doc = composer.into_document();

        let mut link_id = None;
        doc.body().blocks[1].walk_elements(&mut |e| {
            if e.is("w:hyperlink") {
                link_id = e.attr("r:id").map(str::to_string);
            }
        });
        let rel = doc.relationships().get(&link_id.unwrap()).unwrap();
        assert!(rel.external);
        assert_eq!(rel.target, "https://example.com");
    }

    #[test]
    fn missing_styles_are_carried_over() {
        let fragment = rewrite_part(
            with_paragraphs(&["styled"]),
            "word/styles.xml",
            r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Normal"/><w:style w:type="paragraph" w:styleId="Heading1"/></w:styles>"#,
        );
        let mut composer = Composer::new(with_paragraphs(&[]));
        composer.append(fragment).unwrap();
        let doc = composer.into_document();

        let styles = doc.package().part_xml("word/styles.xml").unwrap();
        let ids: Vec<&str> = styles
            .root
            .child_elements()
            .filter_map(|e| e.attr("w:styleId"))
            .collect();
        assert_eq!(ids, vec!["Normal", "Heading1"]);
    }

    #[test]
    fn list_definitions_are_renumbered() {
        let mut fragment = with_paragraphs(&[]);
        let mut package = fragment.to_package().unwrap();
        package.insert(
            "word/numbering.xml",
            br#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"/></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#.to_vec(),
        );
        package.insert(
            "word/_rels/document.xml.rels",
            br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/></Relationships>"#.to_vec(),
        );
        fragment = Document::from_package(package).unwrap();
        fragment.body_mut().push(Block::from(
            parse_element(r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>bullet</w:t></w:r></w:p>"#).unwrap(),
        ));

        let mut composer = Composer::new(with_paragraphs(&["master"]));
        composer.append(fragment).unwrap();
        let doc = composer.into_document();

        let numbering = doc.package().part_xml("word/numbering.xml").unwrap();
        let names: Vec<&str> = numbering.root.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:abstractNum", "w:num"]);
        assert!(doc.relationships().by_type(REL_NUMBERING).is_some());

        let mut num_id = None;
        doc.body().blocks[1].walk_elements(&mut |e| {
            if e.is("w:numId") {
                num_id = e.attr("w:val").map(str::to_string);
            }
        });
        assert_eq!(num_id.as_deref(), Some("1"));
        assert_eq!(doc.body().all_paragraph_texts(), vec!["master", "bullet"]);
    }

    const W14_FRAGMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml" mc:Ignorable="w14"><w:body><w:p w14:paraId="1A2B3C4D"><w:r><w:t>fresh</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;

    /// Prefixes used on element or attribute names that no ancestor declares.
    fn unbound_prefixes(xml: &str) -> Vec<String> {
        use quick_xml::events::Event;
        use quick_xml::name::ResolveResult;
        use quick_xml::reader::NsReader;

        let mut reader = NsReader::from_str(xml);
        let mut unbound = Vec::new();
        loop {
            let (ns, event) = reader.read_resolved_event().unwrap();
            if let ResolveResult::Unknown(prefix) = &ns {
                unbound.push(String::from_utf8_lossy(prefix).into_owned());
            }
            match event {
                Event::Start(e) | Event::Empty(e) => {
                    for attr in e.attributes() {
                        let attr = attr.unwrap();
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        if key.starts_with("xmlns") || key.starts_with("xml:") {
                            continue;
                        }
                        if let (ResolveResult::Unknown(prefix), _) = reader.resolve_attribute(attr.key) {
                            unbound.push(String::from_utf8_lossy(&prefix).into_owned());
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        unbound
    }

    #[test]
    fn fragment_namespaces_are_declared_on_master() {
        let fragment = rewrite_part(with_paragraphs(&[]), "word/document.xml", W14_FRAGMENT);
        let mut composer = Composer::new(with_paragraphs(&["master"]));
        composer.append(fragment).unwrap();

        let package = composer.into_document().to_package().unwrap();
        let part = package.part_xml("word/document.xml").unwrap();
        assert_eq!(
            part.root.attr("xmlns:w14"),
            Some("http://schemas.microsoft.com/office/word/2010/wordml")
        );
        assert_eq!(part.root.attr("mc:Ignorable"), Some("w14"));

        let xml = String::from_utf8(package.get("word/document.xml").unwrap().to_vec()).unwrap();
        assert!(xml.contains(r#"w14:paraId="1A2B3C4D""#));
        assert!(unbound_prefixes(&xml).is_empty());
    }

    #[test]
    fn ignorable_prefixes_are_merged_not_replaced() {
        let master = rewrite_part(
            with_paragraphs(&[]),
            "word/document.xml",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:w15="http://schemas.microsoft.com/office/word/2012/wordml" mc:Ignorable="w15"><w:body><w:sectPr/></w:body></w:document>"#,
        );
        let fragment = rewrite_part(with_paragraphs(&[]), "word/document.xml", W14_FRAGMENT);
        let mut composer = Composer::new(master);
        composer.append(fragment).unwrap();

        let root = &composer.document().root.root;
        assert_eq!(root.attr("mc:Ignorable"), Some("w15 w14"));
        assert!(root.attr("xmlns:w15").is_some());
        assert!(root.attr("xmlns:w14").is_some());
    }

    #[test]
    fn conflicting_prefix_is_rejected_and_master_untouched() {
        let fragment = rewrite_part(
            with_paragraphs(&[]),
            "word/document.xml",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:wp="urn:example:not-drawing"><w:body><w:p><w:r><w:t>odd</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#,
        );
        let mut composer = Composer::new(with_paragraphs(&["master"]));
        let err = composer.append(fragment).unwrap_err();

        assert!(matches!(err, DocxError::Malformed(ref msg) if msg.contains("wp")));
        assert_eq!(composer.document().body().paragraph_texts(), vec!["master"]);
    }

    #[test]
    fn failed_append_leaves_master_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        image::RgbImage::new(3, 3).save(&path).unwrap();

        // The picture relationship sorts before the dangling one, so its
        // media part is copied before the missing part is noticed.
        let mut fragment = with_paragraphs(&[]);
        let run = fragment.picture_run(&path, Inches(1.0)).unwrap();
        let dangling = fragment.parts_mut().1.add(REL_IMAGE, "media/gone.png", false);
        let mut p = Paragraph::with_text("diagram");
        p.push_run(run);
        fragment.body_mut().push(p);
        fragment.body_mut().push(Block::from(
            parse_element(&format!(r#"<w:p><w:r><w:object r:id="{dangling}"/></w:r></w:p>"#)).unwrap(),
        ));

        let master = with_paragraphs(&["master"]);
        let parts_before: Vec<String> = master.package().names().map(str::to_string).collect();
        let mut composer = Composer::new(master);
        let err = composer.append(fragment).unwrap_err();

        assert!(matches!(err, DocxError::MissingPart(ref name) if name == "word/media/gone.png"));
        let doc = composer.into_document();
        let parts_after: Vec<String> = doc.package().names().map(str::to_string).collect();
        assert_eq!(parts_after, parts_before);
        assert_eq!(doc.relationships().iter().count(), 1);
        assert_eq!(doc.body().paragraph_texts(), vec!["master"]);
        assert!(ContentTypes::load(doc.package()).unwrap().default_for("png").is_none());
    }
}
