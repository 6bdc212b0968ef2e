//! Typed view of `w:body`: paragraphs, runs and (nested) tables.
//!
//! Only the structure the builder edits is typed. Everything else (paragraph
//! properties, bookmarks, hyperlinks, cell properties, ...) is carried as raw
//! [`Node`]s in its original position so that a body converted back to XML
//! loses nothing.

use std::ops::ControlFlow;

use super::xml::{Element, Node};

const W_P: &str = "w:p";
const W_R: &str = "w:r";
const W_T: &str = "w:t";
const W_TBL: &str = "w:tbl";
const W_TR: &str = "w:tr";
const W_TC: &str = "w:tc";
const W_SECT_PR: &str = "w:sectPr";

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    Other(Node),
}

impl Block {
    pub fn from_node(node: Node) -> Self {
        match node {
            Node::Element(e) if e.is(W_P) => Block::Paragraph(Paragraph::from_element(e)),
            Node::Element(e) if e.is(W_TBL) => Block::Table(Table::from_element(e)),
            other => Block::Other(other),
        }
    }

    pub fn into_node(self) -> Node {
        match self {
            Block::Paragraph(p) => Node::Element(p.into_element()),
            Block::Table(t) => Node::Element(t.into_element()),
            Block::Other(node) => node,
        }
    }

    /// Every element inside this block except `w:t` text holders.
    pub fn walk_elements<'a>(&'a self, f: &mut dyn FnMut(&'a Element)) {
        match self {
            Block::Paragraph(p) => {
                for inline in &p.content {
                    match inline {
                        Inline::Run(run) => {
                            for content in &run.content {
                                if let RunContent::Other(Node::Element(e)) = content {
                                    e.walk(f);
                                }
                            }
                        }
                        Inline::Other(Node::Element(e)) => e.walk(f),
                        Inline::Other(_) => {}
                    }
                }
            }
            Block::Table(t) => {
                for content in &t.content {
                    match content {
                        TableContent::Row(row) => {
                            for rc in &row.content {
                                match rc {
                                    RowContent::Cell(cell) => {
                                        for block in &cell.blocks {
                                            block.walk_elements(f);
                                        }
                                    }
                                    RowContent::Other(Node::Element(e)) => e.walk(f),
                                    RowContent::Other(_) => {}
                                }
                            }
                        }
                        TableContent::Other(Node::Element(e)) => e.walk(f),
                        TableContent::Other(_) => {}
                    }
                }
            }
            Block::Other(Node::Element(e)) => e.walk(f),
            Block::Other(_) => {}
        }
    }

    /// Every element inside this block, for attribute rewriting.
    pub fn walk_elements_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        match self {
            Block::Paragraph(p) => {
                for inline in &mut p.content {
                    match inline {
                        Inline::Run(run) => {
                            for content in &mut run.content {
                                if let RunContent::Other(Node::Element(e)) = content {
                                    e.walk_mut(f);
                                }
                            }
                        }
                        Inline::Other(Node::Element(e)) => e.walk_mut(f),
                        Inline::Other(_) => {}
                    }
                }
            }
            Block::Table(t) => {
                for content in &mut t.content {
                    match content {
                        TableContent::Row(row) => {
                            for rc in &mut row.content {
                                match rc {
                                    RowContent::Cell(cell) => {
                                        for block in &mut cell.blocks {
                                            block.walk_elements_mut(f);
                                        }
                                    }
                                    RowContent::Other(Node::Element(e)) => e.walk_mut(f),
                                    RowContent::Other(_) => {}
                                }
                            }
                        }
                        TableContent::Other(Node::Element(e)) => e.walk_mut(f),
                        TableContent::Other(_) => {}
                    }
                }
            }
            Block::Other(Node::Element(e)) => e.walk_mut(f),
            Block::Other(_) => {}
        }
    }
}

impl From<Element> for Block {
    fn from(element: Element) -> Self {
        Block::from_node(Node::Element(element))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Run(Run),
    Other(Node),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    attributes: Vec<(String, String)>,
    pub content: Vec<Inline>,
}

impl Paragraph {
    /// A plain paragraph holding one run of text.
    pub fn with_text(text: &str) -> Self {
        Paragraph {
            attributes: Vec::new(),
            content: vec![Inline::Run(Run::with_text(text))],
        }
    }

    pub fn from_element(element: Element) -> Self {
        let content = element
            .children
            .into_iter()
            .map(|node| match node {
                Node::Element(e) if e.is(W_R) => Inline::Run(Run::from_element(e)),
                other => Inline::Other(other),
            })
            .collect();
        Paragraph {
            attributes: element.attributes,
            content,
        }
    }

    pub fn into_element(self) -> Element {
        Element {
            name: W_P.to_string(),
            attributes: self.attributes,
            children: self
                .content
                .into_iter()
                .map(|inline| match inline {
                    Inline::Run(run) => Node::Element(run.into_element()),
                    Inline::Other(node) => node,
                })
                .collect(),
        }
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.content.iter().filter_map(|i| match i {
            Inline::Run(r) => Some(r),
            Inline::Other(_) => None,
        })
    }

    pub fn runs_mut(&mut self) -> impl Iterator<Item = &mut Run> {
        self.content.iter_mut().filter_map(|i| match i {
            Inline::Run(r) => Some(r),
            Inline::Other(_) => None,
        })
    }

    pub fn text(&self) -> String {
        self.runs().map(Run::text).collect()
    }

    pub fn push_run(&mut self, run: Run) {
        self.content.push(Inline::Run(run));
    }

    /// Remove every occurrence of `token` while keeping the rest of the text.
    ///
    /// Occurrences inside a single run are cut out of that run. When the token
    /// only shows up across run boundaries, the paragraph text is collapsed
    /// into its first run.
    pub fn remove_text(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }
        let mut removed = false;
        for run in self.runs_mut() {
            let text = run.text();
            if text.contains(token) {
                run.set_text(&text.replace(token, ""));
                removed = true;
            }
        }
        if removed || !self.text().contains(token) {
            return;
        }

        let merged = self.text().replace(token, "");
        let mut runs = self.runs_mut();
        if let Some(first) = runs.next() {
            first.set_text(&merged);
        }
        for run in runs {
            run.set_text("");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunContent {
    /// A `w:t` element; the text is stored unescaped.
    Text(String),
    Other(Node),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    attributes: Vec<(String, String)>,
    pub content: Vec<RunContent>,
}

impl Run {
    pub fn with_text(text: &str) -> Self {
        Run {
            attributes: Vec::new(),
            content: vec![RunContent::Text(text.to_string())],
        }
    }

    /// A run wrapping an arbitrary child such as `w:drawing`.
    pub fn with_element(element: Element) -> Self {
        Run {
            attributes: Vec::new(),
            content: vec![RunContent::Other(Node::Element(element))],
        }
    }

    pub fn from_element(element: Element) -> Self {
        let content = element
            .children
            .into_iter()
            .map(|node| match node {
                Node::Element(e) if e.is(W_T) => RunContent::Text(e.text()),
                other => RunContent::Other(other),
            })
            .collect();
        Run {
            attributes: element.attributes,
            content,
        }
    }

    pub fn into_element(self) -> Element {
        Element {
            name: W_R.to_string(),
            attributes: self.attributes,
            children: self
                .content
                .into_iter()
                .map(|c| match c {
                    RunContent::Text(text) => Node::Element(text_element(text)),
                    RunContent::Other(node) => node,
                })
                .collect(),
        }
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                RunContent::Text(t) => Some(t.as_str()),
                RunContent::Other(_) => None,
            })
            .collect()
    }

    /// Replace the run's text, keeping its properties and non-text children.
    pub fn set_text(&mut self, text: &str) {
        let mut placed = false;
        self.content.retain_mut(|c| match c {
            RunContent::Text(t) if !placed => {
                *t = text.to_string();
                placed = true;
                true
            }
            RunContent::Text(_) => false,
            RunContent::Other(_) => true,
        });
        if !placed && !text.is_empty() {
            self.content.push(RunContent::Text(text.to_string()));
        }
    }
}

fn text_element(text: String) -> Element {
    let mut e = Element::new(W_T);
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        e.set_attr("xml:space", "preserve");
    }
    if !text.is_empty() {
        e.children.push(Node::Text(text));
    }
    e
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableContent {
    Row(Row),
    Other(Node),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    attributes: Vec<(String, String)>,
    pub content: Vec<TableContent>,
}

impl Table {
    pub fn from_element(element: Element) -> Self {
        let content = element
            .children
            .into_iter()
            .map(|node| match node {
                Node::Element(e) if e.is(W_TR) => TableContent::Row(Row::from_element(e)),
                other => TableContent::Other(other),
            })
            .collect();
        Table {
            attributes: element.attributes,
            content,
        }
    }

    pub fn into_element(self) -> Element {
        Element {
            name: W_TBL.to_string(),
            attributes: self.attributes,
            children: self
                .content
                .into_iter()
                .map(|c| match c {
                    TableContent::Row(row) => Node::Element(row.into_element()),
                    TableContent::Other(node) => node,
                })
                .collect(),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.content.iter().filter_map(|c| match c {
            TableContent::Row(r) => Some(r),
            TableContent::Other(_) => None,
        })
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.rows().flat_map(Row::cells)
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.content
            .iter_mut()
            .filter_map(|c| match c {
                TableContent::Row(r) => Some(r),
                TableContent::Other(_) => None,
            })
            .flat_map(Row::cells_mut)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowContent {
    Cell(Cell),
    Other(Node),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    attributes: Vec<(String, String)>,
    pub content: Vec<RowContent>,
}

impl Row {
    pub fn from_element(element: Element) -> Self {
        let content = element
            .children
            .into_iter()
            .map(|node| match node {
                Node::Element(e) if e.is(W_TC) => RowContent::Cell(Cell::from_element(e)),
                other => RowContent::Other(other),
            })
            .collect();
        Row {
            attributes: element.attributes,
            content,
        }
    }

    pub fn into_element(self) -> Element {
        Element {
            name: W_TR.to_string(),
            attributes: self.attributes,
            children: self
                .content
                .into_iter()
                .map(|c| match c {
                    RowContent::Cell(cell) => Node::Element(cell.into_element()),
                    RowContent::Other(node) => node,
                })
                .collect(),
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.content.iter().filter_map(|c| match c {
            RowContent::Cell(cell) => Some(cell),
            RowContent::Other(_) => None,
        })
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.content.iter_mut().filter_map(|c| match c {
            RowContent::Cell(cell) => Some(cell),
            RowContent::Other(_) => None,
        })
    }
}

/// A table cell. Its content is a block list like the body's, so cells may
/// hold further tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    attributes: Vec<(String, String)>,
    pub blocks: Vec<Block>,
}

impl Cell {
    pub fn from_element(element: Element) -> Self {
        Cell {
            attributes: element.attributes,
            blocks: element.children.into_iter().map(Block::from_node).collect(),
        }
    }

    pub fn into_element(self) -> Element {
        Element {
            name: W_TC.to_string(),
            attributes: self.attributes,
            children: self.blocks.into_iter().map(Block::into_node).collect(),
        }
    }
}

/// The document body. The trailing `w:sectPr` (page setup of the last
/// section) is kept apart from the blocks so that appended content lands
/// before it.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    attributes: Vec<(String, String)>,
    pub blocks: Vec<Block>,
    pub section: Option<Element>,
}

impl Body {
    pub fn from_element(element: Element) -> Self {
        let mut blocks: Vec<Block> = element.children.into_iter().map(Block::from_node).collect();
        let section_at = blocks.iter().rposition(
            |b| matches!(b, Block::Other(Node::Element(e)) if e.is(W_SECT_PR)),
        );
        let section = section_at.and_then(|i| match blocks.remove(i) {
            Block::Other(Node::Element(e)) => Some(e),
            _ => None,
        });
        Body {
            attributes: element.attributes,
            blocks,
            section,
        }
    }

    pub fn into_element(self) -> Element {
        let mut children: Vec<Node> = self.blocks.into_iter().map(Block::into_node).collect();
        if let Some(section) = self.section {
            children.push(Node::Element(section));
        }
        Element {
            name: "w:body".to_string(),
            attributes: self.attributes,
            children,
        }
    }

    pub fn push(&mut self, block: impl Into<Block>) {
        self.blocks.push(block.into());
    }

    /// Text of each top-level paragraph, in order; tables are skipped.
    pub fn paragraph_texts(&self) -> Vec<String> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Paragraph(p) => Some(p.text()),
                _ => None,
            })
            .collect()
    }
}

impl From<Paragraph> for Block {
    fn from(p: Paragraph) -> Self {
        Block::Paragraph(p)
    }
}

impl From<Table> for Block {
    fn from(t: Table) -> Self {
        Block::Table(t)
    }
}

/// Anything that holds a list of blocks: the body and every table cell.
///
/// The visits walk paragraphs in document order and descend into every cell
/// of every table, however deeply nested. Returning `ControlFlow::Break`
/// from the callback stops the walk.
pub trait TextContainer {
    fn blocks(&self) -> &[Block];
    fn blocks_mut(&mut self) -> &mut [Block];

    fn visit_paragraphs(&self, f: &mut dyn FnMut(&Paragraph) -> ControlFlow<()>) -> ControlFlow<()> {
        for block in self.blocks() {
            match block {
                Block::Paragraph(p) => f(p)?,
                Block::Table(t) => {
                    for cell in t.cells() {
                        cell.visit_paragraphs(f)?;
                    }
                }
                Block::Other(_) => {}
            }
        }
        ControlFlow::Continue(())
    }

    fn visit_paragraphs_mut(
        &mut self,
        f: &mut dyn FnMut(&mut Paragraph) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        for block in self.blocks_mut() {
            match block {
                Block::Paragraph(p) => f(p)?,
                Block::Table(t) => {
                    for cell in t.cells_mut() {
                        cell.visit_paragraphs_mut(f)?;
                    }
                }
                Block::Other(_) => {}
            }
        }
        ControlFlow::Continue(())
    }

    /// All paragraph texts, tables included, in document order.
    fn all_paragraph_texts(&self) -> Vec<String> {
        let mut out = Vec::new();
        let _ = self.visit_paragraphs(&mut |p| {
            out.push(p.text());
            ControlFlow::Continue(())
        });
        out
    }
}

impl TextContainer for Body {
    fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }
}

impl TextContainer for Cell {
    fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::parse_element;

    fn body(xml: &str) -> Body {
        Body::from_element(parse_element(xml).unwrap())
    }

    #[test]
    fn section_properties_are_split_from_blocks() {
        let b = body(
            r#"<w:body><w:p><w:r><w:t>One</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="11906"/></w:sectPr></w:body>"#,
        );
        assert_eq!(b.blocks.len(), 1);
        assert!(b.section.is_some());

        let element = b.into_element();
        assert!(element.child_elements().last().unwrap().is("w:sectPr"));
    }

    #[test]
    fn run_text_joins_text_children_and_keeps_properties() {
        let mut b = body(
            r#"<w:body><w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Hello </w:t><w:t>World</w:t></w:r></w:p></w:body>"#,
        );
        let Block::Paragraph(p) = &mut b.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "Hello World");

        let run = p.runs_mut().next().unwrap();
        run.set_text("Bye");
        assert_eq!(run.text(), "Bye");
        assert!(matches!(run.content[0], RunContent::Other(_)));
        assert_eq!(run.content.len(), 2);
    }

    #[test]
    fn leading_space_is_written_with_preserve() {
        let e = Run::with_text(" padded").into_element();
        let t = e.find_child("w:t").unwrap();
        assert_eq!(t.attr("xml:space"), Some("preserve"));
    }

    #[test]
    fn visit_descends_into_nested_tables() {
        let b = body(
            r#"<w:body>
<w:p><w:r><w:t>top</w:t></w:r></w:p>
<w:tbl><w:tblPr/><w:tr><w:tc><w:tcPr/>
  <w:p><w:r><w:t>outer cell</w:t></w:r></w:p>
  <w:tbl><w:tr><w:tc><w:p><w:r><w:t>inner cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
</w:tc></w:tr></w:tbl>
<w:p><w:r><w:t>bottom</w:t></w:r></w:p>
</w:body>"#,
        );
        assert_eq!(
            b.all_paragraph_texts(),
            vec!["top", "outer cell", "inner cell", "bottom"]
        );
    }

    #[test]
    fn visit_stops_on_break() {
        let b = body(
            r#"<w:body><w:p><w:r><w:t>a</w:t></w:r></w:p><w:p><w:r><w:t>b</w:t></w:r></w:p></w:body>"#,
        );
        let mut seen = Vec::new();
        let flow = b.visit_paragraphs(&mut |p| {
            seen.push(p.text());
            ControlFlow::Break(())
        });
        assert!(flow.is_break());
        assert_eq!(seen, vec!["a"]);
    }

    #[test]
    fn remove_text_handles_split_tokens() {
        let mut p = Paragraph::from_element(
            parse_element(r#"<w:p><w:r><w:t>See &lt;&lt;Des</w:t></w:r><w:r><w:t>ign&gt;&gt; here</w:t></w:r></w:p>"#)
                .unwrap(),
        );
        p.remove_text("<<Design>>");
        assert_eq!(p.text(), "See  here");
    }

    #[test]
    fn conversion_round_trip_is_lossless() {
        let xml = r#"<w:body><w:p w14:paraId="1"><w:pPr><w:jc w:val="center"/></w:pPr><w:bookmarkStart w:id="0"/><w:r><w:t>x</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl></w:body>"#;
        let original = parse_element(xml).unwrap();
        assert_eq!(Body::from_element(original.clone()).into_element(), original);
    }
}
