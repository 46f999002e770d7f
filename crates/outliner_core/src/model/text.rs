//! Styled text: ordered runs of text tagged with registry styles.
//!
//! # Invariants
//! - Runs are never empty and adjacent runs never share a style.
//! - Paragraph breaks are `\n` inside run text.
//! - A paragraph break belongs to the run before it; only the first run may
//!   start with `\n`.

use crate::codec::CodecResult;
use crate::style::{StyleId, StyleRegistry};
use crate::xml::XmlElement;
use log::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub style: StyleId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledText {
    runs: Vec<TextRun>,
}

impl StyledText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-run text in `style`.
    pub fn plain(text: impl Into<String>, style: StyleId) -> Self {
        let mut styled = Self::new();
        styled.push(text, style);
        styled
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Appends text, merging into the last run when styles match.
    ///
    /// Leading paragraph breaks join the previous run so the OO3 paragraph
    /// layout reads back into the same runs.
    pub fn push(&mut self, text: impl Into<String>, style: StyleId) {
        let mut text = text.into();
        if let Some(last) = self.runs.last_mut() {
            if last.style != style {
                let breaks = text.len() - text.trim_start_matches('\n').len();
                last.text.extend(text.drain(..breaks));
            }
        }
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => self.runs.push(TextRun { text, style }),
        }
    }

    /// Text without style information.
    pub fn string(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// Parses `<text><p><run>…</run></p></text>`; run styles cascade from `base`.
    ///
    /// # Errors
    /// - Returns `CodecError` for duplicate `<style>`/`<lit>` children or
    ///   unresolved named-style references.
    pub fn from_oo3_xml(
        element: &XmlElement,
        registry: &mut StyleRegistry,
        base: StyleId,
    ) -> CodecResult<Self> {
        let mut text = Self::new();
        let mut last_style = None;
        for (index, paragraph) in element.elements_named("p").enumerate() {
            if index > 0 {
                text.push("\n", last_style.unwrap_or(base));
            }
            for child in paragraph.child_elements() {
                if child.name() != "run" {
                    warn!(
                        "event=text_element_skipped module=model status=skipped element={}",
                        child.name()
                    );
                    continue;
                }
                let style = registry.run_style_for_oo3_xml(child.element_for_name("style")?, base)?;
                let literal = child
                    .element_for_name("lit")?
                    .map(XmlElement::text)
                    .unwrap_or_default();
                last_style = Some(style);
                text.push(literal, style);
            }
        }
        Ok(text)
    }

    /// Writes `<text>`; run styles equal to `base` carry no `<style>`.
    ///
    /// A styled first run that opens with a paragraph break is preceded by an
    /// empty run so the break keeps its style.
    pub fn to_oo3_xml(&self, registry: &StyleRegistry, base: StyleId) -> XmlElement {
        let mut element = XmlElement::new("text");
        let Some(first) = self.runs.first() else {
            return element;
        };

        let mut paragraph = XmlElement::new("p");
        if first.text.starts_with('\n') && first.style != base {
            paragraph.push_child(run_element(registry, first.style, base, ""));
        }
        for run in &self.runs {
            let mut pieces = run.text.split('\n').peekable();
            while let Some(piece) = pieces.next() {
                if !piece.is_empty() {
                    paragraph.push_child(run_element(registry, run.style, base, piece));
                }
                if pieces.peek().is_some() {
                    element.push_child(std::mem::replace(&mut paragraph, XmlElement::new("p")));
                }
            }
        }
        element.push_child(paragraph);
        element
    }
}

fn run_element(
    registry: &StyleRegistry,
    style: StyleId,
    base: StyleId,
    literal: &str,
) -> XmlElement {
    let mut node = XmlElement::new("run");
    if let Some(style) = registry.style_to_oo3_xml_relative_to(style, base) {
        node.push_child(style);
    }
    let mut lit = XmlElement::new("lit");
    if !literal.is_empty() {
        lit.push_cdata(literal);
    }
    node.push_child(lit);
    node
}
