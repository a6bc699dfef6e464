//! Partitioning of statement lines into titled sections.

use std::{collections::HashSet, ops::Range};

use itertools::Itertools;
use tracing::debug;

use super::SectionKind;

/// Half-open `[start, end)` line range of one section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub start: usize,
    pub end: usize,
}

impl Section {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Lines of the section, title line included.
    pub fn lines<'a, S>(&self, lines: &'a [S]) -> &'a [S] {
        &lines[self.range()]
    }
}

/// Sections found in a document, in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sections(Vec<Section>);

impl Sections {
    pub fn get(&self, kind: SectionKind) -> Option<&Section> {
        self.0.iter().find(|s| s.kind == kind)
    }

    pub fn contains(&self, kind: SectionKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Sections {
    type Item = Section;
    type IntoIter = std::vec::IntoIter<Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Splits statement lines on section titles.
///
/// Each title splits at most once: the first line containing a not yet seen
/// title starts its section and closes the previous one. Later lines with
/// the same title stay inside whatever section is current.
#[derive(Clone, Copy, Debug, Default)]
pub struct SectionSplitter {
    anchored: bool,
}

impl SectionSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// With `anchored`, a title only matches at the start of the
    /// whitespace-trimmed line instead of anywhere in it. Keeps page headers
    /// and footers quoting a title from splitting the document.
    pub fn anchored(mut self, anchored: bool) -> Self {
        self.anchored = anchored;
        self
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Returns contiguous sections covering all lines. A preamble without
    /// lines is omitted.
    pub fn split<S: AsRef<str>>(&self, lines: &[S]) -> Sections {
        let mut seen = HashSet::new();
        let mut starts = vec![(SectionKind::Preamble, 0)];

        for (idx, line) in lines.iter().enumerate() {
            let line = line.as_ref();
            let found = SectionKind::TITLED
                .into_iter()
                .filter(|kind| !seen.contains(kind))
                .find(|kind| self.matches(line, *kind));
            if let Some(kind) = found {
                debug!(section = %kind, line = idx, "section title");
                seen.insert(kind);
                starts.push((kind, idx));
            }
        }
        starts.push((SectionKind::Preamble, lines.len()));

        let sections = starts
            .into_iter()
            .tuple_windows()
            .map(|((kind, start), (_, end))| Section { kind, start, end })
            .filter(|s| !(s.kind == SectionKind::Preamble && s.is_empty()))
            .collect();
        Sections(sections)
    }

    fn matches(&self, line: &str, kind: SectionKind) -> bool {
        let Some(title) = kind.title() else {
            return false;
        };
        if self.anchored {
            line.trim_start().starts_with(title)
        } else {
            line.contains(title)
        }
    }
}
