//! Source documents and the edit script applied to them.
//!
//! A document keeps its original text as an immutable snapshot. Every edit
//! targets a statement of the original parse and is stored as a splice on
//! the text it was applied to; undoing the most recent edit discards it and
//! recomputes the current text from the snapshot by replaying the rest.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use tree_sitter::{InputEdit, Parser, Point, Tree};

use crate::copy_tree::SourceFile;
use crate::error::{RepairError, Result};
use crate::parser::{self, StatementInfo};
use crate::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(pub usize);

/// Identity of one statement node: the document and its position in that
/// document's statement table. Never compared by text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatementRef {
    pub doc: DocId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditId(pub u64);

/// Donor material, copied from the donor document's original snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Donor {
    pub text: String,
    /// Leading whitespace of the donor's first line.
    pub indent: String,
    /// Continuation lines (1-based) inside a string or comment, copied as is.
    pub literal_lines: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    InsertBefore(Donor),
    Replace(Donor),
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub target: usize,
    pub op: EditOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The target's parent is not a statement list.
    NotInBlock,
    /// An earlier active edit already removed or overwrote the target.
    TargetRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied(EditId),
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
struct Splice {
    start: usize,
    end: usize,
    text: String,
}

struct AppliedEdit {
    id: EditId,
    splice: Splice,
}

pub struct SourceDocument {
    path: Utf8PathBuf,
    package: String,
    language: Language,
    original: String,
    current: String,
    parser: Parser,
    tree: Tree,
    original_tree: Tree,
    statements: Vec<StatementInfo>,
    edits: Vec<AppliedEdit>,
    next_edit: u64,
    revision: u64,
}

impl SourceDocument {
    pub fn parse(
        path: impl Into<Utf8PathBuf>,
        package: impl Into<String>,
        language: Language,
        text: impl Into<String>,
    ) -> Result<Self> {
        let path = path.into();
        let original = text.into();
        let mut parser = parser::new_parser(language)?;
        let tree = parser.parse(&original, None).ok_or_else(|| RepairError::Parse {
            path: path.clone().into(),
        })?;
        let statements = parser::index_statements(&tree, &original, language.profile());

        Ok(Self {
            path,
            package: package.into(),
            language,
            current: original.clone(),
            original,
            parser,
            original_tree: tree.clone(),
            tree,
            statements,
            edits: Vec::new(),
            next_edit: 0,
            revision: 0,
        })
    }

    pub fn load(file: &SourceFile) -> Result<Self> {
        let text = std::fs::read_to_string(&file.path)
            .map_err(|e| RepairError::io(file.path.as_std_path(), e))?;
        Self::parse(file.path.clone(), file.package.clone(), file.language, text)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn statements(&self) -> &[StatementInfo] {
        &self.statements
    }

    pub fn statement(&self, index: usize) -> Option<&StatementInfo> {
        self.statements.get(index)
    }

    /// Text of a statement in the original snapshot.
    pub fn statement_text(&self, index: usize) -> Option<&str> {
        let info = self.statements.get(index)?;
        Some(&self.original[info.start_byte..info.end_byte])
    }

    pub fn is_modified(&self) -> bool {
        self.current != self.original
    }

    pub fn active_edits(&self) -> usize {
        self.edits.len()
    }

    /// Bumped on every change of the current text.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn has_syntax_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Where an original statement sits in the current text, if it survived
    /// the active edits.
    pub fn current_span(&self, index: usize) -> Option<(usize, usize)> {
        let info = self.statements.get(index)?;
        map_span(
            (info.start_byte, info.end_byte),
            self.edits.iter().map(|e| &e.splice),
        )
    }

    pub fn apply(&mut self, edit: Edit) -> Result<EditOutcome> {
        let info = self
            .statements
            .get(edit.target)
            .ok_or_else(|| RepairError::UnknownStatement {
                document: self.path.to_string(),
                index: edit.target,
            })?;
        let Some((start, mut end)) = self.current_span(edit.target) else {
            return Ok(EditOutcome::Skipped(SkipReason::TargetRemoved));
        };
        // Statements never end in whitespace.
        while end > start && self.current.as_bytes()[end - 1].is_ascii_whitespace() {
            end -= 1;
        }

        let profile = self.language.profile();
        let (in_block, siblings) = match parser::find_statement_node(&self.tree, start, end, profile)
            .and_then(|node| node.parent())
        {
            Some(parent) => (profile.is_block(parent.kind()), parser::statement_children(parent)),
            // The current tree no longer recognises the node; trust the original parse.
            None => (profile.is_block(info.parent_kind), usize::MAX),
        };
        if !in_block {
            return Ok(EditOutcome::Skipped(SkipReason::NotInBlock));
        }

        let indent = line_indent(&self.current, start);
        let shares_line = !self.current[line_start(&self.current, start)..start]
            .trim()
            .is_empty();
        let splice = match &edit.op {
            // Stay on the target's line so the donor lands in the same block.
            EditOp::InsertBefore(donor) if shares_line => Splice {
                start,
                end: start,
                text: format!("{}{}", rebase(donor, &indent), profile.separator),
            },
            EditOp::InsertBefore(donor) => Splice {
                start,
                end: start,
                text: format!("{}\n{}", rebase(donor, &indent), indent),
            },
            EditOp::Replace(donor) => Splice {
                start,
                end,
                text: rebase(donor, &indent),
            },
            EditOp::Delete => match profile.placeholder {
                Some(placeholder) if siblings <= 1 => Splice {
                    start,
                    end,
                    text: placeholder.to_string(),
                },
                _ => deletion_splice(&self.current, start, end),
            },
        };

        let id = EditId(self.next_edit);
        self.next_edit += 1;

        let start_position = point_at(&self.current, splice.start);
        let old_end_position = point_at(&self.current, splice.end);
        self.current
            .replace_range(splice.start..splice.end, &splice.text);
        let new_end_byte = splice.start + splice.text.len();
        let input_edit = InputEdit {
            start_byte: splice.start,
            old_end_byte: splice.end,
            new_end_byte,
            start_position,
            old_end_position,
            new_end_position: point_at(&self.current, new_end_byte),
        };
        self.edits.push(AppliedEdit { id, splice });
        self.revision += 1;

        self.tree.edit(&input_edit);
        match self.parser.parse(&self.current, Some(&self.tree)) {
            Some(tree) => self.tree = tree,
            None => {
                self.edits.pop();
                self.rebuild()?;
                return Err(RepairError::Parse {
                    path: self.path.clone().into(),
                });
            }
        }
        Ok(EditOutcome::Applied(id))
    }

    /// Undo the most recent edit. Any other edit id is rejected.
    pub fn undo(&mut self, id: EditId) -> Result<()> {
        match self.edits.last() {
            Some(last) if last.id == id => {}
            _ => {
                return Err(RepairError::UndoOutOfOrder {
                    edit: id.0,
                    path: self.path.to_string(),
                });
            }
        }
        self.edits.pop();
        self.rebuild()
    }

    fn rebuild(&mut self) -> Result<()> {
        let mut text = self.original.clone();
        for edit in &self.edits {
            text.replace_range(edit.splice.start..edit.splice.end, &edit.splice.text);
        }
        self.current = text;
        self.revision += 1;
        self.tree = self
            .parser
            .parse(&self.current, None)
            .ok_or_else(|| RepairError::Parse {
                path: self.path.clone().into(),
            })?;
        Ok(())
    }

    pub fn diff(&self) -> String {
        generate_diff(self.path.as_str(), &self.original, &self.current)
    }
}

/// Every document of one repair session.
#[derive(Default)]
pub struct DocumentSet {
    documents: Vec<SourceDocument>,
}

impl DocumentSet {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self { documents }
    }

    pub fn load(files: &[SourceFile]) -> Result<Self> {
        let documents = files
            .iter()
            .map(SourceDocument::load)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(documents))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &SourceDocument)> {
        self.documents
            .iter()
            .enumerate()
            .map(|(i, doc)| (DocId(i), doc))
    }

    pub fn get(&self, id: DocId) -> Option<&SourceDocument> {
        self.documents.get(id.0)
    }

    pub fn document(&self, id: DocId) -> Result<&SourceDocument> {
        self.documents.get(id.0).ok_or_else(|| unknown_document(id))
    }

    pub fn document_mut(&mut self, id: DocId) -> Result<&mut SourceDocument> {
        self.documents.get_mut(id.0).ok_or_else(|| unknown_document(id))
    }

    /// All statements of all documents, in document then source order.
    pub fn statements(&self) -> impl Iterator<Item = (StatementRef, &StatementInfo)> {
        self.iter().flat_map(|(doc, document)| {
            document
                .statements()
                .iter()
                .enumerate()
                .map(move |(index, info)| (StatementRef { doc, index }, info))
        })
    }

    pub fn statement(&self, statement: StatementRef) -> Result<&StatementInfo> {
        self.document(statement.doc)?
            .statement(statement.index)
            .ok_or_else(|| self.unknown_statement(statement))
    }

    pub fn statement_text(&self, statement: StatementRef) -> Result<&str> {
        self.document(statement.doc)?
            .statement_text(statement.index)
            .ok_or_else(|| self.unknown_statement(statement))
    }

    /// `path:line` of a statement.
    pub fn location(&self, statement: StatementRef) -> Result<String> {
        let info = self.statement(statement)?;
        let document = self.document(statement.doc)?;
        Ok(format!("{}:{}", document.path(), info.line))
    }

    /// Deep copy of a statement, taken from the original snapshot.
    pub fn donor(&self, statement: StatementRef) -> Result<Donor> {
        let document = self.document(statement.doc)?;
        let info = self.statement(statement)?;
        Ok(Donor {
            text: document.original()[info.start_byte..info.end_byte].to_string(),
            indent: line_indent(document.original(), info.start_byte),
            literal_lines: parser::literal_lines(
                &document.original_tree,
                document.original(),
                info.start_byte,
                info.end_byte,
                document.language().profile(),
            ),
        })
    }

    pub fn apply(&mut self, target: StatementRef, op: EditOp) -> Result<EditOutcome> {
        self.document_mut(target.doc)?.apply(Edit {
            target: target.index,
            op,
        })
    }

    pub fn undo(&mut self, doc: DocId, id: EditId) -> Result<()> {
        self.document_mut(doc)?.undo(id)
    }

    /// True when every document's current text equals its original.
    pub fn is_pristine(&self) -> bool {
        self.documents
            .iter()
            .all(|doc| doc.active_edits() == 0 && !doc.is_modified())
    }

    pub fn diff(&self) -> String {
        self.documents
            .iter()
            .filter(|doc| doc.is_modified())
            .map(SourceDocument::diff)
            .collect()
    }

    fn unknown_statement(&self, statement: StatementRef) -> RepairError {
        RepairError::UnknownStatement {
            document: self
                .get(statement.doc)
                .map(|doc| doc.path().to_string())
                .unwrap_or_else(|| format!("#{}", statement.doc.0)),
            index: statement.index,
        }
    }
}

fn unknown_document(id: DocId) -> RepairError {
    RepairError::UnknownStatement {
        document: format!("#{}", id.0),
        index: 0,
    }
}

/// Map a span of the original text through a sequence of splices.
/// Returns `None` once the span has been removed or overwritten.
fn map_span<'a>(
    span: (usize, usize),
    splices: impl Iterator<Item = &'a Splice>,
) -> Option<(usize, usize)> {
    let (mut s, mut e) = span;
    for splice in splices {
        let (a, b, len) = (splice.start, splice.end, splice.text.len());
        if a == b {
            if s >= a {
                s += len;
                e += len;
            } else if e > a {
                e += len;
            }
            continue;
        }
        if e <= a {
            continue;
        }
        if s >= b {
            s = s - (b - a) + len;
            e = e - (b - a) + len;
            continue;
        }
        if s >= a && e <= b {
            return None;
        }
        // Partial overlap: an enclosing statement keeps its outer bounds.
        let new_s = if s < a { s } else { a + len };
        let new_e = if e > b { e - (b - a) + len } else { a + len };
        s = new_s;
        e = new_e;
    }
    Some((s, e))
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Leading whitespace of the line containing `pos`.
fn line_indent(text: &str, pos: usize) -> String {
    text[line_start(text, pos)..pos]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

/// Re-indent donor text so its continuation lines sit at the target's depth.
/// Lines inside literals, and lines shallower than the donor, are kept as is.
fn rebase(donor: &Donor, indent: &str) -> String {
    let mut lines = donor.text.split('\n');
    let mut out = lines.next().unwrap_or_default().to_string();
    for (i, line) in lines.enumerate() {
        out.push('\n');
        if donor.literal_lines.contains(&(i + 1)) {
            out.push_str(line);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        match line.strip_prefix(donor.indent.as_str()) {
            Some(body) => {
                out.push_str(indent);
                out.push_str(body);
            }
            None => out.push_str(line),
        }
    }
    out
}

/// Remove a statement, taking its whole line(s) when nothing else shares them.
/// The line goes with the newline before it, so a block's last child never
/// takes the newline that ends the enclosing statement.
fn deletion_splice(text: &str, start: usize, end: usize) -> Splice {
    let ls = line_start(text, start);
    let le = text[end..].find('\n').map(|i| end + i).unwrap_or(text.len());
    let alone = text[ls..start].trim().is_empty() && text[end..le].trim().is_empty();
    let (start, end) = if !alone {
        (start, end)
    } else if ls > 0 {
        (ls - 1, le)
    } else if le < text.len() {
        (ls, le + 1)
    } else {
        (ls, le)
    };
    Splice {
        start,
        end,
        text: String::new(),
    }
}

fn point_at(text: &str, byte: usize) -> Point {
    let before = &text[..byte];
    let row = before.matches('\n').count();
    let column = byte - line_start(text, byte);
    Point::new(row, column)
}

pub fn generate_diff(path: &str, original: &str, mutated: &str) -> String {
    TextDiff::from_lines(original, mutated)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splice(start: usize, end: usize, text: &str) -> Splice {
        Splice {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn map_span_shifts_spans_after_a_splice() {
        let s = splice(0, 4, "ab");
        assert_eq!(map_span((10, 14), [&s].into_iter()), Some((8, 12)));
    }

    #[test]
    fn map_span_drops_overwritten_spans() {
        let s = splice(10, 20, "x");
        assert_eq!(map_span((10, 20), [&s].into_iter()), None);
        assert_eq!(map_span((12, 15), [&s].into_iter()), None);
    }

    #[test]
    fn map_span_grows_enclosing_spans() {
        let s = splice(10, 20, "abc");
        assert_eq!(map_span((5, 30), [&s].into_iter()), Some((5, 23)));
    }

    #[test]
    fn map_span_insertion_shifts_target_and_grows_parent() {
        let s = splice(10, 10, "new();\n");
        assert_eq!(map_span((10, 16), [&s].into_iter()), Some((17, 23)));
        assert_eq!(map_span((0, 16), [&s].into_iter()), Some((0, 23)));
        assert_eq!(map_span((0, 10), [&s].into_iter()), Some((0, 10)));
    }

    #[test]
    fn rebase_reindents_continuation_lines() {
        let donor = Donor {
            text: "if x:\n        y = 1\n        z = 2".to_string(),
            indent: "    ".to_string(),
            literal_lines: Vec::new(),
        };
        assert_eq!(rebase(&donor, "  "), "if x:\n      y = 1\n      z = 2");
    }

    #[test]
    fn rebase_copies_literal_and_shallow_lines_unchanged() {
        let donor = Donor {
            text: "s = f(\"\"\"a\n  b\"\"\",\n  c)".to_string(),
            indent: "    ".to_string(),
            literal_lines: vec![1],
        };
        assert_eq!(rebase(&donor, "        "), "s = f(\"\"\"a\n  b\"\"\",\n  c)");
    }

    #[test]
    fn deletion_takes_whole_line_when_alone() {
        let text = "a = 1\n    b = 2\nc = 3\n";
        let s = deletion_splice(text, 10, 15);
        assert_eq!((s.start, s.end), (5, 15));
    }

    #[test]
    fn deletion_of_first_line_takes_trailing_newline() {
        let text = "a = 1\nb = 2\n";
        let s = deletion_splice(text, 0, 5);
        assert_eq!((s.start, s.end), (0, 6));
    }

    #[test]
    fn deletion_keeps_line_when_shared() {
        let text = "a(); b();\n";
        let s = deletion_splice(text, 5, 9);
        assert_eq!((s.start, s.end), (5, 9));
    }

    #[test]
    fn point_at_counts_rows_and_columns() {
        let text = "ab\ncde\nf";
        assert_eq!(point_at(text, 5), Point::new(1, 2));
        assert_eq!(point_at(text, 0), Point::new(0, 0));
    }
}
