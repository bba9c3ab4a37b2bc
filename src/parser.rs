use tree_sitter::{Node, Parser, Tree};

use crate::error::{RepairError, Result};
use crate::Language;

/// Grammar-specific node tables. Everything the indexer, the editor and the
/// scope checker need to know about a language lives here.
pub struct LanguageProfile {
    /// Executable statement kinds that enter the statement pools.
    pub statement_kinds: &'static [&'static str],
    /// Containers whose children are an ordered statement list.
    pub block_kinds: &'static [&'static str],
    /// Class-like declarations as (kind, field holding the name).
    pub class_kinds: &'static [(&'static str, &'static str)],
    /// Nodes that open a lexical scope for name resolution.
    pub scope_kinds: &'static [&'static str],
    /// Positions that declare names, as (kind, field). `None` means the whole node.
    pub binding_fields: &'static [(&'static str, Option<&'static str>)],
    /// Node kinds that are plain name references.
    pub reference_kinds: &'static [&'static str],
    /// Positions where an identifier is a member or label, not a reference.
    pub non_reference_fields: &'static [(&'static str, &'static str)],
    /// Subtrees the scope checker does not look into.
    pub opaque_kinds: &'static [&'static str],
    pub builtins: &'static [&'static str],
    /// Statement that keeps a block syntactically valid once emptied.
    pub placeholder: Option<&'static str>,
    /// Joins a donor to a target that shares its line with other code.
    pub separator: &'static str,
    /// Nodes whose text may span lines and must never be re-indented.
    pub literal_kinds: &'static [&'static str],
}

impl LanguageProfile {
    pub fn is_statement(&self, kind: &str) -> bool {
        self.statement_kinds.contains(&kind)
    }

    pub fn is_block(&self, kind: &str) -> bool {
        self.block_kinds.contains(&kind)
    }

    pub fn is_scope(&self, kind: &str) -> bool {
        self.scope_kinds.contains(&kind)
    }
}

pub static PYTHON: LanguageProfile = LanguageProfile {
    statement_kinds: &[
        "expression_statement",
        "return_statement",
        "assert_statement",
        "pass_statement",
        "delete_statement",
        "raise_statement",
        "break_statement",
        "continue_statement",
        "if_statement",
        "for_statement",
        "while_statement",
        "try_statement",
        "with_statement",
    ],
    block_kinds: &["block", "module"],
    class_kinds: &[("class_definition", "name")],
    scope_kinds: &["module", "function_definition", "lambda", "class_definition"],
    binding_fields: &[
        ("assignment", Some("left")),
        ("for_statement", Some("left")),
        ("for_in_clause", Some("left")),
        ("function_definition", Some("name")),
        ("function_definition", Some("parameters")),
        ("class_definition", Some("name")),
        ("lambda", Some("parameters")),
        ("import_statement", None),
        ("import_from_statement", Some("name")),
        ("aliased_import", Some("alias")),
        ("as_pattern", Some("alias")),
        ("named_expression", Some("name")),
        ("global_statement", None),
        ("nonlocal_statement", None),
    ],
    reference_kinds: &["identifier"],
    non_reference_fields: &[
        ("attribute", "attribute"),
        ("keyword_argument", "name"),
        ("import_from_statement", "module_name"),
    ],
    opaque_kinds: &["comment", "string_content", "dotted_name"],
    builtins: &[
        "print", "len", "range", "str", "int", "float", "bool", "bytes", "list", "dict",
        "set", "frozenset", "tuple", "object", "type", "super", "isinstance", "issubclass",
        "open", "min", "max", "sum", "abs", "round", "sorted", "reversed", "enumerate",
        "zip", "map", "filter", "any", "all", "iter", "next", "getattr", "setattr",
        "hasattr", "delattr", "repr", "hash", "id", "input", "divmod", "pow", "chr", "ord",
        "format", "vars", "dir", "callable", "property", "staticmethod", "classmethod",
        "NotImplemented", "Ellipsis", "__name__", "__file__", "Exception", "BaseException",
        "ValueError", "TypeError", "KeyError", "IndexError", "AttributeError",
        "RuntimeError", "StopIteration", "AssertionError", "NotImplementedError",
        "ZeroDivisionError", "OSError", "IOError", "FileNotFoundError", "ImportError",
    ],
    placeholder: Some("pass"),
    separator: "; ",
    literal_kinds: &["string"],
};

/// One executable statement of a document's original parse.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementInfo {
    pub kind: &'static str,
    pub start_byte: usize,
    pub end_byte: usize,
    /// 1-based.
    pub line: usize,
    pub column: usize,
    pub type_name: String,
    pub parent_kind: &'static str,
}

pub fn new_parser(language: Language) -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.grammar())
        .map_err(|e| RepairError::Setup(format!("failed to load {} grammar: {e}", language.name())))?;
    Ok(parser)
}

/// Collect every statement node (nested ones included) in source order.
pub fn index_statements(tree: &Tree, source: &str, profile: &LanguageProfile) -> Vec<StatementInfo> {
    let mut statements = Vec::new();
    let mut types = Vec::new();
    walk_statements(tree.root_node(), source, profile, &mut types, &mut statements);
    statements
}

fn walk_statements(
    node: Node,
    source: &str,
    profile: &LanguageProfile,
    types: &mut Vec<String>,
    statements: &mut Vec<StatementInfo>,
) {
    let class_name = class_name(node, source, profile);
    if let Some(name) = &class_name {
        types.push(name.clone());
    }

    if profile.is_statement(node.kind()) {
        statements.push(StatementInfo {
            kind: node.kind(),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            line: node.start_position().row + 1,
            column: node.start_position().column,
            type_name: types.last().cloned().unwrap_or_default(),
            parent_kind: node.parent().map(|p| p.kind()).unwrap_or(""),
        });
    }

    let count = node.child_count();
    for i in 0..count {
        if let Some(child) = node.child(i) {
            walk_statements(child, source, profile, types, statements);
        }
    }

    if class_name.is_some() {
        types.pop();
    }
}

fn class_name(node: Node, source: &str, profile: &LanguageProfile) -> Option<String> {
    let (_, field) = profile
        .class_kinds
        .iter()
        .find(|(kind, _)| *kind == node.kind())?;
    let name = node.child_by_field_name(field)?;
    Some(node_text(name, source).to_string())
}

/// Locate the statement node that spans exactly `start..end`, preferring the
/// outermost node with that range.
pub fn find_statement_node<'a>(
    tree: &'a Tree,
    start: usize,
    end: usize,
    profile: &LanguageProfile,
) -> Option<Node<'a>> {
    let mut node = tree.root_node().descendant_for_byte_range(start, end)?;
    let mut found = profile.is_statement(node.kind()).then_some(node);
    while let Some(parent) = node.parent() {
        if parent.start_byte() != start || parent.end_byte() != end {
            break;
        }
        if profile.is_statement(parent.kind()) {
            found = Some(parent);
        }
        node = parent;
    }
    found
}

/// Continuation lines of `start..end` that begin inside a string or comment,
/// numbered from 1 for the line after the one holding `start`.
pub fn literal_lines(
    tree: &Tree,
    source: &str,
    start: usize,
    end: usize,
    profile: &LanguageProfile,
) -> Vec<usize> {
    let root = tree.root_node();
    source[start..end]
        .match_indices('\n')
        .enumerate()
        .filter_map(|(i, (offset, _))| {
            let pos = start + offset + 1;
            let mut node = root.descendant_for_byte_range(pos, pos);
            while let Some(n) = node {
                if n.start_byte() < pos && profile.literal_kinds.contains(&n.kind()) {
                    return Some(i + 1);
                }
                node = n.parent();
            }
            None
        })
        .collect()
}

/// Named, non-comment children of a block.
pub fn statement_children(block: Node) -> usize {
    let mut cursor = block.walk();
    block
        .named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .count()
}

pub fn node_text<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}
