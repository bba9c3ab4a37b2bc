//! Name-binding check run on every mutated document.
//!
//! The check is diagnostic: the search controller logs the report and only
//! rejects on it when scope gating is switched on.

use std::collections::{HashMap, HashSet};

use tree_sitter::{Node, Tree};

use crate::document::SourceDocument;
use crate::error::{RepairError, Result};
use crate::parser::{self, node_text, LanguageProfile};
use crate::Language;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedName {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeReport {
    pub unresolved: Vec<UnresolvedName>,
    /// False when the text did not parse cleanly.
    pub well_formed: bool,
}

impl ScopeReport {
    pub fn in_scope(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Re-parse text and report every name reference without a binding.
pub trait BindingResolver {
    fn resolve_bindings(&self, language: Language, text: &str) -> Result<ScopeReport>;
}

/// Resolves names against declarations in the enclosing lexical scopes
/// (module, class, function, closure) plus the language builtins.
/// Flow-insensitive: a name declared anywhere in a scope counts for the
/// whole scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalResolver;

impl BindingResolver for LexicalResolver {
    fn resolve_bindings(&self, language: Language, text: &str) -> Result<ScopeReport> {
        let mut parser = parser::new_parser(language)?;
        let tree = parser
            .parse(text, None)
            .ok_or_else(|| RepairError::Collaborator(format!("{} parser gave no tree", language.name())))?;
        Ok(resolve(&tree, text, language.profile()))
    }
}

pub struct ScopeValidator {
    resolver: Box<dyn BindingResolver>,
}

impl Default for ScopeValidator {
    fn default() -> Self {
        Self::new(LexicalResolver)
    }
}

impl ScopeValidator {
    pub fn new(resolver: impl BindingResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
        }
    }

    pub fn check_scope(&self, document: &SourceDocument) -> Result<ScopeReport> {
        let report = self
            .resolver
            .resolve_bindings(document.language(), document.current())?;
        if report.in_scope() {
            log::debug!("{}: all names are in scope", document.path());
        } else {
            let names: Vec<String> = report
                .unresolved
                .iter()
                .map(|u| format!("{}@{}", u.name, u.line))
                .collect();
            log::info!("{}: names out of scope: {}", document.path(), names.join(", "));
        }
        Ok(report)
    }
}

#[derive(Default)]
struct Declarations {
    scopes: HashMap<usize, HashSet<String>>,
    /// Identifier nodes that declare rather than reference.
    bindings: HashSet<usize>,
}

pub fn resolve(tree: &Tree, source: &str, profile: &LanguageProfile) -> ScopeReport {
    let root = tree.root_node();
    let mut declarations = Declarations::default();
    declarations.scopes.insert(root.id(), HashSet::new());
    collect_declarations(root, source, profile, &mut Vec::new(), &mut declarations);

    let mut chain = vec![root.id()];
    let mut unresolved = Vec::new();
    check_references(root, source, profile, &mut chain, &declarations, &mut unresolved);

    ScopeReport {
        unresolved,
        well_formed: !root.has_error(),
    }
}

fn collect_declarations(
    node: Node,
    source: &str,
    profile: &LanguageProfile,
    scopes: &mut Vec<usize>,
    declarations: &mut Declarations,
) {
    let is_scope = profile.is_scope(node.kind());
    let outer = scopes.last().copied().unwrap_or(node.id());

    for (_, field) in profile
        .binding_fields
        .iter()
        .filter(|(kind, _)| *kind == node.kind())
    {
        // A scope's own name lives in the scope around it.
        let target = if is_scope && *field != Some("name") {
            node.id()
        } else {
            outer
        };
        match field {
            Some(field) => {
                let mut cursor = node.walk();
                let children: Vec<Node> = node.children_by_field_name(field, &mut cursor).collect();
                for child in children {
                    declare(child, source, profile, target, declarations);
                }
            }
            None => declare(node, source, profile, target, declarations),
        }
    }

    if is_scope {
        scopes.push(node.id());
    }
    let count = node.child_count();
    for i in 0..count {
        if let Some(child) = node.child(i) {
            collect_declarations(child, source, profile, scopes, declarations);
        }
    }
    if is_scope {
        scopes.pop();
    }
}

fn declare(
    node: Node,
    source: &str,
    profile: &LanguageProfile,
    scope: usize,
    declarations: &mut Declarations,
) {
    if profile.reference_kinds.contains(&node.kind()) {
        declarations
            .scopes
            .entry(scope)
            .or_default()
            .insert(node_text(node, source).to_string());
        declarations.bindings.insert(node.id());
    }
    let count = node.child_count();
    for i in 0..count {
        if let Some(child) = node.child(i) {
            declare(child, source, profile, scope, declarations);
        }
    }
}

fn check_references(
    node: Node,
    source: &str,
    profile: &LanguageProfile,
    chain: &mut Vec<usize>,
    declarations: &Declarations,
    unresolved: &mut Vec<UnresolvedName>,
) {
    if profile.opaque_kinds.contains(&node.kind()) {
        return;
    }
    let is_scope = profile.is_scope(node.kind()) && chain.last() != Some(&node.id());
    if is_scope {
        chain.push(node.id());
    }

    if profile.reference_kinds.contains(&node.kind())
        && !declarations.bindings.contains(&node.id())
        && !is_member_position(node, profile)
    {
        let name = node_text(node, source);
        let resolved = profile.builtins.contains(&name)
            || chain.iter().any(|scope| {
                declarations
                    .scopes
                    .get(scope)
                    .is_some_and(|names| names.contains(name))
            });
        if !resolved {
            unresolved.push(UnresolvedName {
                name: name.to_string(),
                line: node.start_position().row + 1,
            });
        }
    }

    let count = node.child_count();
    for i in 0..count {
        if let Some(child) = node.child(i) {
            check_references(child, source, profile, chain, declarations, unresolved);
        }
    }
    if is_scope {
        chain.pop();
    }
}

/// Attribute names, keyword labels and the like are not references.
fn is_member_position(node: Node, profile: &LanguageProfile) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    profile
        .non_reference_fields
        .iter()
        .filter(|(kind, _)| *kind == parent.kind())
        .any(|(_, field)| {
            let mut cursor = parent.walk();
            let found = parent
                .children_by_field_name(field, &mut cursor)
                .any(|child| child.id() == node.id());
            found
        })
}
