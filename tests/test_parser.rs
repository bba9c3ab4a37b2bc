use rsrepair::parser::{self, StatementInfo};
use rsrepair::Language;

fn index(language: Language, source: &str) -> Vec<StatementInfo> {
    let mut p = parser::new_parser(language).unwrap();
    let tree = p.parse(source, None).unwrap();
    parser::index_statements(&tree, source, language.profile())
}

fn summary(statements: &[StatementInfo]) -> Vec<(&str, usize, &str)> {
    statements
        .iter()
        .map(|s| (s.kind, s.line, s.type_name.as_str()))
        .collect()
}

const PYTHON_SOURCE: &str = "import os

class Account:
    def deposit(self, amount):
        if amount > 0:
            self.balance += amount
        return self.balance

def helper(x):
    return x + 1
";

// --- python ---

#[test]
fn python_statements_in_source_order_with_types() {
    let statements = index(Language::Python, PYTHON_SOURCE);
    assert_eq!(
        summary(&statements),
        vec![
            ("if_statement", 5, "Account"),
            ("expression_statement", 6, "Account"),
            ("return_statement", 7, "Account"),
            ("return_statement", 10, ""),
        ]
    );
}

#[test]
fn python_statement_parents_are_blocks() {
    let statements = index(Language::Python, PYTHON_SOURCE);
    for s in &statements {
        assert!(
            Language::Python.profile().is_block(s.parent_kind),
            "{} at line {} has parent {}",
            s.kind,
            s.line,
            s.parent_kind
        );
    }
}

#[test]
fn python_byte_ranges_cover_statement_text() {
    let statements = index(Language::Python, PYTHON_SOURCE);
    let ret = &statements[3];
    assert_eq!(&PYTHON_SOURCE[ret.start_byte..ret.end_byte], "return x + 1");
    assert_eq!(ret.column, 4);
}

#[test]
fn python_module_level_statements_have_no_type() {
    let statements = index(Language::Python, "x = 1\nprint(x)\n");
    assert_eq!(
        summary(&statements),
        vec![("expression_statement", 1, ""), ("expression_statement", 2, "")]
    );
    assert_eq!(statements[0].parent_kind, "module");
}

#[test]
fn find_statement_node_returns_outermost_match() {
    let source = "value()\n";
    let mut p = parser::new_parser(Language::Python).unwrap();
    let tree = p.parse(source, None).unwrap();
    let node = parser::find_statement_node(&tree, 0, 7, Language::Python.profile()).unwrap();
    assert_eq!(node.kind(), "expression_statement");
    assert!(parser::find_statement_node(&tree, 0, 5, Language::Python.profile()).is_none());
}

#[test]
fn statement_children_ignores_comments() {
    let source = "def f():\n    # note\n    return 1\n";
    let mut p = parser::new_parser(Language::Python).unwrap();
    let tree = p.parse(source, None).unwrap();
    let ret = index(Language::Python, source).remove(0);
    let node = parser::find_statement_node(&tree, ret.start_byte, ret.end_byte, Language::Python.profile())
        .unwrap();
    assert_eq!(parser::statement_children(node.parent().unwrap()), 1);
}

// --- rust ---

const RUST_SOURCE: &str = "struct Counter { n: i32 }

impl Counter {
    fn bump(&mut self) -> i32 {
        let step = 1;
        self.n += step;
        self.n
    }
}

fn main() {
    let mut c = Counter { n: 0 };
    c.bump();
}
";

#[test]
fn rust_statements_skip_tail_expressions() {
    let statements = index(Language::Rust, RUST_SOURCE);
    assert_eq!(
        summary(&statements),
        vec![
            ("let_declaration", 5, "Counter"),
            ("expression_statement", 6, "Counter"),
            ("let_declaration", 12, ""),
            ("expression_statement", 13, ""),
        ]
    );
    assert!(statements.iter().all(|s| s.parent_kind == "block"));
}

// --- javascript / typescript ---

const JS_SOURCE: &str = "class Cart {
  add(item) {
    this.items.push(item);
    return this.items.length;
  }
}
function total(xs) {
  let sum = 0;
  for (const x of xs) {
    sum += x;
  }
  return sum;
}
";

#[test]
fn javascript_statements_with_class_types() {
    let statements = index(Language::JavaScript, JS_SOURCE);
    assert_eq!(
        summary(&statements),
        vec![
            ("expression_statement", 3, "Cart"),
            ("return_statement", 4, "Cart"),
            ("lexical_declaration", 8, ""),
            ("for_in_statement", 9, ""),
            ("expression_statement", 10, ""),
            ("return_statement", 12, ""),
        ]
    );
}

#[test]
fn javascript_switch_cases_hold_statements() {
    let source = "switch (k) {\n  case 1:\n    go();\n    break;\n  default:\n    stop();\n}\n";
    let statements = index(Language::JavaScript, source);
    let parents: Vec<_> = statements.iter().map(|s| s.parent_kind).collect();
    assert_eq!(parents, vec!["program", "switch_case", "switch_case", "switch_default"]);
}

#[test]
fn typescript_parses_annotated_statements() {
    let source = "function f(a: number): number {\n  const b: number = a;\n  return b;\n}\n";
    for language in [Language::TypeScript, Language::Tsx] {
        let statements = index(language, source);
        assert_eq!(
            summary(&statements),
            vec![("lexical_declaration", 2, ""), ("return_statement", 3, "")]
        );
    }
}
