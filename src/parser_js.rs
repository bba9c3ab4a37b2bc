use crate::parser::LanguageProfile;

const STATEMENT_KINDS: &[&str] = &[
    "expression_statement",
    "variable_declaration",
    "lexical_declaration",
    "return_statement",
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "throw_statement",
    "try_statement",
    "break_statement",
    "continue_statement",
    "switch_statement",
];

const BLOCK_KINDS: &[&str] = &["statement_block", "program", "switch_case", "switch_default"];

const CLASS_KINDS: &[(&str, &str)] = &[("class_declaration", "name"), ("class", "name")];

const SCOPE_KINDS: &[&str] = &[
    "program",
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "arrow_function",
    "method_definition",
    "class_declaration",
    "class",
];

const BINDING_FIELDS: &[(&str, Option<&str>)] = &[
    ("variable_declarator", Some("name")),
    ("function_declaration", Some("name")),
    ("generator_function_declaration", Some("name")),
    ("function_expression", Some("name")),
    ("class_declaration", Some("name")),
    ("class", Some("name")),
    ("formal_parameters", None),
    ("arrow_function", Some("parameter")),
    ("import_clause", None),
    ("catch_clause", Some("parameter")),
    ("for_in_statement", Some("left")),
];

const NON_REFERENCE_FIELDS: &[(&str, &str)] = &[
    ("labeled_statement", "label"),
    ("break_statement", "label"),
    ("continue_statement", "label"),
];

const OPAQUE_KINDS: &[&str] = &["comment", "string", "regex", "import_statement", "jsx_closing_element"];

const BUILTINS: &[&str] = &[
    "console", "Math", "JSON", "Object", "Array", "String", "Number", "Boolean", "Promise",
    "Error", "TypeError", "RangeError", "SyntaxError", "Symbol", "Map", "Set", "WeakMap",
    "WeakSet", "Date", "RegExp", "BigInt", "Reflect", "Proxy", "parseInt", "parseFloat",
    "isNaN", "isFinite", "undefined", "NaN", "Infinity", "globalThis", "window", "document",
    "require", "module", "exports", "process", "Buffer", "__dirname", "__filename",
    "setTimeout", "clearTimeout", "setInterval", "clearInterval", "queueMicrotask",
    "structuredClone", "fetch", "URL", "arguments",
];

const LITERAL_KINDS: &[&str] = &["string", "template_string", "comment"];

pub static JAVASCRIPT: LanguageProfile = LanguageProfile {
    statement_kinds: STATEMENT_KINDS,
    block_kinds: BLOCK_KINDS,
    class_kinds: CLASS_KINDS,
    scope_kinds: SCOPE_KINDS,
    binding_fields: BINDING_FIELDS,
    reference_kinds: &["identifier"],
    non_reference_fields: NON_REFERENCE_FIELDS,
    opaque_kinds: OPAQUE_KINDS,
    builtins: BUILTINS,
    placeholder: None,
    separator: "; ",
    literal_kinds: LITERAL_KINDS,
};

// TypeScript adds declarations whose names are plain identifiers, and type
// positions that never hold value references.
pub static TYPESCRIPT: LanguageProfile = LanguageProfile {
    statement_kinds: STATEMENT_KINDS,
    block_kinds: BLOCK_KINDS,
    class_kinds: &[
        ("class_declaration", "name"),
        ("class", "name"),
        ("abstract_class_declaration", "name"),
    ],
    scope_kinds: SCOPE_KINDS,
    binding_fields: &[
        ("variable_declarator", Some("name")),
        ("function_declaration", Some("name")),
        ("generator_function_declaration", Some("name")),
        ("function_expression", Some("name")),
        ("class_declaration", Some("name")),
        ("abstract_class_declaration", Some("name")),
        ("class", Some("name")),
        ("formal_parameters", None),
        ("arrow_function", Some("parameter")),
        ("import_clause", None),
        ("catch_clause", Some("parameter")),
        ("for_in_statement", Some("left")),
        ("enum_declaration", Some("name")),
        ("internal_module", Some("name")),
    ],
    reference_kinds: &["identifier"],
    non_reference_fields: NON_REFERENCE_FIELDS,
    opaque_kinds: &[
        "comment",
        "string",
        "regex",
        "import_statement",
        "jsx_closing_element",
        "type_annotation",
        "type_arguments",
        "type_parameters",
        "interface_declaration",
        "type_alias_declaration",
    ],
    builtins: BUILTINS,
    placeholder: None,
    separator: "; ",
    literal_kinds: LITERAL_KINDS,
};
