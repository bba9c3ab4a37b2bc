use crate::parser::LanguageProfile;

// Only `let` and expression statements are statements in Rust; a block's
// trailing expression is not, so it never enters the pools.
pub static RUST: LanguageProfile = LanguageProfile {
    statement_kinds: &["expression_statement", "let_declaration"],
    block_kinds: &["block"],
    class_kinds: &[("impl_item", "type"), ("trait_item", "name"), ("mod_item", "name")],
    scope_kinds: &[
        "source_file",
        "function_item",
        "closure_expression",
        "impl_item",
        "trait_item",
        "mod_item",
    ],
    binding_fields: &[
        ("let_declaration", Some("pattern")),
        ("parameter", Some("pattern")),
        ("closure_parameters", None),
        ("for_expression", Some("pattern")),
        ("match_arm", Some("pattern")),
        ("let_condition", Some("pattern")),
        ("function_item", Some("name")),
        ("function_signature_item", Some("name")),
        ("const_item", Some("name")),
        ("static_item", Some("name")),
        ("use_declaration", Some("argument")),
        ("extern_crate_declaration", None),
        ("macro_definition", Some("name")),
    ],
    reference_kinds: &["identifier"],
    non_reference_fields: &[
        ("macro_invocation", "macro"),
        ("field_expression", "field"),
        ("field_initializer", "field"),
        ("mod_item", "name"),
    ],
    opaque_kinds: &[
        "scoped_identifier",
        "scoped_type_identifier",
        "scoped_use_list",
        "attribute_item",
        "inner_attribute_item",
        "lifetime",
        "label",
        "line_comment",
        "block_comment",
        "string_literal",
    ],
    builtins: &[
        "Some", "None", "Ok", "Err", "Vec", "String", "Box", "Option", "Result", "drop",
        "Default", "From", "Into", "Clone", "Iterator", "std", "core", "alloc",
    ],
    placeholder: None,
    separator: " ",
    literal_kinds: &["string_literal", "raw_string_literal", "block_comment"],
};
