//! Java AST extractor using tree-sitter.

use tree_sitter::{Node, Parser};

use super::annotations::binding_source;
use super::helpers::{
    find_child_by_type, find_error_node, get_end_line, get_node_text, get_start_line,
    normalize_whitespace,
};
use crate::error::ParseError;
use crate::reducer::complexity;
use crate::types::{
    ClassInfo, ClassKind, FieldInfo, MethodInfo, MethodKind, ParameterInfo,
};

/// Compilation-unit context shared by every type declared in it.
struct UnitContext<'s> {
    source: &'s str,
    path: &'s str,
    package: Option<String>,
    imports: Vec<String>,
}

/// Parse Java source code into the classes it declares, nested ones included.
///
/// A syntax error anywhere in the file fails the whole unit with the line
/// of the first error node.
pub fn parse(source: &str, file_path: &str) -> Result<Vec<ClassInfo>, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| ParseError::new(file_path, 0, format!("Failed to set Java language: {}", e)))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ParseError::new(file_path, 0, "Failed to parse Java source"))?;
    let root = tree.root_node();

    if let Some(error) = find_error_node(&root) {
        let message = if error.is_missing() {
            format!("missing `{}`", error.kind())
        } else {
            "syntax error".to_string()
        };
        return Err(ParseError::new(file_path, get_start_line(&error), message));
    }

    let ctx = UnitContext {
        source,
        path: file_path,
        package: extract_package_name(&root, source),
        imports: extract_imports(&root, source),
    };

    let mut classes = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        extract_type(&child, &ctx, None, &mut classes);
    }

    Ok(classes)
}

/// Extract package name.
fn extract_package_name(root: &Node, source: &str) -> Option<String> {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "package_declaration" {
            if let Some(id) = find_child_by_type(&child, "scoped_identifier") {
                return Some(get_node_text(&id, source).to_string());
            }
            if let Some(id) = find_child_by_type(&child, "identifier") {
                return Some(get_node_text(&id, source).to_string());
            }
        }
    }
    None
}

/// Extract import declarations as dotted names (`java.util.List`, `com.acme.*`).
fn extract_imports(root: &Node, source: &str) -> Vec<String> {
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() != "import_declaration" {
            continue;
        }
        let mut module = String::new();
        let mut is_wildcard = false;
        let mut inner_cursor = child.walk();
        for inner in child.children(&mut inner_cursor) {
            match inner.kind() {
                "scoped_identifier" | "identifier" => {
                    module = get_node_text(&inner, source).to_string();
                }
                "asterisk" => is_wildcard = true,
                _ => {}
            }
        }
        if module.is_empty() {
            continue;
        }
        if is_wildcard {
            module.push_str(".*");
        }
        imports.push(module);
    }
    imports
}

/// Dispatch a declaration node to its extractor. Non-type nodes are ignored.
fn extract_type(node: &Node, ctx: &UnitContext, outer: Option<&str>, out: &mut Vec<ClassInfo>) {
    let kind = match node.kind() {
        "class_declaration" => ClassKind::Class,
        "interface_declaration" => ClassKind::Interface,
        "enum_declaration" => ClassKind::Enum,
        "record_declaration" => ClassKind::Record,
        _ => return,
    };

    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let simple = get_node_text(&name_node, ctx.source);
    let name = match outer {
        Some(outer) => format!("{}.{}", outer, simple),
        None => simple.to_string(),
    };

    let mut class = ClassInfo {
        name,
        package: ctx.package.clone(),
        path: ctx.path.to_string(),
        kind,
        imports: ctx.imports.clone(),
        start_line: get_start_line(node),
        end_line: get_end_line(node),
        ..Default::default()
    };

    extract_modifiers(node, ctx.source, &mut class.modifiers, &mut class.annotations);

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "superclass" => {
                let mut inner_cursor = child.walk();
                for inner in child.children(&mut inner_cursor) {
                    if inner.is_named() {
                        class.bases.push(type_text(&inner, ctx.source));
                        break;
                    }
                }
            }
            "super_interfaces" | "extends_interfaces" => {
                extract_interfaces(&child, ctx.source, &mut class.bases);
            }
            "formal_parameters" if kind == ClassKind::Record => {
                // Record components behave like final fields.
                for param in extract_parameters(&child, ctx.source) {
                    class.fields.push(FieldInfo {
                        name: param.name,
                        declared_type: param.declared_type,
                        annotations: param.annotations,
                    });
                }
            }
            _ => {}
        }
    }

    let mut nested = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        extract_body(&body, ctx, &mut class, &mut nested);
    }

    out.push(class);
    out.extend(nested);
}

/// Walk a class, interface, enum or record body.
fn extract_body(body: &Node, ctx: &UnitContext, class: &mut ClassInfo, nested: &mut Vec<ClassInfo>) {
    let is_interface = class.kind == ClassKind::Interface;
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "method_declaration" => {
                class.methods.push(extract_method(&child, ctx.source, is_interface));
            }
            "constructor_declaration" | "compact_constructor_declaration" => {
                class.methods.push(extract_constructor(&child, ctx.source, &class.name));
            }
            "field_declaration" | "constant_declaration" => {
                extract_fields(&child, ctx.source, &mut class.fields);
            }
            "enum_body_declarations" => {
                extract_body(&child, ctx, class, nested);
            }
            "class_declaration" | "interface_declaration" | "enum_declaration"
            | "record_declaration" => {
                extract_type(&child, ctx, Some(&class.name), nested);
            }
            _ => {}
        }
    }
}

/// Extract modifiers and annotations. Annotation text is kept verbatim.
fn extract_modifiers(
    node: &Node,
    source: &str,
    modifiers: &mut Vec<String>,
    annotations: &mut Vec<String>,
) {
    let Some(mods) = find_child_by_type(node, "modifiers") else {
        return;
    };
    let mut cursor = mods.walk();
    for inner in mods.children(&mut cursor) {
        match inner.kind() {
            "marker_annotation" | "annotation" => {
                annotations.push(get_node_text(&inner, source).to_string());
            }
            "public" | "private" | "protected" | "static" | "final" | "abstract" | "default"
            | "synchronized" => {
                modifiers.push(inner.kind().to_string());
            }
            _ => {}
        }
    }
}

/// Extract implemented or extended interfaces.
fn extract_interfaces(node: &Node, source: &str, bases: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "type_list" {
            let mut inner_cursor = child.walk();
            for inner in child.children(&mut inner_cursor) {
                if inner.is_named() {
                    bases.push(type_text(&inner, source));
                }
            }
        }
    }
}

/// Extract method declaration.
fn extract_method(node: &Node, source: &str, in_interface: bool) -> MethodInfo {
    let mut method = MethodInfo {
        kind: MethodKind::Method,
        start_line: get_start_line(node),
        end_line: get_end_line(node),
        ..Default::default()
    };

    extract_modifiers(node, source, &mut method.modifiers, &mut method.annotations);

    if let Some(name) = node.child_by_field_name("name") {
        method.name = get_node_text(&name, source).to_string();
    }
    method.return_type = node
        .child_by_field_name("type")
        .map(|t| type_text(&t, source))
        .unwrap_or_else(|| "void".to_string());
    if let Some(params) = node.child_by_field_name("parameters") {
        method.parameters = extract_parameters(&params, source);
    }

    let body = node.child_by_field_name("body");
    method.complexity = complexity::score_body(body.as_ref(), source);

    let is_private = method.modifiers.iter().any(|m| m == "private");
    method.is_public = method.modifiers.iter().any(|m| m == "public") || (in_interface && !is_private);

    method
}

/// Extract constructor declaration.
fn extract_constructor(node: &Node, source: &str, class_name: &str) -> MethodInfo {
    let mut method = MethodInfo {
        kind: MethodKind::Constructor,
        start_line: get_start_line(node),
        end_line: get_end_line(node),
        ..Default::default()
    };

    extract_modifiers(node, source, &mut method.modifiers, &mut method.annotations);

    method.name = node
        .child_by_field_name("name")
        .map(|n| get_node_text(&n, source).to_string())
        .unwrap_or_else(|| class_name.rsplit('.').next().unwrap_or(class_name).to_string());
    if let Some(params) = node.child_by_field_name("parameters") {
        method.parameters = extract_parameters(&params, source);
    }

    let body = node.child_by_field_name("body");
    method.complexity = complexity::score_body(body.as_ref(), source);
    method.is_public = method.modifiers.iter().any(|m| m == "public");

    method
}

/// Extract parameters in declaration order.
fn extract_parameters(node: &Node, source: &str) -> Vec<ParameterInfo> {
    let mut params = Vec::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let is_variadic = match child.kind() {
            "formal_parameter" => false,
            "spread_parameter" => true,
            _ => continue,
        };

        let mut param = ParameterInfo {
            is_variadic,
            ..Default::default()
        };
        let mut modifiers = Vec::new();
        extract_modifiers(&child, source, &mut modifiers, &mut param.annotations);

        let mut inner_cursor = child.walk();
        for inner in child.children(&mut inner_cursor) {
            match inner.kind() {
                "identifier" => {
                    param.name = get_node_text(&inner, source).to_string();
                }
                "variable_declarator" => {
                    // Spread parameters keep their name in a variable_declarator
                    if let Some(id) = find_child_by_type(&inner, "identifier") {
                        param.name = get_node_text(&id, source).to_string();
                    }
                }
                "modifiers" | "..." => {}
                _ if inner.is_named() && param.declared_type.is_empty() => {
                    param.declared_type = type_text(&inner, source);
                }
                _ => {}
            }
        }

        if is_variadic {
            param.declared_type.push_str("...");
        }
        param.binding = binding_source(&param.annotations);

        if !param.name.is_empty() {
            params.push(param);
        }
    }

    params
}

/// Extract field declarations; `int a, b;` yields two fields.
fn extract_fields(node: &Node, source: &str, fields: &mut Vec<FieldInfo>) {
    let mut modifiers = Vec::new();
    let mut annotations = Vec::new();
    extract_modifiers(node, source, &mut modifiers, &mut annotations);

    let declared_type = node
        .child_by_field_name("type")
        .map(|t| type_text(&t, source))
        .unwrap_or_default();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "variable_declarator" {
            if let Some(id) = child.child_by_field_name("name") {
                fields.push(FieldInfo {
                    name: get_node_text(&id, source).to_string(),
                    declared_type: declared_type.clone(),
                    annotations: annotations.clone(),
                });
            }
        }
    }
}

fn type_text(node: &Node, source: &str) -> String {
    normalize_whitespace(get_node_text(node, source))
}
