//! Canonical source printer for the demo grammar.
//!
//! Printing is deterministic: four-space indentation, one statement per
//! line, a blank line between class members and before each class. Conflict
//! markers are emitted at column zero in the usual seven-character form;
//! choice variants print as `//#if` / `//#endif` annotations.

use crate::lang::ast::{ConflictParts, JavaKind, JavaNode};
use crate::tree::GrammarNode;

/// Serializes a subtree to source text.
pub fn print(node: &JavaNode) -> String {
    let mut out = String::new();
    print_node(node, 0, &mut out);
    out
}

fn indent_str(level: usize) -> String {
    "    ".repeat(level)
}

fn print_node(node: &JavaNode, indent: usize, out: &mut String) {
    if let Some(parts) = node.conflict_parts() {
        print_conflict(parts, indent, out);
        return;
    }
    if !node.choice_variants().is_empty() {
        print_choice(node, indent, out);
        return;
    }

    match node.kind() {
        JavaKind::CompilationUnit => print_unit(node, out),
        JavaKind::Package { name } => {
            out.push_str(&format!("{}package {};\n", indent_str(indent), name));
        }
        JavaKind::ImportSection => {
            for child in node.children() {
                print_node(child, indent, out);
            }
        }
        JavaKind::Import { path } => {
            out.push_str(&format!("{}import {};\n", indent_str(indent), path));
        }
        JavaKind::Class { header, .. } => {
            out.push_str(&format!("{}{} {{\n", indent_str(indent), header));
            for (i, member) in node.children().iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                print_node(member, indent + 1, out);
            }
            out.push_str(&format!("{}}}\n", indent_str(indent)));
        }
        JavaKind::Field { decl } => {
            out.push_str(&format!("{}{}\n", indent_str(indent), decl));
        }
        JavaKind::Method { signature } => {
            out.push_str(&format!("{}{} {{\n", indent_str(indent), signature));
            for body in node.children() {
                print_node(body, indent + 1, out);
            }
            out.push_str(&format!("{}}}\n", indent_str(indent)));
        }
        JavaKind::Block => {
            if let Some(content) = node.content() {
                for line in content.lines() {
                    if line.is_empty() {
                        out.push('\n');
                    } else {
                        out.push_str(&format!("{}{}\n", indent_str(indent), line));
                    }
                }
            } else {
                for stmt in node.children() {
                    print_node(stmt, indent, out);
                }
            }
        }
        JavaKind::Return => match node.children().first() {
            Some(expr) => {
                out.push_str(&format!(
                    "{}return {};\n",
                    indent_str(indent),
                    expr_to_string(expr)
                ));
            }
            None => {
                out.push_str(&format!("{}return;\n", indent_str(indent)));
            }
        },
        JavaKind::Assign { lhs } => {
            let rhs = node.children().first().map(expr_to_string).unwrap_or_default();
            out.push_str(&format!("{}{} = {};\n", indent_str(indent), lhs, rhs));
        }
        JavaKind::VarDecl { ty, name } => {
            let init = node.children().first().map(expr_to_string).unwrap_or_default();
            out.push_str(&format!(
                "{}{} {} = {};\n",
                indent_str(indent),
                ty,
                name,
                init
            ));
        }
        JavaKind::ExprStmt => {
            let expr = node.children().first().map(expr_to_string).unwrap_or_default();
            out.push_str(&format!("{}{};\n", indent_str(indent), expr));
        }
        // Bare expression fragments only appear as conflict alternatives.
        _ => {
            out.push_str(&format!("{}{}\n", indent_str(indent), expr_to_string(node)));
        }
    }
}

/// Prints the compilation unit: package line, import lines, then classes
/// separated by blank lines.
fn print_unit(unit: &JavaNode, out: &mut String) {
    let mut printed_any = false;

    for child in unit.children() {
        match child.kind() {
            JavaKind::Package { .. } if child.conflict_parts().is_none() => {
                print_node(child, 0, out);
                printed_any = true;
            }
            JavaKind::ImportSection if child.conflict_parts().is_none() => {
                if !child.children().is_empty() {
                    print_node(child, 0, out);
                    printed_any = true;
                }
            }
            _ => {
                if printed_any {
                    out.push('\n');
                }
                print_node(child, 0, out);
                printed_any = true;
            }
        }
    }
}

fn print_conflict(parts: &ConflictParts, indent: usize, out: &mut String) {
    out.push_str(&format!("<<<<<<< {}\n", parts.left_name));
    if let Some(left) = &parts.left {
        print_node(left, indent, out);
    }
    out.push_str("=======\n");
    if let Some(right) = &parts.right {
        print_node(right, indent, out);
    }
    out.push_str(&format!(">>>>>>> {}\n", parts.right_name));
}

fn print_choice(node: &JavaNode, indent: usize, out: &mut String) {
    for (condition, variant) in node.choice_variants() {
        out.push_str(&format!("//#if {}\n", condition));
        print_node(variant, indent, out);
        out.push_str("//#endif\n");
    }
}

/// Renders an expression subtree as a single line of text.
pub(crate) fn expr_to_string(node: &JavaNode) -> String {
    if let Some(parts) = node.conflict_parts() {
        // An expression-level conflict cannot be rendered inline; fall back
        // to a marker block embedded in the surrounding line.
        let left = parts.left.as_ref().map(expr_to_string).unwrap_or_default();
        let right = parts.right.as_ref().map(expr_to_string).unwrap_or_default();
        return format!(
            "\n<<<<<<< {}\n{}\n=======\n{}\n>>>>>>> {}\n",
            parts.left_name, left, right, parts.right_name
        );
    }

    match node.kind() {
        JavaKind::Ident { name } => name.clone(),
        JavaKind::Literal { text } => text.clone(),
        JavaKind::Binary { op } => {
            let l = node.children().first().map(expr_to_string).unwrap_or_default();
            let r = node.children().get(1).map(expr_to_string).unwrap_or_default();
            format!("{} {} {}", l, op, r)
        }
        JavaKind::Ternary => {
            let c = node.children().first().map(expr_to_string).unwrap_or_default();
            let t = node.children().get(1).map(expr_to_string).unwrap_or_default();
            let f = node.children().get(2).map(expr_to_string).unwrap_or_default();
            format!("{} ? {} : {}", c, t, f)
        }
        JavaKind::Paren => {
            let e = node.children().first().map(expr_to_string).unwrap_or_default();
            format!("({})", e)
        }
        JavaKind::Call { name } => {
            let args: Vec<String> = node.children().iter().map(expr_to_string).collect();
            format!("{}({})", name, args.join(", "))
        }
        _ => String::new(),
    }
}
