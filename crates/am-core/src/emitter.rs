//! Emitter: ModelGraph → outline text format.
//!
//! Output is deterministic (tree order, fixed attribute order) and
//! round-trips through `parse_model`.

use crate::id::NodeId;
use crate::model::*;
use std::fmt::Write;

/// Emit a `ModelGraph` as an outline document.
#[must_use]
pub fn emit_model(graph: &ModelGraph) -> String {
    let mut out = String::with_capacity(1024);
    emit_node(&mut out, graph, graph.root_id(), 0);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

/// Quote `s`, escaping `"`, `\` and newlines.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn emit_node(out: &mut String, graph: &ModelGraph, id: NodeId, depth: usize) {
    let Some(node) = graph.get(id) else {
        return;
    };

    indent(out, depth);
    emit_header(out, node);

    let attributes = attribute_lines(node);
    let children = graph.children_of(id);
    if attributes.is_empty() && children.is_empty() {
        out.push('\n');
        return;
    }

    out.push_str(" {\n");
    for line in &attributes {
        indent(out, depth + 1);
        out.push_str(line);
        out.push('\n');
    }
    for child in children {
        emit_node(out, graph, child, depth + 1);
    }
    indent(out, depth);
    out.push_str("}\n");
}

fn emit_header(out: &mut String, node: &ModelNode) {
    let id = node.id;
    match &node.kind {
        NodeKind::Model { .. } => {
            let _ = write!(out, "model {id} {}", quote(&node.name));
        }
        NodeKind::Folder { folder_type } => {
            let _ = write!(
                out,
                "folder {id} {} {}",
                folder_type.keyword(),
                quote(&node.name)
            );
        }
        NodeKind::Element { element_type } => {
            let _ = write!(
                out,
                "element {id} {} {}",
                element_type.keyword(),
                quote(&node.name)
            );
        }
        NodeKind::Relationship {
            relationship_type,
            source,
            target,
        } => {
            let _ = write!(
                out,
                "relation {id} {} {source} -> {target}",
                relationship_type.keyword()
            );
            emit_opt_name(out, &node.name);
        }
        NodeKind::View => {
            let _ = write!(out, "view {id} {}", quote(&node.name));
        }
        NodeKind::DiagramObject {
            element: Some(element),
            ..
        } => {
            let _ = write!(out, "object {id} -> {element}");
            emit_opt_name(out, &node.name);
        }
        NodeKind::DiagramObject { element: None, .. } => {
            let _ = write!(out, "note {id}");
            emit_opt_name(out, &node.name);
        }
        NodeKind::DiagramConnection {
            relationship,
            source,
            target,
        } => {
            let _ = write!(out, "connection {id}");
            if let Some(rel) = relationship {
                let _ = write!(out, " -> {rel}");
            }
            let _ = write!(out, " {source} -> {target}");
            emit_opt_name(out, &node.name);
        }
    }
}

fn emit_opt_name(out: &mut String, name: &str) {
    if !name.is_empty() {
        out.push(' ');
        out.push_str(&quote(name));
    }
}

fn attribute_lines(node: &ModelNode) -> Vec<String> {
    let mut lines = Vec::new();

    if let NodeKind::Model { purpose } = &node.kind
        && !purpose.is_empty()
    {
        lines.push(format!("purpose: {}", quote(purpose)));
    }
    if !node.documentation.is_empty() {
        lines.push(format!("doc: {}", quote(&node.documentation)));
    }
    for prop in &node.properties {
        lines.push(format!("prop {} = {}", quote(&prop.key), quote(&prop.value)));
    }

    if let NodeKind::DiagramObject { bounds, .. } = &node.kind {
        lines.push(format!(
            "x: {} y: {} w: {} h: {}",
            bounds.x, bounds.y, bounds.width, bounds.height
        ));
    }
    if node.kind.is_diagram_component() {
        let style = &node.style;
        if let Some(fill) = style.fill_color {
            lines.push(format!("fill: {}", fill.to_hex()));
        }
        if let Some(font) = &style.font {
            lines.push(format!("font: {}", quote(font)));
        }
        if let Some(color) = style.font_color {
            lines.push(format!("font-color: {}", color.to_hex()));
        }
        if let Some(color) = style.line_color {
            lines.push(format!("line-color: {}", color.to_hex()));
        }
        if style.text_alignment != TextAlignment::default() {
            lines.push(format!("align: {}", style.text_alignment.keyword()));
        }
    }
    if node.locked {
        lines.push("locked: true".to_string());
    }

    lines
}
