//! Parser for the outline text format → `ModelGraph`.
//!
//! Built on `winnow` 0.7. The format is a nested outline: one node per
//! header line, an optional `{ ... }` body holding attributes and owned
//! children, `#` line comments between items.
//!
//! ```text
//! model @id "Name" {
//!   folder @id business "Business" {
//!     element @id business-actor "Customer" { doc: "..." }
//!   }
//! }
//! ```

use crate::error::ParseError;
use crate::id::NodeId;
use crate::model::*;
use winnow::combinator::{cut_err, fail};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::take_while;

/// Parse an outline document into a `ModelGraph`.
#[must_use = "parsing result should be used"]
pub fn parse_model(input: &str) -> Result<ModelGraph, ParseError> {
    let mut rest = input;
    skip_ws_and_comments(&mut rest);

    if !rest.starts_with("model") {
        return Err(ParseError::at(input, rest, "expected `model`"));
    }
    let root = parse_node
        .parse_next(&mut rest)
        .map_err(|e| ParseError::at(input, rest, describe(&e)))?;

    skip_ws_and_comments(&mut rest);
    if !rest.is_empty() {
        return Err(ParseError::at(input, rest, "unexpected content after model"));
    }

    let Subtree { node, children } = root;
    let root_id = node.id;
    let mut graph = ModelGraph::from_root(node);
    for child in children {
        graph
            .insert_subtree(root_id, child, None)
            .map_err(|e| ParseError::at(input, input, e.to_string()))?;
    }
    Ok(graph)
}

fn describe(err: &ErrMode<ContextError>) -> String {
    match err {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e
            .context()
            .find_map(|c| match c {
                StrContext::Label(label) => Some((*label).to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "syntax error".to_string()),
        ErrMode::Incomplete(_) => "unexpected end of input".to_string(),
    }
}

/// Fail hard with a message. Used for semantic errors once the shape of
/// the input is known.
fn reject<T>(input: &mut &str, message: &'static str) -> ModalResult<T> {
    cut_err(fail::<_, T, _>.context(StrContext::Label(message))).parse_next(input)
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn skip_ws_and_comments(input: &mut &str) {
    loop {
        let before = *input;
        *input = input.trim_start();
        if input.starts_with('#') {
            match input.find('\n') {
                Some(pos) => *input = &input[pos + 1..],
                None => *input = "",
            }
            continue;
        }
        if *input == before {
            break;
        }
    }
}

/// Consume optional same-line whitespace.
fn skip_space(input: &mut &str) {
    use winnow::ascii::space0;
    let _: Result<&str, ErrMode<ContextError>> = space0.parse_next(input);
}

fn parse_identifier<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

/// Type keywords and attribute names (`business-actor`, `font-color`).
fn parse_keyword<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-').parse_next(input)
}

fn parse_node_id(input: &mut &str) -> ModalResult<NodeId> {
    '@'.parse_next(input)?;
    parse_identifier
        .context(StrContext::Label("node id"))
        .map(NodeId::intern)
        .parse_next(input)
}

fn parse_arrow(input: &mut &str) -> ModalResult<()> {
    skip_space(input);
    "->".context(StrContext::Label("`->`"))
        .parse_next(input)?;
    skip_space(input);
    Ok(())
}

fn parse_hex_color(input: &mut &str) -> ModalResult<Color> {
    let _ = '#'.parse_next(input)?;
    let digits: &str = take_while(1..=6, |c: char| c.is_ascii_hexdigit()).parse_next(input)?;
    match Color::from_hex(digits) {
        Some(color) => Ok(color),
        None => reject(input, "invalid color"),
    }
}

fn parse_int(input: &mut &str) -> ModalResult<i32> {
    let start = *input;
    if input.starts_with('-') {
        *input = &input[1..];
    }
    let _ = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let matched = &start[..start.len() - input.len()];
    match matched.parse::<i32>() {
        Ok(n) => Ok(n),
        Err(_) => reject(input, "number out of range"),
    }
}

fn parse_bool(input: &mut &str) -> ModalResult<bool> {
    match parse_keyword(input)? {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => reject(input, "expected `true` or `false`"),
    }
}

/// A double-quoted string. `\"`, `\\` and `\n` are unescaped.
fn parse_quoted_string(input: &mut &str) -> ModalResult<String> {
    let _ = '"'.parse_next(input)?;
    let s: &str = *input;
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                *input = &s[i + 1..];
                return Ok(out);
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            _ => out.push(c),
        }
    }
    *input = "";
    reject(input, "unterminated string")
}

fn opt_name(input: &mut &str) -> ModalResult<String> {
    skip_space(input);
    if input.starts_with('"') {
        parse_quoted_string(input)
    } else {
        Ok(String::new())
    }
}

// ─── Node parser ─────────────────────────────────────────────────────────

const NODE_KEYWORDS: [&str; 8] = [
    "model",
    "folder",
    "element",
    "relation",
    "view",
    "object",
    "note",
    "connection",
];

/// Whether the input starts with a node keyword followed by a space or
/// `@` (as opposed to an attribute name).
fn starts_with_child_node(input: &str) -> bool {
    NODE_KEYWORDS.iter().any(|keyword| {
        input.starts_with(keyword)
            && input[keyword.len()..].starts_with(|c: char| c == ' ' || c == '\t' || c == '@')
    })
}

fn parse_node(input: &mut &str) -> ModalResult<Subtree> {
    let keyword = parse_keyword(input)?;
    skip_space(input);
    let id = parse_node_id(input)?;
    skip_space(input);

    let (kind, name) = match keyword {
        "model" => (
            NodeKind::Model {
                purpose: String::new(),
            },
            opt_name(input)?,
        ),
        "folder" => {
            let Some(folder_type) = FolderType::from_keyword(parse_keyword(input)?) else {
                return reject(input, "unknown folder type");
            };
            (NodeKind::Folder { folder_type }, opt_name(input)?)
        }
        "element" => {
            let Some(element_type) = ElementType::from_keyword(parse_keyword(input)?) else {
                return reject(input, "unknown element type");
            };
            (NodeKind::Element { element_type }, opt_name(input)?)
        }
        "relation" => {
            let Some(relationship_type) = RelationshipType::from_keyword(parse_keyword(input)?)
            else {
                return reject(input, "unknown relationship type");
            };
            skip_space(input);
            let source = parse_node_id(input)?;
            parse_arrow(input)?;
            let target = parse_node_id(input)?;
            (
                NodeKind::Relationship {
                    relationship_type,
                    source,
                    target,
                },
                opt_name(input)?,
            )
        }
        "view" => (NodeKind::View, opt_name(input)?),
        "object" => {
            let element = if input.starts_with("->") {
                parse_arrow(input)?;
                Some(parse_node_id(input)?)
            } else {
                None
            };
            (
                NodeKind::DiagramObject {
                    element,
                    bounds: Bounds::default(),
                },
                opt_name(input)?,
            )
        }
        "note" => (
            NodeKind::DiagramObject {
                element: None,
                bounds: Bounds::default(),
            },
            opt_name(input)?,
        ),
        "connection" => {
            let relationship = if input.starts_with("->") {
                parse_arrow(input)?;
                let rel = parse_node_id(input)?;
                skip_space(input);
                Some(rel)
            } else {
                None
            };
            let source = parse_node_id(input)?;
            parse_arrow(input)?;
            let target = parse_node_id(input)?;
            (
                NodeKind::DiagramConnection {
                    relationship,
                    source,
                    target,
                },
                opt_name(input)?,
            )
        }
        _ => return reject(input, "unknown node keyword"),
    };

    let mut node = ModelNode::named(id, kind, name);
    let mut children = Vec::new();

    skip_space(input);
    if input.starts_with('{') {
        let _ = '{'.parse_next(input)?;
        skip_ws_and_comments(input);
        while !input.starts_with('}') {
            if input.is_empty() {
                return reject(input, "unclosed `{`");
            }
            if starts_with_child_node(input) {
                if !node.kind.is_container() {
                    return reject(input, "this node cannot own children");
                }
                children.push(parse_node(input)?);
            } else {
                parse_attribute(input, &mut node)?;
            }
            skip_ws_and_comments(input);
        }
        let _ = '}'.parse_next(input)?;
    }

    Ok(Subtree { node, children })
}

fn parse_attribute(input: &mut &str, node: &mut ModelNode) -> ModalResult<()> {
    let key = parse_keyword
        .context(StrContext::Label("attribute"))
        .parse_next(input)?;
    skip_space(input);

    if key == "prop" {
        let k = parse_quoted_string(input)?;
        skip_space(input);
        '='.context(StrContext::Label("`=`")).parse_next(input)?;
        skip_space(input);
        let v = parse_quoted_string(input)?;
        node.properties.push(Property::new(k, v));
        return Ok(());
    }

    ':'.context(StrContext::Label("`:`")).parse_next(input)?;
    skip_space(input);

    let value = match key {
        "purpose" => FeatureValue::Purpose(parse_quoted_string(input)?),
        "doc" => FeatureValue::Documentation(parse_quoted_string(input)?),
        "x" | "y" | "w" | "h" => {
            let n = parse_int(input)?;
            let NodeKind::DiagramObject { bounds, .. } = &mut node.kind else {
                return reject(input, "geometry on a node without bounds");
            };
            match key {
                "x" => bounds.x = n,
                "y" => bounds.y = n,
                "w" => bounds.width = n,
                _ => bounds.height = n,
            }
            return Ok(());
        }
        "fill" => FeatureValue::FillColor(Some(parse_hex_color(input)?)),
        "font" => FeatureValue::Font(Some(parse_quoted_string(input)?)),
        "font-color" => FeatureValue::FontColor(Some(parse_hex_color(input)?)),
        "line-color" => FeatureValue::LineColor(Some(parse_hex_color(input)?)),
        "align" => match TextAlignment::from_keyword(parse_keyword(input)?) {
            Some(align) => FeatureValue::TextAlignment(align),
            None => return reject(input, "unknown alignment"),
        },
        "locked" => FeatureValue::Locked(parse_bool(input)?),
        _ => return reject(input, "unknown attribute"),
    };

    if node.apply(value).is_err() {
        return reject(input, "attribute does not apply to this node");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_model() {
        let graph = parse_model("model @pm_root \"Empty\"\n").expect("parse failed");
        assert_eq!(graph.root_id(), NodeId::intern("pm_root"));
        assert_eq!(graph.root().name, "Empty");
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn parse_folders_and_elements() {
        let input = r#"
# Comment before the model
model @pf_root "Shop" {
  purpose: "Sell things"
  folder @pf_business business "Business" {
    element @pf_customer business-actor "Customer" {
      doc: "Buys things"
      prop "owner" = "sales"
    }
    # trailing comment
    element @pf_role business-role "Buyer"
  }
}
"#;
        let graph = parse_model(input).expect("parse failed");
        assert!(matches!(
            &graph.root().kind,
            NodeKind::Model { purpose } if purpose == "Sell things"
        ));
        let business = NodeId::intern("pf_business");
        assert_eq!(graph.folder_of_type(FolderType::Business), Some(business));
        let customer = graph.get(NodeId::intern("pf_customer")).unwrap();
        assert_eq!(customer.documentation, "Buys things");
        assert_eq!(customer.properties[0], Property::new("owner", "sales"));
        assert_eq!(graph.children_of(business).len(), 2);
    }

    #[test]
    fn parse_relations_and_diagram() {
        let input = r#"model @pd_root "M" {
  folder @pd_business business "Business" {
    element @pd_a business-actor "A"
    element @pd_b business-role "B"
  }
  folder @pd_rel relations "Relations" {
    relation @pd_r assignment @pd_a -> @pd_b "plays"
  }
  folder @pd_views views "Views" {
    view @pd_v "Overview" {
      object @pd_oa -> @pd_a { x: 10 y: 20 w: 120 h: 55 fill: #FFFFB5 }
      object @pd_ob -> @pd_b { x: 200 y: 20 w: 120 h: 55 locked: true }
      note @pd_n "Sticky" { x: 10 y: 100 w: 80 h: 30 align: left }
      connection @pd_c -> @pd_r @pd_oa -> @pd_ob { line-color: #000 }
    }
  }
}"#;
        let graph = parse_model(input).expect("parse failed");
        match &graph.get(NodeId::intern("pd_r")).unwrap().kind {
            NodeKind::Relationship {
                relationship_type,
                source,
                target,
            } => {
                assert_eq!(*relationship_type, RelationshipType::Assignment);
                assert_eq!(*source, NodeId::intern("pd_a"));
                assert_eq!(*target, NodeId::intern("pd_b"));
            }
            other => panic!("expected relationship, got {other:?}"),
        }
        let oa = graph.get(NodeId::intern("pd_oa")).unwrap();
        assert_eq!(
            oa.kind,
            NodeKind::DiagramObject {
                element: Some(NodeId::intern("pd_a")),
                bounds: Bounds::new(10, 20, 120, 55),
            }
        );
        assert_eq!(oa.style.fill_color, Some(Color::rgb(255, 255, 181)));
        assert!(graph.get(NodeId::intern("pd_ob")).unwrap().locked);
        let note = graph.get(NodeId::intern("pd_n")).unwrap();
        assert_eq!(note.name, "Sticky");
        assert_eq!(note.style.text_alignment, TextAlignment::Left);
        let conn = graph.get(NodeId::intern("pd_c")).unwrap();
        assert_eq!(conn.style.line_color, Some(Color::rgb(0, 0, 0)));
        assert_eq!(
            graph.views_referencing(NodeId::intern("pd_a")),
            vec![NodeId::intern("pd_v")]
        );
    }

    #[test]
    fn parse_escaped_strings() {
        let graph =
            parse_model("model @pe_root \"Say \\\"hi\\\"\" { purpose: \"a\\nb\" }").unwrap();
        assert_eq!(graph.root().name, "Say \"hi\"");
        assert!(matches!(
            &graph.root().kind,
            NodeKind::Model { purpose } if purpose == "a\nb"
        ));
    }

    #[test]
    fn error_reports_location() {
        let err = parse_model("model @pl_root \"M\" {\n  folder @pl_f nowhere \"X\"\n}")
            .unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "unknown folder type");
    }

    #[test]
    fn rejects_children_of_leaves() {
        let input = "model @rl_root {\n folder @rl_f business {\n  element @rl_e node \"N\" {\n   element @rl_x node\n  }\n }\n}";
        let err = parse_model(input).unwrap_err();
        assert_eq!(err.message, "this node cannot own children");
    }

    #[test]
    fn rejects_misplaced_attribute() {
        let err = parse_model("model @ra_root { fill: #FFFFFF }").unwrap_err();
        assert_eq!(err.message, "attribute does not apply to this node");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let input = "model @rd_root {\n folder @rd_f business {\n  element @rd_e node\n  element @rd_e device\n }\n}";
        let err = parse_model(input).unwrap_err();
        assert!(err.message.contains("already exists"), "{}", err.message);
    }

    #[test]
    fn rejects_trailing_garbage() {
        let err = parse_model("model @rt_root\nstray").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 1);
    }
}
