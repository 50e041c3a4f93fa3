use super::{clean_doc, qualify, CommentExtractor, ExtractedComment, MemberKind};
use crate::error::{Error, Result};
use log::debug;
use std::path::PathBuf;
use tree_sitter::{Node, Parser};

const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

/// Comment extractor backed by the tree-sitter Java grammar.
pub struct SyntaxExtractor {
    parser: Parser,
}

impl SyntaxExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_java::LANGUAGE;
        parser
            .set_language(&language.into())
            .map_err(|e| Error::SourceParse {
                file: PathBuf::new(),
                message: e.to_string(),
            })?;
        Ok(Self { parser })
    }
}

impl CommentExtractor for SyntaxExtractor {
    fn extract(&mut self, source: &str) -> Result<Vec<ExtractedComment>> {
        let tree = self.parser.parse(source, None).ok_or_else(|| Error::SourceParse {
            file: PathBuf::new(),
            message: "parser produced no tree".to_string(),
        })?;
        let root = tree.root_node();

        let mut namespace = String::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if child.kind() == "package_declaration" {
                namespace = node_text(child, source)
                    .trim_start_matches("package")
                    .trim_end_matches(';')
                    .trim()
                    .to_string();
            }
        }

        let mut out = Vec::new();
        collect_types(root, source, &namespace, &mut out);
        debug!("Syntax extractor found {} documented members", out.len());
        Ok(out)
    }
}

fn collect_types(node: Node<'_>, source: &str, prefix: &str, out: &mut Vec<ExtractedComment>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if TYPE_DECLARATIONS.contains(&child.kind()) {
            visit_type(child, source, prefix, out);
        }
    }
}

fn visit_type(node: Node<'_>, source: &str, prefix: &str, out: &mut Vec<ExtractedComment>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let type_name = qualify(prefix, &node_text(name_node, source));
    if let Some(body) = node.child_by_field_name("body") {
        visit_body(body, source, &type_name, out);
    }
}

fn visit_body(body: Node<'_>, source: &str, type_name: &str, out: &mut Vec<ExtractedComment>) {
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        let kind = member.kind();
        if TYPE_DECLARATIONS.contains(&kind) {
            visit_type(member, source, type_name, out);
            continue;
        }
        match kind {
            "method_declaration" | "constructor_declaration" | "annotation_type_element_declaration" => {
                let Some(doc) = doc_comment(member, source) else {
                    continue;
                };
                if let Some(name) = member.child_by_field_name("name") {
                    out.push(ExtractedComment {
                        type_name: type_name.to_string(),
                        member: node_text(name, source),
                        kind: MemberKind::Method,
                        text: doc,
                    });
                }
            }
            "field_declaration" | "constant_declaration" => {
                let Some(doc) = doc_comment(member, source) else {
                    continue;
                };
                let mut declarators = member.walk();
                for declarator in member.children_by_field_name("declarator", &mut declarators) {
                    if let Some(name) = declarator.child_by_field_name("name") {
                        out.push(ExtractedComment {
                            type_name: type_name.to_string(),
                            member: node_text(name, source),
                            kind: MemberKind::Field,
                            text: doc.clone(),
                        });
                    }
                }
            }
            "enum_constant" => {
                let Some(doc) = doc_comment(member, source) else {
                    continue;
                };
                if let Some(name) = member.child_by_field_name("name") {
                    out.push(ExtractedComment {
                        type_name: type_name.to_string(),
                        member: node_text(name, source),
                        kind: MemberKind::Field,
                        text: doc,
                    });
                }
            }
            "enum_body_declarations" => visit_body(member, source, type_name, out),
            _ => {}
        }
    }
}

/// The cleaned `/** */` block directly preceding `node`, skipping line comments.
fn doc_comment(node: Node<'_>, source: &str) -> Option<String> {
    let mut previous = node.prev_sibling();
    while let Some(sibling) = previous {
        match sibling.kind() {
            "line_comment" => previous = sibling.prev_sibling(),
            "block_comment" | "comment" => {
                let text = node_text(sibling, source);
                return text.starts_with("/**").then(|| clean_doc(&text));
            }
            _ => return None,
        }
    }
    None
}

fn node_text(node: Node<'_>, source: &str) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    source.get(start..end).unwrap_or("").trim().to_string()
}
