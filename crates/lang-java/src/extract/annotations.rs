use std::collections::BTreeMap;

use jindex_core::model::{Annotation, EntityId};
use tree_sitter::Node;

use super::Extractor;

impl<'t> Extractor<'t> {
    /// Keyword modifiers and annotations from the `modifiers` child of a
    /// declaration.
    pub(super) fn modifiers(&self, node: Node<'t>, target: &EntityId) -> (Vec<String>, Vec<Annotation>) {
        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();
        let mut cursor = node.walk();
        let Some(list) = node
            .children(&mut cursor)
            .find(|c| c.kind() == "modifiers")
        else {
            return (modifiers, annotations);
        };

        let mut cursor = list.walk();
        for child in list.children(&mut cursor) {
            match child.kind() {
                "marker_annotation" | "annotation" => {
                    if let Some(annotation) = self.annotation(child, target) {
                        annotations.push(annotation);
                    }
                }
                kind if !child.is_named() => modifiers.push(kind.to_string()),
                _ => {}
            }
        }
        (modifiers, annotations)
    }

    fn annotation(&self, node: Node<'t>, target: &EntityId) -> Option<Annotation> {
        let name = self.field_text(node, "name")?.to_string();
        let mut arguments = BTreeMap::new();
        if let Some(list) = node.child_by_field_name("arguments") {
            let mut cursor = list.walk();
            for arg in list.named_children(&mut cursor) {
                match arg.kind() {
                    "element_value_pair" => {
                        if let (Some(key), Some(value)) =
                            (self.field_text(arg, "key"), self.field_text(arg, "value"))
                        {
                            arguments.insert(key.to_string(), value.to_string());
                        }
                    }
                    "line_comment" | "block_comment" => {}
                    _ => {
                        arguments.insert("value".to_string(), self.text(arg).to_string());
                    }
                }
            }
        }
        Some(Annotation {
            name,
            arguments,
            target: target.clone(),
        })
    }
}
