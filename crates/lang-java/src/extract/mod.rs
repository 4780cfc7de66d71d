//! Tree walk that turns one parsed Java file into a [`FileExtraction`].
//!
//! The walk is file-local: receiver hints come from parameters, locals and
//! fields of the enclosing class chain, never from other files.

mod annotations;
mod calls;
mod declarations;

use std::collections::HashSet;
use std::path::Path;

use jindex_core::model::{EntityId, FileExtraction, Import, Range};
use tree_sitter::{Node, Tree};

/// A method or constructor whose body is walked for calls once every
/// declaration in the file is known.
struct PendingBody<'t> {
    caller: EntityId,
    class: EntityId,
    declaration: Node<'t>,
}

pub(crate) struct Extractor<'t> {
    source: &'t str,
    out: FileExtraction,
    seen: HashSet<EntityId>,
    bodies: Vec<PendingBody<'t>>,
}

impl<'t> Extractor<'t> {
    pub(crate) fn new(path: &Path, source: &'t str) -> Self {
        Self {
            source,
            out: FileExtraction::new(path),
            seen: HashSet::new(),
            bodies: Vec::new(),
        }
    }

    pub(crate) fn run(mut self, tree: &'t Tree) -> FileExtraction {
        let root = tree.root_node();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_declaration" => {
                    self.out.package = child
                        .named_children(&mut child.walk())
                        .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
                        .map(|n| self.text(n).to_string());
                }
                "import_declaration" => {
                    if let Some(import) = self.import(child) {
                        self.out.imports.push(import);
                    }
                }
                kind if declarations::is_type_declaration(kind) => {
                    self.declare_type(child, None);
                }
                _ => {}
            }
        }

        let bodies = std::mem::take(&mut self.bodies);
        for body in &bodies {
            self.collect_calls(body);
        }
        self.out
    }

    fn import(&self, node: Node<'t>) -> Option<Import> {
        let mut cursor = node.walk();
        let mut path = None;
        let mut is_static = false;
        let mut on_demand = false;
        for child in node.children(&mut cursor) {
            match child.kind() {
                "static" => is_static = true,
                "asterisk" => on_demand = true,
                "scoped_identifier" | "identifier" => path = Some(self.text(child).to_string()),
                _ => {}
            }
        }
        Some(Import {
            path: path?,
            is_static,
            on_demand,
        })
    }

    /// Records `id` as declared; `false` if the file already declares it.
    fn declare(&mut self, id: &EntityId) -> bool {
        self.seen.insert(id.clone())
    }

    fn text(&self, node: Node<'_>) -> &'t str {
        node.utf8_text(self.source.as_bytes()).unwrap_or_default()
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<&'t str> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }
}

fn range_of(node: Node<'_>) -> Range {
    let start = node.start_position();
    let end = node.end_position();
    Range::new(start.row, start.column, end.row, end.column)
}


#[cfg(test)]
mod tests {
    use super::test_support::extract;

    #[test]
    fn package_and_imports() {
        let x = extract(
            "package com.acme.app;\n\
             import java.util.List;\n\
             import com.acme.util.*;\n\
             import static java.util.Collections.emptyList;\n\
             class A {}\n",
        );
        assert_eq!(x.package.as_deref(), Some("com.acme.app"));
        assert_eq!(x.imports.len(), 3);
        assert_eq!(x.imports[0].path, "java.util.List");
        assert!(!x.imports[0].on_demand);
        assert_eq!(x.imports[1].path, "com.acme.util");
        assert!(x.imports[1].on_demand);
        assert!(x.imports[2].is_static);
        assert_eq!(x.imports[2].path, "java.util.Collections.emptyList");
    }

    #[test]
    fn default_package_has_none() {
        let x = extract("class A {}");
        assert_eq!(x.package, None);
        assert_eq!(x.classes[0].id.name, "A");
    }
}
