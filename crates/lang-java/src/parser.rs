use std::sync::Arc;

use jindex_core::model::ParseFailure;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

use crate::queries::JAVA_IDENTIFIERS_SCM;

/// Grammar and compiled queries, shared by every worker. A
/// [`tree_sitter::Parser`] is created per call and never shared.
#[derive(Clone)]
pub struct JavaParser {
    language: Language,
    identifier_query: Arc<Query>,
}

impl JavaParser {
    pub fn new() -> Result<Self, tree_sitter::QueryError> {
        let language: Language = tree_sitter_java::LANGUAGE.into();
        let identifier_query = Query::new(&language, JAVA_IDENTIFIERS_SCM)?;
        Ok(Self {
            language,
            identifier_query: Arc::new(identifier_query),
        })
    }

    /// Parses `source`. A tree with any `ERROR` or `MISSING` node is a
    /// failure located at the first such node.
    pub fn parse(&self, source: &str) -> Result<Tree, ParseFailure> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| ParseFailure::new(format!("grammar load failed: {e}")))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ParseFailure::new("parser produced no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(match first_error(root) {
                Some(node) => {
                    let pos = node.start_position();
                    let reason = if node.is_missing() {
                        format!("missing {}", node.kind())
                    } else {
                        "syntax error".to_string()
                    };
                    ParseFailure::at(reason, pos.row + 1, pos.column + 1)
                }
                None => ParseFailure::new("syntax error"),
            });
        }
        Ok(tree)
    }

    /// Distinct identifiers in the file, sorted.
    pub fn identifiers(&self, tree: &Tree, source: &str) -> Vec<String> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.identifier_query, tree.root_node(), source.as_bytes());
        let mut names = std::collections::BTreeSet::new();
        while let Some(mat) = matches.next() {
            for cap in mat.captures {
                if let Ok(text) = cap.node.utf8_text(source.as_bytes()) {
                    names.insert(text.to_string());
                }
            }
        }
        names.into_iter().collect()
    }
}

/// First `ERROR` or `MISSING` node in document order.
fn first_error<'t>(root: Node<'t>) -> Option<Node<'t>> {
    let mut cursor = root.walk();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if !node.has_error() {
            continue;
        }
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_source_parses() {
        let parser = JavaParser::new().unwrap();
        let tree = parser.parse("class A { void foo() { bar(); } }").unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn syntax_error_reports_one_based_location() {
        let parser = JavaParser::new().unwrap();
        let failure = parser
            .parse("class A {\n  void foo( {\n}\n")
            .unwrap_err();
        let location = failure.location.expect("location");
        assert!(location.line >= 1);
        assert!(location.column >= 1);
    }

    #[test]
    fn identifiers_are_distinct_and_sorted() {
        let parser = JavaParser::new().unwrap();
        let source = "class B { A a; void run() { a.go(); a.go(); } }";
        let tree = parser.parse(source).unwrap();
        assert_eq!(
            parser.identifiers(&tree, source),
            vec!["A", "B", "a", "go", "run"]
        );
    }
}
