//! Java front end: `tree-sitter-java` parsing and entity extraction.

mod extract;
mod naming;
pub mod parser;
mod queries;

use std::path::Path;

use jindex_core::error::{IndexError, Result};
use jindex_core::model::{FileExtraction, ParseFailure};
use jindex_core::SourceAnalyzer;

use crate::extract::Extractor;
use crate::parser::JavaParser;

pub struct JavaAnalyzer {
    parser: JavaParser,
}

impl JavaAnalyzer {
    pub fn new() -> Result<Self> {
        let parser = JavaParser::new()
            .map_err(|e| IndexError::Internal(format!("java query failed to compile: {e}")))?;
        Ok(Self { parser })
    }
}

impl SourceAnalyzer for JavaAnalyzer {
    fn language(&self) -> &str {
        "java"
    }

    fn extensions(&self) -> &[&str] {
        &["java"]
    }

    fn analyze(&self, path: &Path, source: &[u8]) -> std::result::Result<FileExtraction, ParseFailure> {
        let source = std::str::from_utf8(source)
            .map_err(|_| ParseFailure::at("file is not valid UTF-8", 1, 1))?;
        let tree = self.parser.parse(source)?;
        let mut extraction = Extractor::new(path, source).run(&tree);
        extraction.identifiers = self.parser.identifiers(&tree, source);
        tracing::trace!(
            path = %path.display(),
            entities = extraction.entity_count(),
            calls = extraction.calls.len(),
            "extracted"
        );
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_records_path_and_identifiers() {
        let analyzer = JavaAnalyzer::new().unwrap();
        let x = analyzer
            .analyze(
                Path::new("src/A.java"),
                b"package p; class A { void f() { g(); } void g() {} }",
            )
            .unwrap();
        assert_eq!(x.path, Path::new("src/A.java"));
        assert!(x.classes.iter().all(|c| c.file == Path::new("src/A.java")));
        assert_eq!(x.identifiers, vec!["A", "f", "g", "p"]);
        assert_eq!(x.calls.len(), 1);
    }

    #[test]
    fn invalid_utf8_fails_at_the_first_position() {
        let analyzer = JavaAnalyzer::new().unwrap();
        let failure = analyzer
            .analyze(Path::new("Bad.java"), &[0x63, 0x6c, 0xff, 0xfe])
            .unwrap_err();
        let location = failure.location.unwrap();
        assert_eq!((location.line, location.column), (1, 1));
    }
}
