use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityKind {
    Class,
    Method,
    Field,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Class => "class",
            EntityKind::Method => "method",
            EntityKind::Field => "field",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "class" => Ok(EntityKind::Class),
            "method" => Ok(EntityKind::Method),
            "field" => Ok(EntityKind::Field),
            other => Err(format!("unknown entity kind '{other}'")),
        }
    }
}

/// Stable entity identity: `(kind, qualified name)`.
///
/// Method names carry their erased parameter list, `com.acme.Repo.find(String,int)`,
/// so overloads get distinct ids. The textual form is `kind:qualified-name`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub kind: EntityKind,
    pub name: String,
}

impl EntityId {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Class, name)
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Method, name)
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Field, name)
    }

    /// Qualified name without a method's parameter list.
    fn path_part(&self) -> &str {
        match self.kind {
            EntityKind::Method => self.name.split('(').next().unwrap_or(&self.name),
            _ => &self.name,
        }
    }

    /// Last segment of the qualified name (`bar` for `method:a.B.bar(int)`).
    pub fn simple_name(&self) -> &str {
        let path = self.path_part();
        path.rsplit('.').next().unwrap_or(path)
    }

    /// Qualified name of the enclosing scope (`a.B` for `method:a.B.bar(int)`).
    pub fn parent_name(&self) -> Option<&str> {
        self.path_part().rsplit_once('.').map(|(parent, _)| parent)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

impl FromStr for EntityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| format!("expected 'kind:qualified.name', got '{s}'"))?;
        if name.is_empty() {
            return Err(format!("missing qualified name in '{s}'"));
        }
        Ok(Self::new(kind.parse()?, name))
    }
}

/// Zero-based span of a declaration, as reported by the parser.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Range {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Range {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    pub fn contains(&self, line: usize, col: usize) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && col < self.start_col {
            return false;
        }
        if line == self.end_line && col > self.end_col {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_text_roundtrip() {
        let id: EntityId = "METHOD:com.acme.Repo.find(String,int)".parse().unwrap();
        assert_eq!(id.kind, EntityKind::Method);
        assert_eq!(id.to_string(), "method:com.acme.Repo.find(String,int)");
        assert_eq!(id.to_string().parse::<EntityId>().unwrap(), id);
    }

    #[test]
    fn simple_and_parent_names_ignore_parameter_dots() {
        let id = EntityId::method("a.B.bar(java.util.List)");
        assert_eq!(id.simple_name(), "bar");
        assert_eq!(id.parent_name(), Some("a.B"));

        let top = EntityId::class("Standalone");
        assert_eq!(top.simple_name(), "Standalone");
        assert_eq!(top.parent_name(), None);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!("com.acme.Repo".parse::<EntityId>().is_err());
        assert!("widget:com.acme.Repo".parse::<EntityId>().is_err());
        assert!("class:".parse::<EntityId>().is_err());
    }

    #[test]
    fn range_contains_is_inclusive() {
        let range = Range::new(2, 4, 5, 1);
        assert!(range.contains(2, 4));
        assert!(range.contains(5, 1));
        assert!(!range.contains(2, 3));
        assert!(!range.contains(6, 0));
    }
}
