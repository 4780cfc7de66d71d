use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::entity::{ClassEntity, Entity, FieldEntity, MethodEntity};
use super::id::{EntityId, Range};
use super::source::ParseFailure;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Dotted path without the trailing `.*`.
    pub path: String,
    pub is_static: bool,
    pub on_demand: bool,
}

impl Import {
    pub fn single(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_static: false,
            on_demand: false,
        }
    }

    pub fn on_demand(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_static: false,
            on_demand: true,
        }
    }

    pub fn simple_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// What the extractor could tell about the object a method is invoked on.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "receiver", content = "type", rename_all = "lowercase")]
pub enum Receiver {
    /// No receiver or `this`: the enclosing class chain.
    Enclosing,
    /// `super.m()`: supertypes of the enclosing class.
    Super,
    /// A type name as written in the file (`Repo`, `java.util.List`, `Outer.Inner`).
    Type(String),
    Unknown,
}

/// A call site, unresolved. Overloads are never disambiguated, so only the
/// argument count is kept.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RawCall {
    pub caller: EntityId,
    /// Class declaring the caller.
    pub scope: EntityId,
    pub name: String,
    pub arguments: usize,
    pub receiver: Receiver,
    pub span: Range,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SuperRelation {
    Extends,
    Implements,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RawSupertype {
    pub class: EntityId,
    pub name: String,
    pub relation: SuperRelation,
}

/// Everything one file contributes to the index, before linking.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FileExtraction {
    pub path: PathBuf,
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub classes: Vec<ClassEntity>,
    pub methods: Vec<MethodEntity>,
    pub fields: Vec<FieldEntity>,
    pub calls: Vec<RawCall>,
    pub supertypes: Vec<RawSupertype>,
    /// Distinct identifiers appearing in the file, sorted.
    pub identifiers: Vec<String>,
}

impl FileExtraction {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn entity_count(&self) -> usize {
        self.classes.len() + self.methods.len() + self.fields.len()
    }

    /// Declared entities, classes first, in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.classes
            .iter()
            .cloned()
            .map(Entity::Class)
            .chain(self.methods.iter().cloned().map(Entity::Method))
            .chain(self.fields.iter().cloned().map(Entity::Field))
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &EntityId> + '_ {
        self.classes
            .iter()
            .map(|c| &c.id)
            .chain(self.methods.iter().map(|m| &m.id))
            .chain(self.fields.iter().map(|f| &f.id))
    }

    pub fn find_entity(&self, id: &EntityId) -> Option<Entity> {
        use super::id::EntityKind;
        match id.kind {
            EntityKind::Class => self
                .classes
                .iter()
                .find(|c| &c.id == id)
                .cloned()
                .map(Entity::Class),
            EntityKind::Method => self
                .methods
                .iter()
                .find(|m| &m.id == id)
                .cloned()
                .map(Entity::Method),
            EntityKind::Field => self
                .fields
                .iter()
                .find(|f| &f.id == id)
                .cloned()
                .map(Entity::Field),
        }
    }

    pub fn class(&self, id: &EntityId) -> Option<&ClassEntity> {
        self.classes.iter().find(|c| &c.id == id)
    }
}

/// Result of analysing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(FileExtraction),
    Failed(ParseFailure),
}

impl From<Result<FileExtraction, ParseFailure>> for ParseOutcome {
    fn from(result: Result<FileExtraction, ParseFailure>) -> Self {
        match result {
            Ok(extraction) => ParseOutcome::Parsed(extraction),
            Err(failure) => ParseOutcome::Failed(failure),
        }
    }
}
