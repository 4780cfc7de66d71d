use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::id::{EntityId, EntityKind, Range};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    /// Argument key/value pairs as written; a lone unnamed argument is keyed `value`.
    pub arguments: BTreeMap<String, String>,
    pub target: EntityId,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClassFlavor {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClassEntity {
    pub id: EntityId,
    pub name: String,
    pub flavor: ClassFlavor,
    pub file: PathBuf,
    pub span: Range,
    pub modifiers: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub type_parameters: Vec<String>,
    /// Raw `extends` type as written (classes only).
    pub superclass: Option<String>,
    /// Raw `implements` names, or `extends` names for interfaces.
    pub interfaces: Vec<String>,
    pub enclosing: Option<EntityId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MethodEntity {
    pub id: EntityId,
    pub name: String,
    pub class: EntityId,
    pub file: PathBuf,
    pub span: Range,
    pub modifiers: Vec<String>,
    pub annotations: Vec<Annotation>,
    /// `None` for constructors.
    pub return_type: Option<String>,
    pub parameters: Vec<String>,
    pub is_constructor: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldEntity {
    pub id: EntityId,
    pub name: String,
    pub class: EntityId,
    pub file: PathBuf,
    pub span: Range,
    pub modifiers: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub type_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Class(ClassEntity),
    Method(MethodEntity),
    Field(FieldEntity),
}

impl Entity {
    pub fn id(&self) -> &EntityId {
        match self {
            Entity::Class(c) => &c.id,
            Entity::Method(m) => &m.id,
            Entity::Field(f) => &f.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.id().kind
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Class(c) => &c.name,
            Entity::Method(m) => &m.name,
            Entity::Field(f) => &f.name,
        }
    }

    pub fn file(&self) -> &Path {
        match self {
            Entity::Class(c) => &c.file,
            Entity::Method(m) => &m.file,
            Entity::Field(f) => &f.file,
        }
    }

    pub fn span(&self) -> Range {
        match self {
            Entity::Class(c) => c.span,
            Entity::Method(m) => m.span,
            Entity::Field(f) => f.span,
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        match self {
            Entity::Class(c) => &c.annotations,
            Entity::Method(m) => &m.annotations,
            Entity::Field(f) => &f.annotations,
        }
    }

    /// The class that declares this member, or the enclosing class of a nested type.
    pub fn owner(&self) -> Option<&EntityId> {
        match self {
            Entity::Class(c) => c.enclosing.as_ref(),
            Entity::Method(m) => Some(&m.class),
            Entity::Field(f) => Some(&f.class),
        }
    }

    pub fn as_class(&self) -> Option<&ClassEntity> {
        match self {
            Entity::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodEntity> {
        match self {
            Entity::Method(m) => Some(m),
            _ => None,
        }
    }
}
