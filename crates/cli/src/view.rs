use jindex_core::model::{Entity, Range};
use jindex_core::query::{AnnotatedEntity, Caller, ImpactEntry};
use jindex_core::runtime::FailedFile;
use tabled::settings::Style;
use tabled::{Table, Tabled};

pub fn table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::psql()).to_string()
}

#[derive(Tabled)]
pub struct FailureRow {
    #[tabled(rename = "File")]
    path: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl From<&FailedFile> for FailureRow {
    fn from(failed: &FailedFile) -> Self {
        Self {
            path: failed.path.display().to_string(),
            reason: failed.reason.clone(),
        }
    }
}

#[derive(Tabled)]
pub struct CallerRow {
    #[tabled(rename = "Caller")]
    id: String,
    #[tabled(rename = "Resolved")]
    resolved: String,
}

impl From<&Caller> for CallerRow {
    fn from(caller: &Caller) -> Self {
        Self {
            id: caller.id.to_string(),
            resolved: if caller.resolved { "yes" } else { "no" }.to_string(),
        }
    }
}

#[derive(Tabled)]
pub struct ImpactRow {
    #[tabled(rename = "Depth")]
    depth: usize,
    #[tabled(rename = "Entity")]
    id: String,
}

impl From<&ImpactEntry> for ImpactRow {
    fn from(entry: &ImpactEntry) -> Self {
        Self {
            depth: entry.depth,
            id: entry.id.to_string(),
        }
    }
}

#[derive(Tabled)]
pub struct EntityRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Id")]
    id: String,
}

impl From<&Entity> for EntityRow {
    fn from(entity: &Entity) -> Self {
        Self {
            kind: entity.kind().to_string(),
            name: entity.name().to_string(),
            location: location(entity.file().display(), entity.span()),
            id: entity.id().to_string(),
        }
    }
}

#[derive(Tabled)]
pub struct AnnotationRow {
    #[tabled(rename = "Entity")]
    id: String,
    #[tabled(rename = "Annotation")]
    annotation: String,
}

impl From<&AnnotatedEntity> for AnnotationRow {
    fn from(found: &AnnotatedEntity) -> Self {
        let arguments: Vec<String> = found
            .annotation
            .arguments
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        let annotation = if arguments.is_empty() {
            format!("@{}", found.annotation.name)
        } else {
            format!("@{}({})", found.annotation.name, arguments.join(", "))
        };
        Self {
            id: found.id.to_string(),
            annotation,
        }
    }
}

/// `path:line`, one-based.
fn location(path: impl std::fmt::Display, span: Range) -> String {
    format!("{}:{}", path, span.start_line + 1)
}
