use std::path::{Path, PathBuf};

use jindex_core::model::{EntityId, EntityKind, ParseStatus};
use jindex_core::query::GraphScope;
use jindex_core::store::IndexStore;
use jindex_core::{IndexerConfig, QueryEngine};

use crate::GraphFormat;
use crate::view::{AnnotationRow, CallerRow, EntityRow, ImpactRow, table};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Read-only view of a project's stored index. No writer lock is taken: a
/// save replaces the file atomically, so a reader sees one whole version.
fn engine(path: PathBuf) -> Result<QueryEngine, Box<dyn std::error::Error>> {
    let config = IndexerConfig::load(path)?;
    let index_path = config.index_path();
    if !index_path.exists() {
        return Err(format!(
            "no index for {}; run `jindex index` first",
            config.root.display()
        )
        .into());
    }
    let store = IndexStore::open(index_path)?;
    Ok(QueryEngine::new(store.snapshot()?))
}

fn parse_id(text: &str) -> Result<EntityId, Box<dyn std::error::Error>> {
    Ok(text.parse::<EntityId>()?)
}

pub fn refs(path: PathBuf, id: &str, unresolved: bool) -> CliResult {
    let engine = engine(path)?;
    let callers = engine.references(&parse_id(id)?, unresolved)?;
    if callers.is_empty() {
        println!("No callers of {id}.");
    } else {
        println!("{}", table(callers.iter().map(CallerRow::from).collect()));
    }
    Ok(())
}

pub fn impact(path: PathBuf, id: &str, depth: usize) -> CliResult {
    let engine = engine(path)?;
    let reached = engine.impact(&parse_id(id)?, depth)?;
    if reached.is_empty() {
        println!("Nothing depends on {id}.");
    } else {
        println!("{}", table(reached.iter().map(ImpactRow::from).collect()));
    }
    Ok(())
}

pub fn graph(
    path: PathBuf,
    format: GraphFormat,
    package: Option<String>,
    resolved_only: bool,
    output: Option<PathBuf>,
) -> CliResult {
    let engine = engine(path)?;
    let scope = GraphScope {
        package,
        include_unresolved: !resolved_only,
        ..GraphScope::all()
    };
    let graph = engine.dependency_graph(&scope);
    let rendered = match format {
        GraphFormat::Json => graph.to_json()?,
        GraphFormat::Dot => graph.to_dot(),
    };
    match output {
        Some(file) => {
            std::fs::write(&file, rendered)?;
            println!(
                "Wrote {} nodes and {} edges to {}",
                graph.nodes.len(),
                graph.edges.len(),
                file.display()
            );
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

pub fn stats(path: PathBuf) -> CliResult {
    let engine = engine(path)?;
    let stats = engine.stats();
    println!("Files:             {}", stats.files);
    println!("Failed files:      {}", stats.failed_files);
    println!("Classes:           {}", stats.classes);
    println!("Methods:           {}", stats.methods);
    println!("Fields:            {}", stats.fields);
    println!("Call edges:        {}", stats.call_edges);
    println!("Inheritance edges: {}", stats.inheritance_edges);
    println!("Unresolved:        {}", stats.unresolved);
    Ok(())
}

pub fn find(path: PathBuf, name: &str, kind: Option<&str>) -> CliResult {
    let kind = kind.map(str::parse::<EntityKind>).transpose()?;
    let engine = engine(path)?;
    let ids = engine.find(name, kind);
    if ids.is_empty() {
        println!("Nothing named {name}.");
        return Ok(());
    }
    let rows: Vec<EntityRow> = ids
        .iter()
        .filter_map(|id| engine.get(id).ok())
        .map(|entity| EntityRow::from(&entity))
        .collect();
    println!("{}", table(rows));
    Ok(())
}

pub fn outline(path: PathBuf, file: &Path) -> CliResult {
    let engine = engine(path)?;
    let outline = engine.outline(file)?;
    println!("File:        {}", outline.path.display());
    println!(
        "Package:     {}",
        outline.package.as_deref().unwrap_or("(default)")
    );
    match &outline.status {
        ParseStatus::Ok => println!("Status:      ok"),
        ParseStatus::Failed(failure) => println!("Status:      failed ({failure})"),
    }
    if let Some(fingerprint) = outline.fingerprint {
        println!("Fingerprint: {}", fingerprint.to_hex());
    }
    println!("Unresolved:  {}", outline.unresolved);
    for import in &outline.imports {
        let star = if import.on_demand { ".*" } else { "" };
        let prefix = if import.is_static { "static " } else { "" };
        println!("import {prefix}{}{star}", import.path);
    }
    if !outline.entities.is_empty() {
        println!(
            "{}",
            table(outline.entities.iter().map(EntityRow::from).collect())
        );
    }
    Ok(())
}

pub fn annotated(path: PathBuf, name: &str) -> CliResult {
    let engine = engine(path)?;
    let found = engine.annotated_with(name);
    if found.is_empty() {
        println!("No entity is annotated with {name}.");
    } else {
        println!("{}", table(found.iter().map(AnnotationRow::from).collect()));
    }
    Ok(())
}
