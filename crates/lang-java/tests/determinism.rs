mod common;

use common::Project;

/// Cross-package calls, inheritance chains, an ambiguous simple name and a
/// class declared by two files.
fn sources() -> Vec<(String, String)> {
    let mut files = Vec::new();
    for pkg in ["alpha", "beta", "gamma"] {
        for n in 0..8 {
            let parent = if n > 0 {
                format!(" extends Node{}", n - 1)
            } else {
                String::new()
            };
            let body = format!(
                "package {pkg};\n\
                 import alpha.Node0;\n\
                 public class Node{n}{parent} {{\n\
                   private Shared shared;\n\
                   public void step{n}() {{ shared.touch(); Node0.start(); visit(); }}\n\
                   public void visit() {{ step{n}(); }}\n\
                   static void start() {{}}\n\
                 }}\n"
            );
            files.push((format!("src/{pkg}/Node{n}.java"), body));
        }
        files.push((
            format!("src/{pkg}/Shared.java"),
            format!("package {pkg};\npublic class Shared {{ public void touch() {{}} }}\n"),
        ));
    }
    files.push((
        "src/dup/one/Twin.java".into(),
        "package dup;\npublic class Twin { void a() {} }\n".into(),
    ));
    files.push((
        "src/dup/two/Twin.java".into(),
        "package dup;\npublic class Twin { void b() { touch(); } }\n".into(),
    ));
    files
}

async fn index_with(workers: usize) -> (Vec<String>, Vec<String>) {
    let project = Project::new();
    for (path, body) in sources() {
        project.write(&path, &body);
    }
    let mut config = project.config();
    config.workers = workers;
    let indexer = project.indexer_with(config);
    let summary = indexer.run().await.unwrap();
    assert_eq!(summary.failed_count(), 0);

    dump(&indexer)
}

fn dump(indexer: &jindex_core::Indexer) -> (Vec<String>, Vec<String>) {
    let state = indexer.store().snapshot().unwrap();
    let mut files: Vec<String> = state
        .files()
        .iter()
        .map(|(path, entry)| {
            format!(
                "{} {:?} {:?}",
                path.display(),
                entry.extraction,
                entry.links
            )
        })
        .collect();
    files.sort();

    let mut edges: Vec<String> = state
        .call_edges()
        .iter()
        .map(|e| format!("{e:?}"))
        .chain(state.inheritance_edges().iter().map(|e| format!("{e:?}")))
        .collect();
    edges.sort();
    (files, edges)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_count_does_not_change_the_index() {
    let single = index_with(1).await;
    assert!(!single.1.is_empty());
    for workers in [4, 16] {
        let parallel = index_with(workers).await;
        assert_eq!(parallel.0, single.0, "files differ with {workers} workers");
        assert_eq!(parallel.1, single.1, "edges differ with {workers} workers");
    }
}

const MOVES: usize = 6;

/// `Movedk` starts in `Yk.java` and ends up in `Zk.java`; `Uk.java` calls it
/// and never changes.
fn moving_sources(moved: bool) -> Vec<(String, String)> {
    let mut files = Vec::new();
    for k in 0..MOVES {
        let holder = format!("class Moved{k} {{ void m() {{}} }}\n");
        let (y, z) = if moved {
            (String::new(), holder)
        } else {
            (holder, String::new())
        };
        files.push((format!("src/a/Y{k}.java"), format!("package a;\nclass Y{k} {{}}\n{y}")));
        files.push((format!("src/a/Z{k}.java"), format!("package a;\nclass Z{k} {{}}\n{z}")));
        files.push((
            format!("src/a/U{k}.java"),
            format!("package a;\nclass U{k} {{ void f(Moved{k} x) {{ x.m(); }} }}\n"),
        ));
    }
    files
}

async fn index_after_move(workers: usize) -> (Vec<String>, Vec<String>) {
    let project = Project::new();
    for (path, body) in moving_sources(false) {
        project.write(&path, &body);
    }
    let mut config = project.config();
    config.workers = workers;
    let indexer = project.indexer_with(config);
    indexer.run().await.unwrap();

    for (path, body) in moving_sources(true) {
        project.write(&path, &body);
    }
    let summary = indexer.run().await.unwrap();
    assert_eq!(summary.modified, 2 * MOVES);
    assert_eq!(summary.unresolved, 0);
    dump(&indexer)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn declarations_moving_between_changed_files_keep_their_callers() {
    let fresh = {
        let project = Project::new();
        for (path, body) in moving_sources(true) {
            project.write(&path, &body);
        }
        let indexer = project.indexer();
        indexer.run().await.unwrap();
        dump(&indexer)
    };
    assert_eq!(
        fresh.1.iter().filter(|e| e.contains("Resolved")).count(),
        MOVES
    );

    for workers in [1, 4, 16] {
        let incremental = index_after_move(workers).await;
        assert_eq!(incremental.0, fresh.0, "files differ with {workers} workers");
        assert_eq!(incremental.1, fresh.1, "edges differ with {workers} workers");
    }
}
