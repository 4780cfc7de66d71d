mod common;

use std::fs;
use std::sync::Arc;

use common::{Project, id};
use jindex_core::{IndexError, Indexer};
use jindex_java::JavaAnalyzer;
use tokio_util::sync::CancellationToken;

fn project() -> Project {
    Project::with_files(&[
        ("A.java", "class A { void foo() { B.bar(); } }\n"),
        ("B.java", "class B { void bar() {} }\n"),
    ])
}

#[tokio::test]
async fn index_survives_a_restart() {
    let project = project();
    {
        let indexer = project.indexer();
        indexer.run().await.unwrap();
    }

    let indexer = project.indexer();
    let callers = indexer.store().callers_of(&id("method:B.bar()")).unwrap();
    assert!(callers.contains(&id("method:A.foo()")));

    let summary = indexer.run().await.unwrap();
    assert!(summary.is_noop());
    assert_eq!(summary.parsed, 0);
}

#[tokio::test]
async fn corrupted_store_fails_fast_until_rebuilt() {
    let project = project();
    {
        let indexer = project.indexer();
        indexer.run().await.unwrap();
    }

    let path = project.index_file();
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, bytes).unwrap();

    let opened = Indexer::builder(project.config())
        .with_analyzer(Arc::new(JavaAnalyzer::new().unwrap()))
        .build();
    assert!(matches!(opened, Err(IndexError::StoreCorruption { .. })));

    let indexer = Indexer::builder(project.config())
        .with_analyzer(Arc::new(JavaAnalyzer::new().unwrap()))
        .rebuild(true)
        .build()
        .unwrap();
    let summary = indexer.run().await.unwrap();
    assert_eq!(summary.added, 2);
    assert!(indexer.store().get(&id("class:A")).is_ok());
}

#[tokio::test]
async fn a_second_writer_is_refused() {
    let project = project();
    let _first = project.indexer();
    let second = Indexer::builder(project.config())
        .with_analyzer(Arc::new(JavaAnalyzer::new().unwrap()))
        .build();
    assert!(matches!(second, Err(IndexError::StoreLocked(_))));
}

#[tokio::test]
async fn clear_forgets_everything() {
    let project = project();
    let indexer = project.indexer();
    indexer.run().await.unwrap();

    indexer.clear().unwrap();
    assert!(indexer.store().get(&id("class:A")).is_err());
    assert!(!project.index_file().exists());

    let summary = indexer.run().await.unwrap();
    assert_eq!(summary.added, 2);
}

#[tokio::test]
async fn cancelled_run_keeps_committed_state_and_resumes() {
    let project = project();
    let indexer = project.indexer();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = indexer.run_with_cancel(cancel).await.unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.parsed, 0);

    let resumed = indexer.run().await.unwrap();
    assert!(!resumed.cancelled);
    assert_eq!(resumed.added, 2);
    assert_eq!(resumed.parsed, 2);
    assert!(
        indexer
            .store()
            .callers_of(&id("method:B.bar()"))
            .unwrap()
            .contains(&id("method:A.foo()"))
    );
}
