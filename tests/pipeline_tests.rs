//! Pipeline scheduling tests against the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use registrar::{
    Artifact, ArtifactKind, Entry, EntryContext, EventKind, MemorySink, Producer, Registrar,
    RegistrarError, Side, Sides,
};

const SHAPE: ArtifactKind = ArtifactKind::new("shape", Side::Server);
const COLOR: ArtifactKind = ArtifactKind::new("color", Side::Server);
const LABEL: ArtifactKind = ArtifactKind::new("label", Side::Client);

struct Widget {
    size: u32,
}

impl Entry for Widget {
    type Properties = u32;
    const KIND: &'static str = "widget";

    fn initial_properties() -> u32 {
        1
    }
}

fn widget(owner: &Registrar, name: &str) -> registrar::Builder<Widget, ()> {
    owner.entry(name, |size| Ok(Widget { size }))
}

/// Records `<kind>:<entry>:start|end` around a short sleep
fn traced(trace: &Arc<Mutex<Vec<String>>>, kind: ArtifactKind) -> Producer<Widget> {
    let trace = Arc::clone(trace);
    Producer::new(move |ctx: EntryContext<Widget>| {
        let trace = Arc::clone(&trace);
        async move {
            trace.lock().push(format!("{kind}:{}:start", ctx.name()));
            tokio::time::sleep(Duration::from_millis(5 * ctx.entry().size as u64)).await;
            trace.lock().push(format!("{kind}:{}:end", ctx.name()));
            Ok(vec![Artifact::json(
                format!("{kind}/{}.json", ctx.name()),
                json!({ "size": ctx.entry().size }),
            )])
        }
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn levels_are_join_barriers() {
    let owner = Registrar::new("test").unwrap();
    let trace = Arc::new(Mutex::new(Vec::new()));

    for (name, size) in [("slow", 4), ("fast", 1)] {
        widget(&owner, name)
            .no_lang()
            .properties(move |_| size)
            .set_artifact(SHAPE, traced(&trace, SHAPE))
            .set_dependent_artifact(COLOR, SHAPE, None, traced(&trace, COLOR))
            .set_dependent_artifact(LABEL, COLOR, None, traced(&trace, LABEL))
            .register()
            .unwrap();
    }

    let report = owner
        .generate(Arc::new(MemorySink::new()), &Sides::all())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.emitted.len(), 6);

    let trace = trace.lock().clone();
    let last = |prefix: &str| trace.iter().rposition(|t| t.starts_with(prefix)).unwrap();
    let first = |prefix: &str| trace.iter().position(|t| t.starts_with(prefix)).unwrap();
    assert!(last("shape:") < first("color:"));
    assert!(last("color:") < first("label:"));
}

#[tokio::test]
async fn dependency_output_is_per_entry() {
    let owner = Registrar::new("test").unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for name in ["a", "b"] {
        let seen = Arc::clone(&seen);
        widget(&owner, name)
            .no_lang()
            .set_artifact(
                SHAPE,
                Producer::from_fn(|ctx: &EntryContext<Widget>| {
                    Ok(vec![Artifact::json(format!("shape/{}.json", ctx.name()), json!({}))])
                }),
            )
            .set_dependent_artifact(
                COLOR,
                SHAPE,
                None,
                Producer::from_fn(move |ctx: &EntryContext<Widget>| {
                    let dep = ctx.dependency().map(|d| d[0].id.clone());
                    seen.lock().push((ctx.name().to_string(), dep));
                    Ok(Vec::new())
                }),
            )
            .register()
            .unwrap();
    }

    owner
        .generate(Arc::new(MemorySink::new()), &Sides::all())
        .await
        .unwrap();

    let mut seen = seen.lock().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("a".to_string(), Some("shape/a.json".to_string())),
            ("b".to_string(), Some("shape/b.json".to_string())),
        ]
    );
}

#[tokio::test]
async fn cycle_runs_nothing() {
    let owner = Registrar::new("test").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counting = || {
        let calls = Arc::clone(&calls);
        Producer::from_fn(move |_: &EntryContext<Widget>| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        })
    };

    widget(&owner, "w")
        .set_dependent_artifact(SHAPE, COLOR, None, counting())
        .set_dependent_artifact(COLOR, SHAPE, None, counting())
        .register()
        .unwrap();

    let err = owner
        .generate(Arc::new(MemorySink::new()), &Sides::all())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrarError::CyclicDependency { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn inactive_dependency_yields_none_and_does_not_block() {
    let owner = Registrar::new("test").unwrap();
    let got_none = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&got_none);

    widget(&owner, "w")
        .no_lang()
        .set_artifact(
            SHAPE,
            Producer::from_fn(|_| Ok(vec![Artifact::json("shape.json", json!({}))])),
        )
        .set_dependent_artifact(
            LABEL,
            SHAPE,
            None,
            Producer::from_fn(move |ctx: &EntryContext<Widget>| {
                if ctx.dependency().is_none() {
                    flag.fetch_add(1, Ordering::SeqCst);
                }
                Ok(vec![Artifact::json("label.json", json!({}))])
            }),
        )
        .register()
        .unwrap();

    let sink = Arc::new(MemorySink::new());
    let report = owner.generate(sink.clone(), &Sides::client_only()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(got_none.load(Ordering::SeqCst), 1);
    assert_eq!(sink.ids(), vec!["label.json"]);
}

#[tokio::test]
async fn duplicate_output_does_not_stop_siblings() {
    let owner = Registrar::new("test").unwrap();
    for name in ["one", "two", "three"] {
        let id = if name == "three" { "unique.json" } else { "clash.json" };
        widget(&owner, name)
            .no_lang()
            .set_artifact(
                SHAPE,
                Producer::from_fn(move |_| Ok(vec![Artifact::json(id, json!({}))])),
            )
            .register()
            .unwrap();
    }

    let pipeline = owner.pipeline(&Sides::all()).unwrap();
    let report = pipeline.run(Arc::new(MemorySink::new())).await.unwrap();

    assert_eq!(report.emitted, vec!["clash.json", "unique.json"]);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        RegistrarError::DuplicateOutput { .. }
    ));
    assert!(matches!(
        report.ensure_success(),
        Err(RegistrarError::RunFailed { count: 1 })
    ));

    let duplicates = pipeline
        .event_log()
        .events()
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::DuplicateOutput { .. }))
        .count();
    assert_eq!(duplicates, 1);
}

#[tokio::test]
async fn failing_construction_is_a_producer_failure() {
    let owner = Registrar::new("test").unwrap();
    owner
        .entry::<Widget, _>("broken", |_| anyhow::bail!("missing texture"))
        .no_lang()
        .set_artifact(SHAPE, Producer::noop())
        .register()
        .unwrap();
    widget(&owner, "fine")
        .no_lang()
        .set_artifact(
            SHAPE,
            Producer::from_fn(|_| Ok(vec![Artifact::json("fine.json", json!({}))])),
        )
        .register()
        .unwrap();

    let report = owner
        .generate(Arc::new(MemorySink::new()), &Sides::all())
        .await
        .unwrap();
    assert_eq!(report.emitted, vec!["fine.json"]);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.to_string().contains("missing texture"));
}
