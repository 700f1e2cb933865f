use crate::env;
use crate::reference::*;
use crate::session::*;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Helper function to write a fake module file
fn write_assembly(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, b"MZ").expect("Failed to write assembly");
    path
}

fn create_cache() -> Arc<MetadataReferenceCache> {
    let documentation = Arc::new(DocumentationProviderRegistry::new(DiscoveredPaths::default()));
    Arc::new(MetadataReferenceCache::new(Vec::new(), documentation))
}

fn create_test_session(text: &str, working_directory: &Path) -> Arc<Session> {
    create_test_session_with(
        SessionOpenOptions::new(text, working_directory),
        &working_directory_resolver_factory(),
    )
}

fn create_test_session_with(options: SessionOpenOptions, factory: &ResolverFactory) -> Arc<Session> {
    Arc::new(create_session(
        Uuid::new_v4(),
        "Script1".to_string(),
        options,
        CompilationOptions::default(),
        Arc::new(DefaultReferenceSet::default()),
        factory,
    ))
}

/// Resolver that sleeps and records how many resolutions overlap
struct SlowResolver {
    target: String,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MetadataReferenceResolver for SlowResolver {
    async fn resolve_directive(&self, _reference: &str) -> Result<String, ReferenceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.target.clone())
    }
}

struct SlowResolverProbe {
    max_in_flight: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

fn slow_resolver_factory(target: PathBuf, delay: Duration) -> (ResolverFactory, SlowResolverProbe) {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = SlowResolverProbe {
        max_in_flight: max_in_flight.clone(),
        calls: calls.clone(),
    };
    let factory: ResolverFactory = Arc::new(move |_dir: &Path| -> Arc<dyn MetadataReferenceResolver> {
        Arc::new(SlowResolver {
            target: target.to_string_lossy().into_owned(),
            delay,
            in_flight: in_flight.clone(),
            max_in_flight: max_in_flight.clone(),
            calls: calls.clone(),
        })
    });
    (factory, probe)
}

async fn wait_for_pass(session: &Session, pass: u64) {
    for _ in 0..200 {
        if session.resolved().await.pass >= pass {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Reprocessing pass {} never completed", pass);
}

#[test]
fn test_scan_directives() {
    let text = "#r \"System.Data\"\n  #r \"lib/Foo.dll\"\n#load \"helpers.csx\"\n#region ignored\nvar x = \"#r \\\"nope\\\"\";\n";
    let directives = scan_directives(text);

    assert_eq!(directives.len(), 3);
    assert_eq!(directives[0].kind, DirectiveKind::Reference);
    assert_eq!(directives[0].value, "System.Data");
    assert_eq!(directives[0].line, 0);
    assert_eq!(directives[1].value, "lib/Foo.dll");
    assert_eq!(directives[1].line, 1);
    assert_eq!(directives[2].kind, DirectiveKind::Load);
    assert_eq!(directives[2].value, "helpers.csx");
}

#[tokio::test]
async fn test_working_directory_resolver() {
    let resolver = WorkingDirectoryResolver::new(PathBuf::from("/scripts"));

    assert_eq!(resolver.resolve_directive("System.Data").await.unwrap(), "System.Data");
    assert_eq!(
        resolver.resolve_directive("lib/Foo.dll").await.unwrap(),
        "/scripts/lib/Foo.dll"
    );
    assert_eq!(resolver.resolve_directive("Foo.dll").await.unwrap(), "/scripts/Foo.dll");
    assert_eq!(
        resolver.resolve_directive("/opt/Bar.dll").await.unwrap(),
        "/opt/Bar.dll"
    );
    assert!(resolver.resolve_directive("  ").await.is_err());

    let sources = SourceFileResolver::new(PathBuf::from("/scripts"));
    assert_eq!(sources.resolve("util.csx"), PathBuf::from("/scripts/util.csx"));
}

#[tokio::test]
async fn test_created_session_round_trips_text() {
    let temp_dir = TempDir::new().unwrap();
    let text = "var greeting = \"hello\";\nConsole.WriteLine(greeting);";
    let session = create_test_session(text, temp_dir.path());

    assert_eq!(&*session.text().await, text);
    assert_eq!(session.version().await, 0);
    assert_eq!(session.project().name, "Script1");
    assert_eq!(session.project().document_name, env::session::DOCUMENT_NAME);
    assert_eq!(session.working_directory(), temp_dir.path());
    assert!(session.references_directives().await.is_empty());
    assert!(!session.is_closed());
}

#[tokio::test]
async fn test_update_applies_and_notifies() {
    let temp_dir = TempDir::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let options = SessionOpenOptions::new("a", temp_dir.path()).on_text_changed(Arc::new(
        move |_id: SessionId, text: &str| {
            seen_clone.lock().unwrap().push(text.to_string());
        },
    ));
    let session = create_test_session_with(options, &working_directory_resolver_factory());

    let snapshot = session.snapshot().await;
    let version = update_session(&session, snapshot.with_text("ab")).await.unwrap();
    assert_eq!(version, 1);

    let snapshot = session.snapshot().await;
    let version = update_session(&session, snapshot.with_text("abc")).await.unwrap();
    assert_eq!(version, 2);

    assert_eq!(&*session.text().await, "abc");
    assert_eq!(*seen.lock().unwrap(), vec!["ab".to_string(), "abc".to_string()]);
}

#[tokio::test]
async fn test_stale_snapshot_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let session = create_test_session("original", temp_dir.path());

    let base = session.snapshot().await;
    let first = base.with_text("first edit");
    let second = base.with_text("second edit");

    update_session(&session, first).await.unwrap();
    let err = update_session(&session, second).await.unwrap_err();

    assert!(err.is_retryable());
    match err {
        SessionError::StaleSnapshot { based_on, current, .. } => {
            assert_eq!(based_on, 0);
            assert_eq!(current, 1);
        }
        other => panic!("Unexpected error: {:?}", other),
    }
    assert_eq!(&*session.text().await, "first edit");

    // Retrying against a fresh snapshot succeeds
    let fresh = session.snapshot().await;
    update_session(&session, fresh.with_text("second edit")).await.unwrap();
    assert_eq!(&*session.text().await, "second edit");
}

#[tokio::test]
async fn test_options_update_keeps_text() {
    let temp_dir = TempDir::new().unwrap();
    let session = create_test_session("text", temp_dir.path());

    let options = CompilationOptions {
        optimize: true,
        ..Default::default()
    };
    let snapshot = session.snapshot().await.with_options(options.clone());
    update_session(&session, snapshot).await.unwrap();

    let current = session.snapshot().await;
    assert_eq!(current.options, options);
    assert_eq!(&*current.text, "text");
}

#[tokio::test]
async fn test_update_on_closed_session() {
    let temp_dir = TempDir::new().unwrap();
    let session = create_test_session("text", temp_dir.path());
    session.close();

    let snapshot = session.snapshot().await.with_text("changed");
    let err = update_session(&session, snapshot).await.unwrap_err();
    assert!(matches!(err, SessionError::Closed(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_project_names_never_repeat() {
    let registry = Arc::new(SessionRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                (0..100)
                    .map(|_| registry.next_project_name())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut names = HashSet::new();
    for handle in handles {
        for name in handle.join().unwrap() {
            assert!(name.starts_with(env::session::PROJECT_NAME_PREFIX));
            assert!(names.insert(name));
        }
    }
    assert_eq!(names.len(), 800);
}

#[tokio::test]
async fn test_registry_insert_and_remove() {
    let temp_dir = TempDir::new().unwrap();
    let registry = SessionRegistry::new();
    let session = create_test_session("", temp_dir.path());
    let id = session.id();

    let callback: crate::diagnostics::DiagnosticsCallback = Arc::new(|_: &crate::diagnostics::DiagnosticsUpdated| {});
    assert!(registry.insert(session.clone(), Some(callback)));
    assert!(!registry.insert(session.clone(), None));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.notifier_count(), 1);
    assert!(registry.get(id).is_some());

    assert!(registry.remove(id).is_some());
    assert!(registry.get(id).is_none());
    assert!(registry.notifier(id).is_none());
    assert_eq!(registry.notifier_count(), 0);

    assert!(registry.remove(id).is_none());
}

#[tokio::test]
async fn test_reprocess_records_failures_and_continues() {
    let temp_dir = TempDir::new().unwrap();
    let good = write_assembly(temp_dir.path(), "Good.dll");
    write_assembly(temp_dir.path(), "Other.dll");
    std::fs::write(temp_dir.path().join("helpers.csx"), "// helpers").unwrap();
    let text = format!(
        "#r \"Missing.dll\"\n#r \"{}\"\n#r \"Other.dll\"\n#r \"Good.dll\"\n#load \"helpers.csx\"\n#load \"absent.csx\"\n",
        good.display()
    );
    let session = create_test_session(&text, temp_dir.path());
    let cache = create_cache();

    let report = reprocess_reference_directives(&session, &cache).await;

    assert!(report.committed);
    assert_eq!(report.pass, 1);
    assert_eq!(report.resolved, 2);

    let resolved = session.resolved().await;
    let directives: Vec<&str> = resolved.directives.iter().map(String::as_str).collect();
    assert_eq!(directives, vec![good.to_str().unwrap(), "Other.dll", "Good.dll"]);
    assert_eq!(resolved.references.len(), 2);
    assert_eq!(resolved.loaded_sources, vec![temp_dir.path().join("helpers.csx")]);

    let failure = resolved
        .diagnostics
        .iter()
        .find(|d| d.code == env::session::DIRECTIVE_FAILURE_CODE)
        .unwrap();
    assert!(failure.is_error());
    assert_eq!(failure.line, Some(0));
    assert!(failure.message.contains("Missing.dll"));
    assert!(
        resolved
            .diagnostics
            .iter()
            .any(|d| d.code == env::session::LOAD_FAILURE_CODE && d.line == Some(5))
    );

    assert!(session.has_directive_reference("Good").await);
    assert!(!session.has_directive_reference("Missing").await);
}

#[tokio::test]
async fn test_reprocess_result_discarded_after_close() {
    let temp_dir = TempDir::new().unwrap();
    write_assembly(temp_dir.path(), "Good.dll");
    let session = create_test_session("#r \"Good.dll\"", temp_dir.path());
    let cache = create_cache();

    session.close();
    let report = reprocess_reference_directives(&session, &cache).await;

    assert!(!report.committed);
    assert!(session.references_directives().await.is_empty());
    assert!(reprocess_now(&session, &cache).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_directive_set_swaps_atomically() {
    let temp_dir = TempDir::new().unwrap();
    for name in ["A1", "A2", "B1", "B2"] {
        write_assembly(temp_dir.path(), &format!("{}.dll", name));
    }
    let text_a = "#r \"A1.dll\"\n#r \"A2.dll\"\n";
    let text_b = "#r \"B1.dll\"\n#r \"B2.dll\"\n";
    let session = create_test_session(text_a, temp_dir.path());
    let cache = create_cache();

    let expected_a: HashSet<String> = ["A1.dll", "A2.dll"].iter().map(|s| s.to_string()).collect();
    let expected_b: HashSet<String> = ["B1.dll", "B2.dll"].iter().map(|s| s.to_string()).collect();

    let reader = {
        let session = session.clone();
        tokio::spawn(async move {
            let mut observed = 0;
            for _ in 0..500 {
                let set: HashSet<String> = session.references_directives().await.into_iter().collect();
                assert!(
                    set.is_empty() || set == expected_a || set == expected_b,
                    "Observed mixed directive set: {:?}",
                    set
                );
                observed += 1;
                tokio::task::yield_now().await;
            }
            observed
        })
    };

    for i in 0..50 {
        let text = if i % 2 == 0 { text_b } else { text_a };
        let snapshot = session.snapshot().await.with_text(text);
        update_session(&session, snapshot).await.unwrap();
        reprocess_now(&session, &cache).await.unwrap();
    }

    assert_eq!(reader.await.unwrap(), 500);
    assert_eq!(session.resolved().await.pass, 50);
}

#[tokio::test]
async fn test_scheduled_requests_coalesce() {
    let temp_dir = TempDir::new().unwrap();
    let target = write_assembly(temp_dir.path(), "Slow.dll");
    let (factory, probe) = slow_resolver_factory(target, Duration::from_millis(20));
    let session = create_test_session_with(
        SessionOpenOptions::new("#r \"Slow\"", temp_dir.path()),
        &factory,
    );
    let cache = create_cache();
    let runtime = tokio::runtime::Handle::current();

    // No await between requests: the spawned pass cannot start yet
    let outcomes: Vec<ScheduleOutcome> = (0..20)
        .map(|_| schedule_reprocess(session.clone(), cache.clone(), &runtime))
        .collect();

    assert_eq!(outcomes[0], ScheduleOutcome::Scheduled);
    assert!(outcomes[1..].iter().all(|o| *o == ScheduleOutcome::Coalesced));
    assert_eq!(session.reprocess.coalesced_requests(), 19);

    wait_for_pass(&session, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.resolved().await.pass, 1);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert!(!session.reprocess.is_pending());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_pass_in_flight_per_session() {
    let temp_dir = TempDir::new().unwrap();
    let target = write_assembly(temp_dir.path(), "Slow.dll");
    let (factory, probe) = slow_resolver_factory(target, Duration::from_millis(5));
    let session = create_test_session_with(
        SessionOpenOptions::new("#r \"Slow\"", temp_dir.path()),
        &factory,
    );
    let cache = create_cache();
    let runtime = tokio::runtime::Handle::current();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let (task_session, task_cache) = (session.clone(), cache.clone());
        handles.push(tokio::spawn(async move {
            reprocess_now(&task_session, &task_cache).await;
        }));
        schedule_reprocess(session.clone(), cache.clone(), &runtime);
    }
    futures::future::join_all(handles).await;
    wait_for_pass(&session, 11).await;

    assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_close_cancels_scheduled_pass() {
    let temp_dir = TempDir::new().unwrap();
    let target = write_assembly(temp_dir.path(), "Slow.dll");
    let (factory, probe) = slow_resolver_factory(target, Duration::from_millis(100));
    let session = create_test_session_with(
        SessionOpenOptions::new("#r \"Slow\"", temp_dir.path()),
        &factory,
    );
    let cache = create_cache();

    let outcome = schedule_reprocess(session.clone(), cache.clone(), &tokio::runtime::Handle::current());
    assert_eq!(outcome, ScheduleOutcome::Scheduled);

    // Let the pass start, then close while the resolver is sleeping
    for _ in 0..100 {
        if probe.calls.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    session.close();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(session.resolved().await.pass, 0);
    assert!(session.references_directives().await.is_empty());
    assert_eq!(
        schedule_reprocess(session.clone(), cache, &tokio::runtime::Handle::current()),
        ScheduleOutcome::Closed
    );
}
