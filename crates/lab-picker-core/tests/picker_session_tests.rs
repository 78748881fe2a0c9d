//! Session integration tests.
//!
//! Run on tokio's paused clock so debounce and latency timings are exact.

use std::sync::Arc;
use std::time::Duration;

use lab_picker_core::{
    AssociationStub, CatalogFilters, CatalogItem, PickerConfig, PickerPhase, PickerProps,
    PickerSession, SelectionSet, SessionError, StaticCatalog, TestId,
};
use tokio::sync::mpsc;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn lab_catalog() -> StaticCatalog {
    StaticCatalog::new(vec![
        CatalogItem::new(1, "Complete Blood Count").with_code("CBC").with_category("hematology"),
        CatalogItem::new(2, "Lipid Panel").with_code("LIPID").with_category("chemistry"),
        CatalogItem::new(3, "Xylose Absorption").with_code("XYL").with_category("chemistry"),
        CatalogItem::new(4, "Yeast Culture").with_code("YST").with_category("microbiology"),
    ])
}

/// Listener that forwards every emitted selection into a channel.
fn channel_listener() -> (
    impl FnMut(&SelectionSet) + Send + 'static,
    mpsc::UnboundedReceiver<Vec<i64>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = move |selection: &SelectionSet| {
        let _ = tx.send(selection.ids().iter().map(|id| id.get()).collect());
    };
    (listener, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Vec<i64>>) -> Vec<Vec<i64>> {
    let mut seen = Vec::new();
    while let Ok(ids) = rx.try_recv() {
        seen.push(ids);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn test_initial_browse_loads_page() {
    init_tracing();
    let catalog = Arc::new(lab_catalog());
    let (listener, _rx) = channel_listener();
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::default(),
        listener,
    );

    let mut snapshots = handle.subscribe();
    let snapshot = snapshots
        .wait_for(|s| s.phase == PickerPhase::Loaded)
        .await
        .unwrap()
        .clone();

    assert_eq!(snapshot.available.len(), 4);
    assert_eq!(snapshot.total, 4);
    assert!(snapshot.loaded_at.is_some());
    assert_eq!(catalog.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_response_discarded() {
    init_tracing();
    let catalog = Arc::new(
        lab_catalog()
            .with_latency("xylose", ms(500))
            .with_latency("yeast", ms(50)),
    );
    let (listener, _rx) = channel_listener();
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::default(),
        listener,
    );

    // F1 goes out at t=300 and answers at t=800
    handle.set_term("xylose").unwrap();
    tokio::time::sleep(ms(350)).await;

    // F2 goes out at t=650 and answers at t=700
    handle.set_term("yeast").unwrap();
    let mut snapshots = handle.subscribe();
    snapshots
        .wait_for(|s| s.phase == PickerPhase::Loaded && s.search.settled_term == "yeast")
        .await
        .unwrap();

    // Let F1 land
    tokio::time::sleep(ms(300)).await;

    let snapshot = handle.snapshot();
    assert_eq!(catalog.calls(), 3);
    assert_eq!(snapshot.search.settled_term, "yeast");
    let names: Vec<String> = snapshot.available.into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["Yeast Culture"]);
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_keystrokes_fetches_once() {
    let catalog = Arc::new(lab_catalog());
    let (listener, _rx) = channel_listener();
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::default(),
        listener,
    );

    for term in ["l", "li", "lip", "lipi", "lipid"] {
        handle.set_term(term).unwrap();
        tokio::time::sleep(ms(100)).await;
    }
    assert_eq!(handle.snapshot().phase, PickerPhase::Searching);

    tokio::time::sleep(ms(400)).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, PickerPhase::Loaded);
    assert_eq!(snapshot.search.settled_term, "lipid");
    // Browse plus one search
    assert_eq!(catalog.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cached_term_skips_network() {
    let catalog = Arc::new(lab_catalog());
    let (listener, _rx) = channel_listener();
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::default(),
        listener,
    );

    for term in ["cbc", "lipid", "cbc"] {
        handle.set_term(term).unwrap();
        tokio::time::sleep(ms(400)).await;
    }
    assert_eq!(catalog.calls(), 3);
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, PickerPhase::Loaded);
    assert_eq!(snapshot.available[0].id, TestId(1));

    // Past the freshness window the page is fetched again
    tokio::time::sleep(Duration::from_secs(31)).await;
    handle.set_term("lipid").unwrap();
    tokio::time::sleep(ms(400)).await;
    assert_eq!(catalog.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_failure_then_retry() {
    init_tracing();
    let catalog = Arc::new(lab_catalog());
    catalog.fail_next("503 Service Unavailable");
    let (listener, _rx) = channel_listener();
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::new(SelectionSet::from_ids([2_i64]), Vec::new()),
        listener,
    );

    let mut snapshots = handle.subscribe();
    let failed = snapshots
        .wait_for(|s| s.phase == PickerPhase::Error)
        .await
        .unwrap()
        .clone();
    assert!(failed.retryable);
    assert!(failed.available.is_empty());
    assert_eq!(failed.selected_ids, vec![TestId(2)]);

    handle.retry().unwrap();
    let loaded = snapshots
        .wait_for(|s| s.phase == PickerPhase::Loaded)
        .await
        .unwrap()
        .clone();
    assert!(loaded.error.is_none());
    assert_eq!(loaded.selected[0].name, "Lipid Panel");
    assert_eq!(catalog.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_filter_change_requeries() {
    let catalog = Arc::new(lab_catalog());
    let (listener, _rx) = channel_listener();
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::default(),
        listener,
    );
    tokio::time::sleep(ms(10)).await;

    handle
        .set_filters(CatalogFilters {
            category: Some("chemistry".into()),
            ..CatalogFilters::default()
        })
        .unwrap();
    tokio::time::sleep(ms(10)).await;

    let ids: Vec<i64> = handle.snapshot().available.iter().map(|i| i.id.get()).collect();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(catalog.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_selection_changes_reach_parent_once() {
    let catalog = Arc::new(lab_catalog());
    let (listener, mut rx) = channel_listener();
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::new(SelectionSet::from_ids([1_i64]), Vec::new()),
        listener,
    );

    handle.add(TestId(2)).unwrap();
    handle.add(TestId(2)).unwrap();
    handle.remove(TestId(1)).unwrap();
    handle.remove(TestId(1)).unwrap();
    tokio::time::sleep(ms(10)).await;

    assert_eq!(drain(&mut rx), vec![vec![1, 2], vec![2]]);

    let selection = handle.shutdown().await.unwrap();
    assert_eq!(selection.ids(), &[TestId(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_existing_stubs_resolve_off_page() {
    let catalog = Arc::new(lab_catalog());
    let (listener, _rx) = channel_listener();
    let existing = vec![
        AssociationStub::for_test(2).named("Lipid (old name)"),
        AssociationStub::with_id(99),
    ];
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::new(SelectionSet::from_ids([99_i64, 2, 500]), existing),
        listener,
    );

    handle.set_term("cbc").unwrap();
    tokio::time::sleep(ms(400)).await;

    let snapshot = handle.snapshot();
    let names: Vec<String> = snapshot.selected.into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["Test #99", "Lipid (old name)"]);
    assert_eq!(snapshot.selected_ids.len(), 3);
    assert_eq!(snapshot.available.len(), 1);

    // A page that carries id 2 replaces the stub's stale name
    handle.set_term("lipid").unwrap();
    tokio::time::sleep(ms(400)).await;
    let names: Vec<String> = handle.snapshot().selected.into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["Test #99", "Lipid Panel"]);
}

#[tokio::test(start_paused = true)]
async fn test_set_existing_updates_view_silently() {
    let catalog = Arc::new(lab_catalog());
    let (listener, mut rx) = channel_listener();
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::new(SelectionSet::from_ids([1_i64, 42]), Vec::new()),
        listener,
    );
    tokio::time::sleep(ms(10)).await;
    assert_eq!(handle.snapshot().selected.len(), 1);

    handle
        .set_existing(vec![
            AssociationStub::with_id(42).named("Retired assay"),
            AssociationStub::for_test(1).named("Old CBC"),
        ])
        .unwrap();
    tokio::time::sleep(ms(1)).await;

    let names: Vec<String> = handle.snapshot().selected.into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["Complete Blood Count", "Retired assay"]);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(catalog.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_search() {
    let catalog = Arc::new(lab_catalog());
    let (listener, _rx) = channel_listener();
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::default(),
        listener,
    );
    tokio::time::sleep(ms(10)).await;

    handle.set_term("cbc").unwrap();
    handle.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(catalog.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_fetch_dropped_on_shutdown() {
    let catalog = Arc::new(lab_catalog().with_latency("cbc", ms(500)));
    let (listener, _rx) = channel_listener();
    let handle = PickerSession::spawn(
        Arc::clone(&catalog),
        &PickerConfig::default(),
        PickerProps::default(),
        listener,
    );
    let snapshots = handle.subscribe();

    handle.set_term("cbc").unwrap();
    tokio::time::sleep(ms(400)).await;
    assert_eq!(handle.snapshot().phase, PickerPhase::Loading);

    handle.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(snapshots.borrow().phase, PickerPhase::Loading);
    assert_eq!(catalog.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_handle_reports_closed_session() {
    let catalog = Arc::new(lab_catalog());
    let (listener, _rx) = channel_listener();
    let handle = PickerSession::spawn(catalog, &PickerConfig::default(), PickerProps::default(), listener);

    handle.send(lab_picker_core::PickerCommand::Shutdown).unwrap();
    tokio::time::sleep(ms(10)).await;

    assert_eq!(handle.set_term("late"), Err(SessionError::Closed));
}
