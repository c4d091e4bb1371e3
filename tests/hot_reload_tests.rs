//! Manifest reload behavior: watcher-driven rebuilds and snapshot
//! atomicity under concurrent readers.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde_json::json;
use trellis::hot_reload::watch_manifest;
use trellis::manifest::ManifestStore;
use trellis::registry::DataFnRegistry;
use trellis::router::Router;
use trellis::server::AppService;

mod common;
use common::site::TestSite;
use common::test_server as ts;

#[test]
fn watcher_rebuilds_router_on_manifest_change() {
    let site = TestSite::new(&json!({
        "_error": {"styles": [], "scripts": []},
        "one": {"styles": [], "scripts": []},
    }));

    let store = Arc::new(ManifestStore::new(site.config.manifest_path()));
    let router = Arc::new(ArcSwap::from_pointee(Router::from_manifest(
        store.snapshot(),
    )));

    let watcher = watch_manifest(Arc::clone(&store), Arc::clone(&router), |_| {}).unwrap();
    // allow the watcher thread to start
    std::thread::sleep(Duration::from_millis(100));

    site.write_manifest(&json!({
        "_error": {"styles": [], "scripts": []},
        "two": {"styles": [], "scripts": []},
    }));

    let mut reloaded = false;
    for _ in 0..40 {
        let snapshot = router.load_full();
        if snapshot.manifest().contains("two") {
            assert!(!snapshot.manifest().contains("one"));
            reloaded = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(reloaded, "router never picked up the rewritten manifest");

    drop(watcher);
}

#[test]
fn explicit_reload_switches_served_routes() {
    let site = TestSite::new(&json!({
        "_error": {"styles": [], "scripts": []},
        "index": {"styles": [], "scripts": []},
    }));
    site.write_view("index", &json!({"component": "home"}));
    site.write_view("fresh", &json!({"component": "fresh page"}));

    let mut service = AppService::new(site.config.clone(), DataFnRegistry::new());
    service.ready();
    let reload_handle = service.clone();
    let (handle, addr) = ts::start(service);

    assert_eq!(ts::status_of(&ts::get(&addr, "/fresh")), 404);

    site.write_manifest(&json!({
        "_error": {"styles": [], "scripts": []},
        "index": {"styles": [], "scripts": []},
        "fresh": {"styles": [], "scripts": []},
    }));
    reload_handle.reload_manifest();

    let resp = ts::get(&addr, "/fresh");
    assert_eq!(ts::status_of(&resp), 200);
    assert!(ts::body_of(&resp).contains("fresh page"));

    handle.stop();
}

#[test]
fn readers_never_observe_a_partial_manifest() {
    let site = TestSite::new(&json!({
        "_error": {"styles": [], "scripts": []},
        "a/one": {"styles": [], "scripts": []},
        "a/two": {"styles": [], "scripts": []},
    }));
    let store = Arc::new(ManifestStore::new(site.config.manifest_path()));

    let manifest_a = json!({
        "_error": {"styles": [], "scripts": []},
        "a/one": {"styles": [], "scripts": []},
        "a/two": {"styles": [], "scripts": []},
    });
    let manifest_b = json!({
        "_error": {"styles": [], "scripts": []},
        "b/one": {"styles": [], "scripts": []},
        "b/two": {"styles": [], "scripts": []},
    });

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = store.snapshot();
                    let is_a = snapshot.contains("a/one");
                    let is_b = snapshot.contains("b/one");
                    // Exactly one generation, fully present.
                    assert!(is_a != is_b, "observed a mixed manifest");
                    if is_a {
                        assert!(snapshot.contains("a/two"));
                    } else {
                        assert!(snapshot.contains("b/two"));
                    }
                }
            })
        })
        .collect();

    for round in 0..50 {
        let next = if round % 2 == 0 { &manifest_b } else { &manifest_a };
        site.write_manifest(next);
        store.reload();
    }

    for reader in readers {
        reader.join().unwrap();
    }
}
