//! Scenario: the file cache survives the process boundary
//!
//! A checkout writes the record and the current-order marker, the handle is
//! dropped (the browser leaves for the gateway), and a fresh handle on the
//! same path sees both.

use cko_cache::{FileOrderCache, OrderCache, OrderCacheExt, CURRENT_ORDER_KEY};

#[test]
fn marker_and_record_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.json");

    {
        let c = FileOrderCache::open(&path).unwrap();
        c.write("order_AS_9", serde_json::json!({"orderId": "AS_9"}))
            .unwrap();
        c.set_current_order_id("AS_9").unwrap();
    }

    let c = FileOrderCache::open(&path).unwrap();
    assert_eq!(c.current_order_id().unwrap().as_deref(), Some("AS_9"));
    assert_eq!(
        c.list_keys("order_").unwrap(),
        vec!["order_AS_9".to_string()]
    );

    c.clear_current_order_id().unwrap();
    let c = FileOrderCache::open(&path).unwrap();
    assert!(c.read(CURRENT_ORDER_KEY).unwrap().is_none());
}

#[test]
fn blank_marker_reads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let c = FileOrderCache::open(dir.path().join("orders.json")).unwrap();
    c.set_current_order_id("   ").unwrap();
    assert!(c.current_order_id().unwrap().is_none());
}
