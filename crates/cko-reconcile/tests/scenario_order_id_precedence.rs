//! Scenario: the order id comes from the query first, then the route
//! parameter, then the cached marker.

use cko_reconcile::*;

#[test]
fn scenario_query_beats_route_param() {
    let req = ReturnRequest::from_url("/forms/response/AS_ROUTE?order_id=AS_QUERY").unwrap();
    let res = resolve_order_id(&req, Some("AS_CACHED")).unwrap();
    assert_eq!(res.order_id, "AS_QUERY");
    assert_eq!(res.source, ResolutionSource::QueryOrderId);
}

#[test]
fn scenario_snake_case_query_beats_camel_case() {
    let req = ReturnRequest::from_url("/payment-success?orderId=AS_B&order_id=AS_A").unwrap();
    assert_eq!(resolve_order_id(&req, None).unwrap().order_id, "AS_A");

    let req = ReturnRequest::from_url("/payment-success?orderId=AS_B").unwrap();
    let res = resolve_order_id(&req, None).unwrap();
    assert_eq!(res.order_id, "AS_B");
    assert_eq!(res.source, ResolutionSource::QueryOrderIdCamel);
}

#[test]
fn scenario_route_param_beats_cached_marker() {
    let req = ReturnRequest::from_url("/forms/response/AS_ROUTE").unwrap();
    let res = resolve_order_id(&req, Some("AS_CACHED")).unwrap();
    assert_eq!(res.order_id, "AS_ROUTE");
    assert_eq!(res.source, ResolutionSource::RouteParam);
}

#[test]
fn scenario_cached_marker_is_last_resort() {
    let req = ReturnRequest::from_url("https://shop.example/cashfree-response").unwrap();
    let res = resolve_order_id(&req, Some("AS_CACHED")).unwrap();
    assert_eq!(res.order_id, "AS_CACHED");
    assert_eq!(res.source, ResolutionSource::CachedMarker);

    assert_eq!(resolve_order_id(&req, None), None);
}

#[test]
fn scenario_external_route_param_overrides_parsed_one() {
    let req = ReturnRequest::from_url("/forms/response/tok_abc")
        .unwrap()
        .with_route_param("AS_FROM_ROUTER");
    assert_eq!(resolve_order_id(&req, None).unwrap().order_id, "AS_FROM_ROUTER");
}
