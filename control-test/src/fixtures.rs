use serde_json::{json, Value};

/// A trace id of the shape the end-to-end scenarios use: 32 lower hex
/// characters, as required by the `traceparent` extraction path.
pub const SAMPLE_TRACE_ID: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

pub fn traceparent_header(trace_id: &str) -> String {
    format!("00-{trace_id}-bbbbbbbbbbbbbbbb-01")
}

pub struct BreakpointFixture {
    pub service: &'static str,
    pub endpoint: &'static str,
    pub conditions: Value,
}

pub fn body_amount_breakpoint() -> BreakpointFixture {
    BreakpointFixture {
        service: "localhost:10001",
        endpoint: "/order",
        conditions: json!({ "body.amount": "999" }),
    }
}

pub fn header_vip_breakpoint() -> BreakpointFixture {
    BreakpointFixture {
        service: "localhost:10001",
        endpoint: "/checkout",
        conditions: json!({ "header.user-type": "vip" }),
    }
}

pub fn order_request_body(order_id: &str, amount: u64) -> Value {
    json!({ "order_id": order_id, "amount": amount })
}
