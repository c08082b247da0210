use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("study_gateway_requests_total", "Total number of proxy requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("study_gateway_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("study_gateway_cache_misses_total", "Total cache misses").unwrap();
    pub static ref COALESCED_WAITS: Counter = register_counter!(
        "study_gateway_coalesced_waits_total",
        "Requests that joined an identical in-flight upstream call"
    )
    .unwrap();
    pub static ref UPSTREAM_RETRIES: Counter =
        register_counter!("study_gateway_upstream_retries_total", "Upstream attempts that were retried").unwrap();
    pub static ref UPSTREAM_FAILURES: Counter =
        register_counter!("study_gateway_upstream_failures_total", "Upstream calls that failed for good").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "study_gateway_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("study_gateway_cache_size", "Current number of items in cache").unwrap();
}
