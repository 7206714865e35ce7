use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, endpoint.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const AUTH_REJECTED: MetricDef = MetricDef {
    name: "auth.rejected",
    metric_type: MetricType::Counter,
    description: "Save requests rejected for a missing or wrong shared key",
};

pub const UPSTREAM_FAILURES: MetricDef = MetricDef {
    name: "upstream.failures",
    metric_type: MetricType::Counter,
    description: "Remote store calls that failed. Tagged with op (read, write).",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    AUTH_REJECTED,
    UPSTREAM_FAILURES,
];
