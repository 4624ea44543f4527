use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Inbound request duration in seconds. Tagged with status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const FANOUT_QUERIES: MetricDef = MetricDef {
    name: "fanout.queries",
    metric_type: MetricType::Histogram,
    description: "Number of search queries carried by one inbound request",
};

pub const UPSTREAM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "upstream.request.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a single upstream search call in seconds",
};

pub const UPSTREAM_REQUEST_FAILURES: MetricDef = MetricDef {
    name: "upstream.request.failures",
    metric_type: MetricType::Counter,
    description: "Number of failed upstream search calls. Tagged with kind.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    FANOUT_QUERIES,
    UPSTREAM_REQUEST_DURATION,
    UPSTREAM_REQUEST_FAILURES,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique() {
        let names: HashSet<&str> = ALL_METRICS.iter().map(|def| def.name).collect();
        assert_eq!(names.len(), ALL_METRICS.len());

        // Describing without an installed recorder is a no-op
        shared::metrics_defs::describe_all(ALL_METRICS);
    }
}
