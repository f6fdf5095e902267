use shared::metrics_defs::{MetricDef, MetricType};

pub const AUTH_FAILURES: MetricDef = MetricDef {
    name: "bizlogic.http.auth_failures",
    metric_type: MetricType::Counter,
    description: "Requests rejected by basic auth",
};

pub const REPORT_ROWS: MetricDef = MetricDef {
    name: "bizlogic.report.rows",
    metric_type: MetricType::Histogram,
    description: "Rows returned per report query, tagged by report",
};

pub const REPORT_FAILURES: MetricDef = MetricDef {
    name: "bizlogic.report.failures",
    metric_type: MetricType::Counter,
    description: "Report requests that failed, tagged by report",
};

pub const ALL_METRICS: &[MetricDef] = &[AUTH_FAILURES, REPORT_ROWS, REPORT_FAILURES];
