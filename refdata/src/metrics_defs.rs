use shared::metrics_defs::{MetricDef, MetricType};

pub const CHUNK_BYTES: MetricDef = MetricDef {
    name: "refdata.chunk.bytes",
    metric_type: MetricType::Counter,
    description: "Bytes of chunk data written to disk. Tagged with kind, position.",
};

pub const LOAD_TRIGGERS: MetricDef = MetricDef {
    name: "refdata.load.triggers",
    metric_type: MetricType::Counter,
    description: "Load triggers received. Tagged with kind and whether the run was queued or coalesced.",
};

pub const LOAD_RUNS: MetricDef = MetricDef {
    name: "refdata.load.runs",
    metric_type: MetricType::Counter,
    description: "Completed load runs. Tagged with kind, outcome.",
};

pub const LOAD_DURATION: MetricDef = MetricDef {
    name: "refdata.load.duration",
    metric_type: MetricType::Histogram,
    description: "Load run duration in seconds. Tagged with kind.",
};

pub const LOAD_RECORDS: MetricDef = MetricDef {
    name: "refdata.load.records",
    metric_type: MetricType::Counter,
    description: "Records read by successful load runs. Tagged with kind.",
};

pub const NUMERIC_DEFAULTED: MetricDef = MetricDef {
    name: "refdata.numeric.defaulted",
    metric_type: MetricType::Counter,
    description: "Numeric fields that were present but unparseable and stored as 0. Tagged with kind, field.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CHUNK_BYTES,
    LOAD_TRIGGERS,
    LOAD_RUNS,
    LOAD_DURATION,
    LOAD_RECORDS,
    NUMERIC_DEFAULTED,
];
