use thiserror::Error;

/// Every error kind the engine can raise, one-to-one. Validation/router/
/// unsupported errors are 4xx-equivalent; executor/normalisation errors
/// are 5xx-equivalent. None of these are ever cached.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("unsupported chart type: {0:?}")]
    UnsupportedChart(crate::models::ChartType),

    #[error("unsupported measure aggregation: {0:?}")]
    UnsupportedMeasure(crate::models::Aggregation),

    #[error("unknown organisation: {0}")]
    UnknownOrganisation(String),

    #[error("malformed table name for organisation {org}: {table}")]
    MalformedTableName { org: String, table: String },

    #[error("warehouse execution failed (job_id={job_id:?}): {message}")]
    Executor {
        job_id: Option<String>,
        message: String,
    },

    #[error("normalisation invariant violated: {0}")]
    Normalisation(String),
}

/// Raised by the Validator, before compilation and again on the produced
/// `ChartResult`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("dataset must be \"events\", got {0:?}")]
    WrongDataset(String),
    #[error("measures must be non-empty")]
    EmptyMeasures,
    #[error("measure {0:?} is missing an id")]
    MeasureMissingId(usize),
    #[error("measure {id:?} has an eventType outside {{0,1}}: {value}")]
    InvalidEventType { id: String, value: u8 },
    #[error("dimensions must be non-empty")]
    EmptyDimensions,
    #[error("dimension at index {0} is malformed (empty id or column)")]
    MalformedDimension(usize),
    #[error("timeWindow.from must be <= timeWindow.to")]
    WindowFromAfterTo,
    #[error("bucket RAW is not valid when a measure requires bucketing")]
    RawBucketWithBucketedMeasure,
    #[error("retention_rate requires bucket WEEK or MONTH")]
    RetentionRequiresWeekOrMonth,
    #[error("filter group has no conditions")]
    EmptyFilterGroup,
    #[error("between filter value must be a 2-element array, got {0}")]
    BadBetweenValue(String),
    #[error("unknown filter operator on field {0:?}")]
    UnknownFilterOp(String),
    #[error("chart result series {0:?} has an invalid geometry/axis/coverage")]
    InvalidResultSeries(String),
    #[error("chart result point coverage out of [0,1] range: {0}")]
    CoverageOutOfRange(f64),
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("unknown organisation: {0}")]
    UnknownOrganisation(String),
    #[error("malformed table name for organisation {org}: {table}")]
    MalformedTableName { org: String, table: String },
}

impl From<RouterError> for EngineError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::UnknownOrganisation(org) => EngineError::UnknownOrganisation(org),
            RouterError::MalformedTableName { org, table } => {
                EngineError::MalformedTableName { org, table }
            }
        }
    }
}
