pub mod compiled;
pub mod enums;
pub mod frame;
pub mod result;
pub mod spec;

pub use compiled::{CompiledQuery, ParamValue, ScalarValue};
pub use enums::{
    Aggregation, Axis, BucketSize, ChartType, FilterLogic, FilterOp, Geometry, XDimensionType,
};
pub use frame::{Frame, FrameRow};
pub use result::{ChartResult, CoveragePoint, Point, ResultMeta, Series, Surge, XDimension};
pub use spec::{ChartSpec, Dimension, FilterCondition, FilterGroup, FilterLeaf, Measure, TimeWindow};
