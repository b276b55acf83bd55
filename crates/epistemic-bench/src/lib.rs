pub mod datasets;
pub mod indicators;
pub mod io;
pub mod pipeline;
pub mod records;
pub mod registry;
pub mod report;
pub mod thresholds;
pub mod work_dir;

pub use indicators::{Indicator, RunContext, ScoreContext};
pub use records::ResponseRecord;
pub use registry::IndicatorSet;
pub use report::{IndicatorReport, MetricScore};
pub use thresholds::Thresholds;
pub use work_dir::RunWorkDir;
