pub mod config;
pub mod dispatcher;
pub mod mode;
pub mod paths;
pub mod pipeline;
pub mod preparation;
pub mod selector;

pub use config::Config;
pub use dispatcher::{Dispatcher, RegionStatus};
pub use pipeline::{Pipeline, PipelineSettings, RunOutcome};
pub use preparation::ReadInput;
pub use selector::{RegionSelector, Thresholds};
