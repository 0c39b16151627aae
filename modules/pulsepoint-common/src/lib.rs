pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::PulseError;
pub use types::{
    normalize_topic, CompletionProgress, ExtraPayload, NormalizedItem, ResultRecord, Summary,
    SummaryData, Topic, NO_DATA_SYNOPSIS, QUOTA_EXCEEDED_SYNOPSIS,
};
