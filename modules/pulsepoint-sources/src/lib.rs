pub mod catalog;
pub mod fetchers;
pub mod normalize;
pub mod retry;

pub use catalog::SourceCatalog;
pub use fetchers::{FetchFilters, SourceFetcher};
pub use normalize::normalize;
pub use retry::RetryExecutor;
