//! The five transforming stages, in execution order.

pub mod classify;
pub mod enrich;
pub mod geocode;
pub mod search;
pub mod validate;

pub use classify::ClassifyStep;
pub use enrich::EnrichStep;
pub use geocode::GeocodeStep;
pub use search::SearchStep;
pub use validate::ValidateStep;
