// store tiers

mod session_cache;
mod session_store;

pub use session_cache::*;
pub use session_store::*;

// observability

mod metrics;

pub use metrics::*;
