mod gatekeeper_impl;
mod hot_cache;
mod reaper;
mod rotation;
mod tenant_resolver;

pub use gatekeeper_impl::*;
pub use hot_cache::*;
pub use reaper::*;
pub use rotation::*;
pub use tenant_resolver::*;
