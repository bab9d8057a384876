mod session;
mod tenant;

pub use session::*;
pub use tenant::*;
