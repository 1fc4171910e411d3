pub mod duration;
pub mod site_url;

pub use duration::parse_duration;
pub use site_url::{ensure_trailing_slash, resolve, unix_millis};
