pub mod js;
pub mod errors;
pub mod config;

pub use config::LaunchConfig;
pub use errors::{classify, from_status};
