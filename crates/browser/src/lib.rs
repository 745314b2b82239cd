//! Chrome DevTools implementation of the settle driver capability traits.

pub mod driver;
pub mod shared;

pub use driver::{ChromiumDriver, ChromiumElement};
pub use shared::LaunchConfig;
