pub mod chromium {
    pub mod driver;
    pub mod element;
    pub mod network;

    pub use driver::ChromiumDriver;
    pub use element::ChromiumElement;
}

pub use chromium::{ChromiumDriver, ChromiumElement};
