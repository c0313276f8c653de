#![deny(warnings)]
pub mod error;
pub mod game;
pub mod knowledge;
pub mod model;

pub use error::{GameError, IllegalEvent, PreferenceError, SetupError};

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "qfish"
    }

    pub const fn codename() -> &'static str {
        "Quantum Go Fish"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
