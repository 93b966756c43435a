pub mod config;
pub mod error;
pub mod locale;

pub use config::Config;
pub use error::*;
pub use locale::Locale;
