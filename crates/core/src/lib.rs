pub mod anomaly;
pub mod config;
pub mod error;

pub use anomaly::*;
pub use config::Config;
pub use error::*;
