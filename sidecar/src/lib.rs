pub mod check_client;
pub mod config;
pub mod filter;

pub use check_client::{CheckClient, CheckDecision};
pub use config::SidecarConfig;
pub use filter::{intercept, SidecarState};
