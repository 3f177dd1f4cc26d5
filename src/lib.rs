pub mod config;
pub mod error;
pub mod logging;
pub mod providers;
pub mod relay;
pub mod server;
pub mod translate;

pub use config::RelayConfig;
pub use error::{RelayError, Result, UpstreamFailure};
pub use logging::SharedLogger;
pub use relay::UpstreamClient;
pub use server::{build_router, AppState};
