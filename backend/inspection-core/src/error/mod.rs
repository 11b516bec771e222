pub mod config;
pub mod connection;
pub mod frame;
pub mod pipeline;
pub mod reporting;
pub mod store;

pub use config::ConfigError;
pub use connection::ConnectionError;
pub use frame::FrameError;
pub use pipeline::PipelineError;
pub use reporting::ReportingError;
pub use store::StoreError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Reporting(#[from] ReportingError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
