// CamTrawl Metadata Library Entry Point

pub mod config;
pub mod constants;
pub mod datagram;
pub mod db;
pub mod deployment;
pub mod error;
pub mod export;
pub mod legacy;
pub mod marks;
pub mod resolve;
pub mod sync;
pub mod timestamp;
pub mod trim;

pub use config::ResolverConfig;
pub use db::Store;
pub use deployment::DeploymentMetadata;
pub use error::{MetadataError, Result};
pub use legacy::ConvertOptions;
pub use resolve::SummaryFrom;
pub use sync::Snapshot;
