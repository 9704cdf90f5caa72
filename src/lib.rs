pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

#[cfg(feature = "lambda")]
pub use config::lambda::S3Storage;

pub use config::lambda::LambdaConfig;
pub use config::local::LocalStorage;
pub use config::ImportSettings;
pub use crate::core::{delivery::HttpDelivery, delivery::LogDelivery, importer::Importer};
pub use domain::model::{FileNotification, InvocationSummary, Payload, TenantConfig};
pub use utils::error::{ImportError, Result};
