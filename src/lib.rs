pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::storage::LocalStorage;
pub use crate::app::build_converter;
pub use crate::config::{endpoint::resolve, settings::RunSettings};
pub use crate::core::{dispatch, EtlEngine};
pub use crate::domain::model::{ConversionResult, ConversionStatus, EndpointDescriptor, EndpointKind};
pub use crate::utils::error::{EtlError, Result};
