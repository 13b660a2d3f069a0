pub mod config;
pub mod core;
pub mod domain;
pub mod extract;
pub mod parse;
pub mod report;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};

pub use config::toml_config::TomlConfig;
pub use core::{etl::EtlEngine, pipeline::InvoicePipeline};
pub use extract::{tools::ToolLocator, ExtractorSettings, PdfTextExtractor};
pub use utils::error::{EtlError, Result};
