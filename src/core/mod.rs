pub mod etl;
pub mod pipeline;

pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage, TextExtractor, TransformResult};
pub use crate::utils::error::Result;
