pub mod dispatcher;
pub mod etl;
pub mod executor;
pub mod pipeline;
pub mod reader;
pub mod transform;

pub use dispatcher::{dispatch, ConverterHandle, ConverterKind};
pub use etl::EtlEngine;
pub use reader::ChunkedReader;
