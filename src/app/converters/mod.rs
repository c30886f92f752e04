pub mod file_to_database;
pub mod file_to_output;
pub mod unimplemented;

use crate::config::settings::RunSettings;
use crate::core::dispatcher::{ConverterHandle, ConverterKind};
use crate::core::executor::ParallelExecutor;
use crate::core::pipeline::ChunkPipeline;
use crate::domain::ports::Converter;

pub use file_to_database::FileToDatabaseConverter;
pub use file_to_output::FileToOutputConverter;
pub use unimplemented::UnimplementedConverter;

/// 依 dispatcher 選定的組合建立 converter
pub fn build_converter(handle: ConverterHandle, settings: &RunSettings) -> Box<dyn Converter> {
    let ConverterHandle {
        kind,
        source,
        target,
    } = handle;

    match kind {
        ConverterKind::FileToDatabase => Box::new(FileToDatabaseConverter::new(
            source,
            target,
            settings.clone(),
        )),
        ConverterKind::FileToOutput => Box::new(FileToOutputConverter::new(
            source,
            target,
            settings.clone(),
        )),
        ConverterKind::Unimplemented => {
            Box::new(UnimplementedConverter::new(source.kind(), target.kind()))
        }
    }
}

pub(crate) fn chunk_pipeline(settings: &RunSettings) -> ChunkPipeline {
    ChunkPipeline::new(
        ParallelExecutor::new(settings.workers(), settings.channel_buffer()),
        settings.max_reported_failures(),
    )
}
