use crate::adapters::output_sink::{OutputFormat, OutputSink};
use crate::adapters::storage::LocalStorage;
use crate::app::converters::chunk_pipeline;
use crate::config::settings::RunSettings;
use crate::core::reader::ChunkedReader;
use crate::domain::model::{ConversionResult, EndpointDescriptor};
use crate::domain::ports::Converter;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::Local;
use tokio_util::sync::CancellationToken;

pub struct FileToOutputConverter {
    source: EndpointDescriptor,
    target: EndpointDescriptor,
    settings: RunSettings,
}

impl FileToOutputConverter {
    pub fn new(source: EndpointDescriptor, target: EndpointDescriptor, settings: RunSettings) -> Self {
        Self {
            source,
            target,
            settings,
        }
    }
}

#[async_trait]
impl Converter for FileToOutputConverter {
    fn name(&self) -> &'static str {
        "file_to_output"
    }

    async fn convert(&self, cancel: CancellationToken) -> Result<ConversionResult> {
        // 檔名時間戳在開始時決定
        let started_at = Local::now();
        let format = OutputFormat::parse(self.target.identifier())?;

        let reader = ChunkedReader::for_endpoint(&self.source, self.settings.chunk_size())?;
        let chunks = reader.open().await?;
        tracing::info!(
            "📖 Reading {} in chunks of {}",
            reader.path().display(),
            reader.chunk_size()
        );

        let mut sink = OutputSink::new(format, started_at);
        let summary = chunk_pipeline(&self.settings)
            .run(chunks, &mut sink, cancel)
            .await?;

        let storage = LocalStorage::new(self.settings.output_directory().to_string());
        let path = sink.finish(&storage).await?;

        Ok(ConversionResult::from_summary(summary, Some(path)))
    }
}
