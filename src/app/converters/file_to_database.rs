use crate::adapters::sql_sink::{self, DatabaseWriter};
use crate::app::converters::chunk_pipeline;
use crate::config::settings::RunSettings;
use crate::core::reader::ChunkedReader;
use crate::domain::model::{ConversionResult, EndpointDescriptor};
use crate::domain::ports::{Converter, RecordSink};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct FileToDatabaseConverter {
    source: EndpointDescriptor,
    target: EndpointDescriptor,
    settings: RunSettings,
    sink: Option<Arc<dyn RecordSink>>,
}

impl FileToDatabaseConverter {
    pub fn new(source: EndpointDescriptor, target: EndpointDescriptor, settings: RunSettings) -> Self {
        Self {
            source,
            target,
            settings,
            sink: None,
        }
    }

    /// 使用既有的 sink，不再依目標設定建立連線
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    async fn sink(&self) -> Result<Arc<dyn RecordSink>> {
        match &self.sink {
            Some(sink) => Ok(Arc::clone(sink)),
            None => sql_sink::connect(&self.target).await,
        }
    }
}

#[async_trait]
impl Converter for FileToDatabaseConverter {
    fn name(&self) -> &'static str {
        "file_to_database"
    }

    async fn convert(&self, cancel: CancellationToken) -> Result<ConversionResult> {
        let reader = ChunkedReader::for_endpoint(&self.source, self.settings.chunk_size())?;
        // 先確認來源存在再連線
        let chunks = reader.open().await?;
        tracing::info!(
            "📖 Reading {} in chunks of {}",
            reader.path().display(),
            reader.chunk_size()
        );

        let sink = self.sink().await?;
        sink.ensure_schema().await?;
        tracing::info!("🗄️ Target table {} is ready", self.target.identifier());

        let mut writer = DatabaseWriter::new(sink);
        let summary = chunk_pipeline(&self.settings)
            .run(chunks, &mut writer, cancel)
            .await?;

        Ok(ConversionResult::from_summary(summary, None))
    }
}
