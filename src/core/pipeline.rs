use crate::core::executor::{ParallelExecutor, TransformOutcome};
use crate::core::reader::ChunkStream;
use crate::core::transform::transform;
use crate::domain::model::{Chunk, RunSummary};
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 接收轉換後的 chunk；在主控流程上依完成順序呼叫
#[async_trait]
pub trait ChunkWriter: Send {
    async fn write_chunk(&mut self, chunk: Chunk) -> Result<u64>;
}

pub struct ChunkPipeline {
    executor: ParallelExecutor,
    max_reported_failures: usize,
}

impl ChunkPipeline {
    pub fn new(executor: ParallelExecutor, max_reported_failures: usize) -> Self {
        Self {
            executor,
            max_reported_failures,
        }
    }

    /// chunk 層級錯誤只記錄在摘要中；寫入端不可用則立即中止並取消剩餘工作
    pub async fn run<W: ChunkWriter>(
        &self,
        chunks: ChunkStream,
        writer: &mut W,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        tracing::info!(
            "⚙️ Processing chunks with {} workers",
            self.executor.workers()
        );

        let mut outcomes = self.executor.run(chunks, transform, cancel.clone());
        let mut summary = RunSummary::default();

        while let Some(TransformOutcome {
            chunk_index,
            result,
        }) = outcomes.recv().await
        {
            let written = match result {
                Ok(chunk) => writer.write_chunk(chunk).await,
                Err(e) => Err(e),
            };

            match written {
                Ok(rows_affected) => {
                    tracing::info!(chunk_index, status = "success", rows_affected, "chunk processed");
                    summary.record_success(rows_affected);
                }
                Err(e) if e.is_chunk_level() => {
                    tracing::warn!(chunk_index, status = "failure", error = %e, "chunk processed");
                    summary.record_failure(chunk_index, e.to_string(), self.max_reported_failures);
                }
                Err(e) => {
                    tracing::error!(chunk_index, status = "fatal", error = %e, "chunk processed");
                    cancel.cancel();
                    return Err(e);
                }
            }
        }

        summary.cancelled = cancel.is_cancelled();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reader::{ChunkedReader, SourceFormat};
    use crate::utils::error::EtlError;
    use std::io::Write;

    #[derive(Default)]
    struct CountingWriter {
        chunks: Vec<usize>,
        fail_on: Option<usize>,
        unavailable_on: Option<usize>,
    }

    #[async_trait]
    impl ChunkWriter for CountingWriter {
        async fn write_chunk(&mut self, chunk: Chunk) -> Result<u64> {
            if self.unavailable_on == Some(chunk.index) {
                return Err(EtlError::SinkUnavailableError {
                    message: "connection lost".to_string(),
                });
            }
            if self.fail_on == Some(chunk.index) {
                return Err(EtlError::SinkWriteError {
                    message: "constraint violated".to_string(),
                });
            }
            self.chunks.push(chunk.index);
            Ok(chunk.len() as u64)
        }
    }

    fn source(rows: usize, bad_date_at: Option<usize>) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,name,date,amount").unwrap();
        for i in 1..=rows {
            let date = if Some(i) == bad_date_at {
                "15/01/2024"
            } else {
                "2024-01-15"
            };
            writeln!(file, "{},Person {},{},10.00", i, i, date).unwrap();
        }
        file
    }

    fn stream(file: &tempfile::NamedTempFile, chunk_size: usize) -> ChunkStream {
        ChunkedReader::new(file.path(), SourceFormat::Delimited(b','), chunk_size)
            .unwrap()
            .stream()
            .unwrap()
    }

    #[tokio::test]
    async fn test_transform_failure_is_summarised_not_raised() {
        let file = source(30, Some(15));
        let pipeline = ChunkPipeline::new(ParallelExecutor::new(2, 2), 5);
        let mut writer = CountingWriter::default();

        let summary = pipeline
            .run(stream(&file, 10), &mut writer, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.total_chunks, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rows_affected, 20);
        assert_eq!(summary.failures[0].chunk_index, 1);
        assert!(summary.failures[0].reason.contains("15/01/2024"));
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_sink_write_error_is_chunk_level() {
        let file = source(30, None);
        let pipeline = ChunkPipeline::new(ParallelExecutor::new(2, 2), 5);
        let mut writer = CountingWriter {
            fail_on: Some(2),
            ..Default::default()
        };

        let summary = pipeline
            .run(stream(&file, 10), &mut writer, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        let mut written = writer.chunks.clone();
        written.sort_unstable();
        assert_eq!(written, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_unavailable_sink_aborts_the_run() {
        let file = source(100, None);
        let pipeline = ChunkPipeline::new(ParallelExecutor::new(2, 2), 5);
        let mut writer = CountingWriter {
            unavailable_on: Some(0),
            ..Default::default()
        };
        let cancel = CancellationToken::new();

        let result = pipeline.run(stream(&file, 10), &mut writer, cancel.clone()).await;

        assert!(matches!(result, Err(EtlError::SinkUnavailableError { .. })));
        assert!(cancel.is_cancelled());
    }
}
