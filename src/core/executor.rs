use crate::core::reader::{ChunkRead, FailedChunk};
use crate::domain::model::Chunk;
use crate::utils::error::{EtlError, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct TransformOutcome {
    pub chunk_index: usize,
    pub result: Result<Chunk>,
}

/// 轉換階段的有界 worker pool
///
/// 讀取端 -> worker -> 消費端 兩段都是有界 channel，同時存在的 chunk 數量
/// 不超過 `2 * (buffer + workers) + 1`，與來源大小無關。
#[derive(Debug, Clone, Copy)]
pub struct ParallelExecutor {
    workers: usize,
    buffer: usize,
}

impl ParallelExecutor {
    pub fn new(workers: usize, buffer: usize) -> Self {
        Self {
            workers: workers.max(1),
            buffer: buffer.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 啟動 worker pool，回傳依完成順序產生結果的 channel
    ///
    /// 取消後不再從來源拉取新的 chunk，已排隊但尚未開始的 chunk 直接丟棄，
    /// 執行中的 chunk 則照常完成。
    pub fn run<I, F>(
        &self,
        chunks: I,
        transform: F,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<TransformOutcome>
    where
        I: Iterator<Item = ChunkRead> + Send + 'static,
        F: Fn(Chunk) -> Result<Chunk> + Send + Sync + 'static,
    {
        let (chunk_tx, chunk_rx) = mpsc::channel::<ChunkRead>(self.buffer);
        let (outcome_tx, outcome_rx) = mpsc::channel::<TransformOutcome>(self.buffer + self.workers);

        // 讀取端在 blocking 執行緒上依來源順序拉取
        let feeder_cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let mut chunks = chunks;
            while !feeder_cancel.is_cancelled() {
                let Some(item) = chunks.next() else {
                    break;
                };
                if chunk_tx.blocking_send(item).is_err() {
                    break;
                }
            }
            tracing::debug!("Chunk feeder finished");
        });

        let chunk_rx = Arc::new(Mutex::new(chunk_rx));
        let transform = Arc::new(transform);

        for worker_id in 0..self.workers {
            let chunk_rx = Arc::clone(&chunk_rx);
            let outcome_tx = outcome_tx.clone();
            let transform = Arc::clone(&transform);
            let cancel = cancel.clone();

            tokio::spawn(async move {
                loop {
                    let next = chunk_rx.lock().await.recv().await;
                    let Some(item) = next else {
                        break;
                    };

                    if cancel.is_cancelled() {
                        let index = match &item {
                            Ok(chunk) => chunk.index,
                            Err(failed) => failed.index,
                        };
                        tracing::debug!(worker_id, chunk_index = index, "Skipping queued chunk after cancellation");
                        continue;
                    }

                    let outcome = match item {
                        Ok(chunk) => {
                            let chunk_index = chunk.index;
                            let transform = Arc::clone(&transform);
                            let result = tokio::task::spawn_blocking(move || (*transform)(chunk))
                                .await
                                .unwrap_or_else(|e| {
                                    Err(EtlError::WorkerError {
                                        chunk_index,
                                        message: e.to_string(),
                                    })
                                });
                            TransformOutcome {
                                chunk_index,
                                result,
                            }
                        }
                        Err(FailedChunk { index, error }) => TransformOutcome {
                            chunk_index: index,
                            result: Err(error),
                        },
                    };

                    if outcome_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
                tracing::debug!(worker_id, "Transform worker finished");
            });
        }

        outcome_rx
    }
}
