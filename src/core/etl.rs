use crate::domain::model::ConversionResult;
use crate::domain::ports::Converter;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct EtlEngine {
    converter: Box<dyn Converter>,
    monitor: SystemMonitor,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl EtlEngine {
    pub fn new(converter: Box<dyn Converter>) -> Self {
        Self::new_with_monitoring(converter, false)
    }

    pub fn new_with_monitoring(converter: Box<dyn Converter>, monitor_enabled: bool) -> Self {
        Self {
            converter,
            monitor: SystemMonitor::new(monitor_enabled),
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    /// 超過時間後不再開始新的 chunk，執行中的 chunk 仍會完成
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// 外部可用來中止執行 (例如 Ctrl-C)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<ConversionResult> {
        tracing::info!("🚀 Starting {} conversion", self.converter.name());
        self.monitor.log_stats("Conversion started");

        let timer = self.timeout.map(|timeout| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::warn!("⏰ Timeout of {:?} reached, no new chunks will be started", timeout);
                cancel.cancel();
            })
        });

        let result = self.converter.convert(self.cancel.clone()).await;

        if let Some(timer) = timer {
            timer.abort();
        }

        self.monitor
            .log_final_stats(result.as_ref().map(|r| r.rows_affected).unwrap_or(0));

        let result = result?;
        log_summary(&result);
        Ok(result)
    }
}

fn log_summary(result: &ConversionResult) {
    let summary = &result.summary;
    tracing::info!(
        "📊 Chunks: {} total, {} succeeded, {} failed, {} rows affected",
        summary.total_chunks,
        summary.succeeded,
        summary.failed,
        result.rows_affected
    );

    for failure in &summary.failures {
        tracing::warn!("  chunk {}: {}", failure.chunk_index, failure.reason);
    }
    if summary.failed > summary.failures.len() {
        tracing::warn!(
            "  ... and {} more failed chunks",
            summary.failed - summary.failures.len()
        );
    }

    if summary.cancelled {
        tracing::warn!("⏹️ Run was cancelled before every chunk was started");
    }

    if result.is_success() {
        tracing::info!("✅ Conversion finished");
    } else if let Some(error) = &result.error {
        tracing::warn!("⚠️ Conversion finished with errors: {}", error);
    }
}
