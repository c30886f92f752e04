use crate::domain::model::{ConversionResult, Record};
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 產出檔案的存放位置
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 關聯式資料庫目標，寫入必須以 id 做 upsert
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// 目標表不存在才建立，可重複並行呼叫
    async fn ensure_schema(&self) -> Result<()>;

    /// 寫入一個 chunk，回傳影響的筆數
    async fn write(&self, records: &[Record]) -> Result<u64>;
}

#[async_trait]
pub trait Converter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn convert(&self, cancel: CancellationToken) -> Result<ConversionResult>;
}
