use crate::domain::model::{ConversionResult, EndpointKind};
use crate::domain::ports::Converter;
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 合法但尚未實作的組合：不做任何 I/O，直接回報成功
pub struct UnimplementedConverter {
    source: EndpointKind,
    target: EndpointKind,
}

impl UnimplementedConverter {
    pub fn new(source: EndpointKind, target: EndpointKind) -> Self {
        Self { source, target }
    }
}

#[async_trait]
impl Converter for UnimplementedConverter {
    fn name(&self) -> &'static str {
        "unimplemented"
    }

    async fn convert(&self, _cancel: CancellationToken) -> Result<ConversionResult> {
        tracing::warn!(
            "🚧 {} -> {} conversion is not implemented yet, nothing was transferred",
            self.source,
            self.target
        );
        Ok(ConversionResult::noop())
    }
}
