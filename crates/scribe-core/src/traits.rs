use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{CompletionRequest, StructuredOutput};

/// Stateless request/response text completion.
///
/// Workflow nodes receive this as an injected capability; nothing in the
/// engine calls it directly.
pub trait GenerationService: Send + Sync + 'static {
    /// Complete a single system/user prompt pair.
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<String>>;

    /// Request JSON and classify the reply as structured or raw text.
    ///
    /// Text that fails to parse is returned as `StructuredOutput::Raw`, never
    /// as an error; callers decide how to default.
    fn complete_structured(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<StructuredOutput>> {
        Box::pin(async move {
            let text = self.complete(request.json()).await?;
            let output = StructuredOutput::from_text(&text);
            if let StructuredOutput::Raw(ref raw) = output {
                tracing::debug!(chars = raw.len(), "Structured request returned unparseable text");
            }
            Ok(output)
        })
    }
}
