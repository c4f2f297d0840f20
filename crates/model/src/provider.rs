use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// The error type for a model provider.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A completion backend.
///
/// Providers are treated as stateless: the engine sends every request
/// with the complete history, and may drop the provider at any time.
/// Cloning a provider should be cheap, since the same provider is shared
/// by the engine and by the generation tools.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// The response type for this provider.
    type Response: ModelResponse<Error = Self::Error>;

    /// A short name used in logs, e.g. `openai`.
    fn name(&self) -> &str;

    /// Sends a request to the backend.
    ///
    /// The returned future must not borrow `self`, so that callers can
    /// move it into a spawned task or drop it at any await point.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
