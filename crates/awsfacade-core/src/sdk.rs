//! Conversion of SDK failures into [`FacadeError`].

use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;

use crate::error::FacadeError;

/// Map an SDK operation error into a [`FacadeError`].
///
/// Service errors are classified by their error code. When a service error
/// carries no code (HEAD requests have no body), the HTTP status decides:
/// 403 is a permission failure, 404 a missing resource. Construction,
/// timeout and dispatch failures become [`FacadeError::Unknown`].
pub fn from_sdk_error<E>(context: &str, err: SdkError<E, HttpResponse>) -> FacadeError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err
        .as_service_error()
        .and_then(ProvideErrorMetadata::code)
        .map(ToOwned::to_owned)
        .or_else(|| {
            err.raw_response()
                .and_then(|resp| match resp.status().as_u16() {
                    403 => Some("AccessDenied".to_owned()),
                    404 => Some("NotFound".to_owned()),
                    429 => Some("Throttling".to_owned()),
                    _ => None,
                })
        });
    let detail = err
        .as_service_error()
        .and_then(ProvideErrorMetadata::message)
        .map_or_else(|| DisplayErrorContext(&err).to_string(), ToOwned::to_owned);

    FacadeError::from_code(code.as_deref(), format!("{context}: {detail}"))
}

/// Extension trait so SDK calls can be finished with `.map_facade_err(..)?`.
pub trait SdkResultExt<T> {
    /// Convert the error half into a [`FacadeError`], prefixing `context`.
    fn map_facade_err(self, context: impl AsRef<str>) -> Result<T, FacadeError>;
}

impl<T, E> SdkResultExt<T> for Result<T, SdkError<E, HttpResponse>>
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    fn map_facade_err(self, context: impl AsRef<str>) -> Result<T, FacadeError> {
        self.map_err(|err| from_sdk_error(context.as_ref(), err))
    }
}
