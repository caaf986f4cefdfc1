//! Process-wide sink for errors returned by exporters.
//!
//! Drivers such as [`ExportPipeline`](crate::ExportPipeline) forward every
//! error an exporter returns to [`handle_error`], unmodified. Applications
//! install their own reporting with [`set_error_handler`].
use crate::error::{OTelSdkError, OTelSdkResult};
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// The global error handler.
static GLOBAL_ERROR_HANDLER: Lazy<RwLock<Option<ErrorHandler>>> = Lazy::new(|| RwLock::new(None));

struct ErrorHandler(Box<dyn Fn(OTelSdkError) + Send + Sync>);

/// Handle error using the globally configured error handler.
///
/// Writes to stderr if unset.
pub fn handle_error<T: Into<OTelSdkError>>(err: T) {
    let err = err.into();
    match GLOBAL_ERROR_HANDLER.read() {
        Ok(handler) => match handler.as_ref() {
            Some(handler) => (handler.0)(err),
            None => eprintln!("OpenTelemetry metrics export error occurred. {err}"),
        },
        Err(_) => eprintln!("OpenTelemetry metrics export error occurred. {err}"),
    }
}

/// Set global error handler.
pub fn set_error_handler<F>(f: F) -> OTelSdkResult
where
    F: Fn(OTelSdkError) + Send + Sync + 'static,
{
    GLOBAL_ERROR_HANDLER
        .write()
        .map(|mut handler| *handler = Some(ErrorHandler(Box::new(f))))
        .map_err(Into::into)
}
