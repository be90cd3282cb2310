use std::error::Error;

/// Side channel for failures that coarse `bool` actions swallow.
pub trait ErrorSink: Send + Sync {
    fn report(&self, operation: &'static str, error: &(dyn Error + 'static));
}

/// Logs each failure as a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, operation: &'static str, error: &(dyn Error + 'static)) {
        tracing::warn!(operation, error = %error, "visualization action failed");
    }
}
