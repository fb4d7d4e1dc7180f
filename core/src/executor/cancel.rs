use tokio_util::sync::CancellationToken;

/// Cooperative cancellation handle for one run.
///
/// Create a fresh signal per run and pass it to the run call. Clones share
/// the same underlying token, so the caller keeps one clone to request
/// cancellation while the engine and invokers observe another.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent, and harmless after the run ended.
    pub fn request_cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("cancellation requested");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_is_idempotent_and_shared_by_clones() {
        let signal = CancelSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_cancelled());

        signal.request_cancel();
        signal.request_cancel();

        assert!(observer.is_cancelled());
        // Already cancelled: resolves immediately.
        observer.cancelled().await;
    }

    #[test]
    fn fresh_signals_are_independent() {
        let first = CancelSignal::new();
        first.request_cancel();
        assert!(!CancelSignal::new().is_cancelled());
    }
}
