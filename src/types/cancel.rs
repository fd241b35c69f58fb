use std::sync::Arc;

use tokio::sync::watch;

use crate::error::BindingError;

/// Cancellation primitive carried by call and signing contexts.
///
/// Cloned tokens share the state, firing any of them cancels all.
/// Timeouts are expressed by firing the token from a timer task.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is fired.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so `wait_for` can not fail here.
        _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once the optional token is fired, never otherwise.
pub(crate) async fn cancelled(token: Option<&CancelToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Drives `fut` to completion unless the token fires first, in which case
/// the future is dropped and [`BindingError::Cancelled`] returned.
pub(crate) async fn with_cancel<T, F>(token: Option<&CancelToken>, fut: F) -> Result<T, BindingError>
where
    F: Future<Output = Result<T, BindingError>>,
{
    tokio::select! {
        biased;
        _ = cancelled(token) => Err(BindingError::Cancelled),
        res = fut => res,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_with_cancel() {
        let token = CancelToken::new();
        let res = with_cancel(Some(&token), async { Ok::<_, BindingError>(7) }).await;
        assert_eq!(res, Ok(7));

        token.cancel();
        let res = with_cancel(Some(&token), std::future::pending::<Result<(), _>>()).await;
        assert_eq!(res, Err(BindingError::Cancelled));

        let res = with_cancel(None, async { Ok::<_, BindingError>(()) }).await;
        assert_eq!(res, Ok(()));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }
}
