//! Run-wide cancellation signal.

use std::sync::Arc;

use tokio::sync::watch;

/// A one-shot cancellation flag shared by every sub-build of a run.
///
/// Clones observe the same flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelSignal {
  tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(false);
    Self { tx: Arc::new(tx) }
  }

  pub fn cancel(&self) {
    self.tx.send_replace(true);
  }

  pub fn is_cancelled(&self) -> bool {
    *self.tx.borrow()
  }

  /// Resolves once `cancel` has been called on any clone.
  pub async fn cancelled(&self) {
    let mut rx = self.tx.subscribe();
    // The sender lives as long as `self`, so this cannot fail.
    let _ = rx.wait_for(|cancelled| *cancelled).await;
  }
}

impl Default for CancelSignal {
  fn default() -> Self {
    Self::new()
  }
}
