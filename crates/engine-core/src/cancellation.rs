use tokio_util::sync::CancellationToken;

/// Run-scoped cancellation (§4.5, §5): one token per pipeline run, held
/// by the controller and cloned into every reader/writer/preflight task.
/// `Stop` cancels the root token; every suspension point named in §5
/// (`reader send`, `writer receive`, `count-worker queue send`, any SQL
/// call) races the token via `tokio::select!` against its own future.
///
/// A thin wrapper over `tokio_util::sync::CancellationToken` rather than
/// a bespoke type: the teacher's own actor coordinator passes the same
/// token type directly, so there is nothing this layer needs to add
/// beyond a named constructor and a `child` helper for job-scoped
/// sub-tokens that cancel with, but don't themselves cancel, the parent.
#[derive(Debug, Clone)]
pub struct CancelToken(CancellationToken);

impl CancelToken {
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.0.cancelled().await;
    }

    /// A job-scoped child token: cancelling the parent cancels this too,
    /// but cancelling the child (e.g. a single writer failing) has no
    /// effect on siblings or the parent.
    pub fn child(&self) -> Self {
        Self(self.0.child_token())
    }

    pub fn inner(&self) -> &CancellationToken {
        &self.0
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parent_cancel_propagates_to_child() {
        let parent = CancelToken::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn child_cancel_does_not_affect_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());
    }
}
