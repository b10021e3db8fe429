//! Remote command-queue client port — the dual push/pull operating mode
//! the command consumer drives against it.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use minihub_domain::command::Command;
use minihub_domain::error::MiniHubError;

/// A source of commands external to the local storage adapter (a remote
/// queue service) the consumer sweeps on an interval when push
/// notifications aren't available, or subscribes to directly when they are.
pub trait RemoteCommandQueue: Send + Sync {
    fn poll(
        &self,
        max: usize,
    ) -> impl Future<Output = Result<Vec<Command>, MiniHubError>> + Send;

    fn acknowledge(
        &self,
        command: &Command,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send;

    /// Claim `command` for execution by this hub instance: a conditional
    /// `pending → processing` transition against the *remote* row, not the
    /// local repository. This is what makes "at most one hub instance
    /// executes any command" hold even when two hub processes, each with
    /// their own local storage, poll the same still-`pending` remote row at
    /// the same time — the local CAS in `CommandRepository` only guards
    /// against two tasks inside *this* process racing each other.
    ///
    /// Returns `Ok(true)` if this call won the race and the remote row is
    /// now `processing`, `Ok(false)` if some other consumer (this or another
    /// hub instance) already claimed it.
    ///
    /// The default implementation always returns `Ok(true)`: it's correct
    /// for any queue implementation with no shared remote row to race over
    /// (in-process test fakes, single-instance local-only setups).
    fn claim(
        &self,
        #[allow(unused_variables)] command: &Command,
    ) -> impl Future<Output = Result<bool, MiniHubError>> + Send {
        async { Ok(true) }
    }

    /// Open a realtime push subscription against the remote store's change
    /// stream, filtered to `status=eq.pending` inserts. Returns a channel
    /// the consumer reads newly inserted commands from.
    ///
    /// The default implementation returns
    /// [`MiniHubError::Storage`]-wrapped "unsupported", which makes the
    /// consumer fall back to (and stay on) pull mode — the right behavior
    /// for any queue implementation that has no push transport at all.
    fn subscribe(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<Command>, MiniHubError>> + Send {
        async {
            Err(MiniHubError::Storage(Box::new(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "push subscription not supported by this queue",
            ))))
        }
    }
}

impl<T: RemoteCommandQueue> RemoteCommandQueue for Arc<T> {
    fn poll(&self, max: usize) -> impl Future<Output = Result<Vec<Command>, MiniHubError>> + Send {
        T::poll(self, max)
    }

    fn acknowledge(&self, command: &Command) -> impl Future<Output = Result<(), MiniHubError>> + Send {
        T::acknowledge(self, command)
    }

    fn claim(&self, command: &Command) -> impl Future<Output = Result<bool, MiniHubError>> + Send {
        T::claim(self, command)
    }

    fn subscribe(&self) -> impl Future<Output = Result<mpsc::Receiver<Command>, MiniHubError>> + Send {
        T::subscribe(self)
    }
}
