//! Task groups bound to the lifetime of one installation state.
//!
//! Every task spawned into a [`StateScope`] is cancelled when the scope is
//! shut down or dropped. `shutdown` also waits for the tasks to finish, so
//! their cleanup (fading out sound, releasing sockets) has run before the
//! next state starts.

use log::{debug, error};
use std::future::Future;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct StateScope {
    name: &'static str,
    token: CancellationToken,
    tasks: JoinSet<()>,
}

impl StateScope {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            token: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Run `task` until it completes or the scope ends.
    pub fn spawn<F>(&mut self, task_name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        let scope = self.name;
        self.tasks.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("[{}] {} cancelled", scope, task_name);
                }
                _ = task => {
                    debug!("[{}] {} finished", scope, task_name);
                }
            }
        });
    }

    /// Cancel every task and wait until all of them have stopped.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined
                && e.is_panic()
            {
                error!("[{}] Task panicked: {}", self.name, e);
            }
        }
    }
}

impl Drop for StateScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
