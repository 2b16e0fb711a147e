use crate::actor::WeakActorClient;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};

/// Periodically posts an anti-entropy tick to the replica actor. The task stops when this handle
/// is dropped or when the actor is gone.
pub(crate) struct AntiEntropyTimerHandle {
    task: JoinHandle<()>,
}

impl AntiEntropyTimerHandle {
    pub(crate) fn spawn_timer_task(interval: Duration, actor_client: WeakActorClient) -> Self {
        let task = tokio::task::spawn(run(interval, actor_client));
        AntiEntropyTimerHandle { task }
    }
}

impl Drop for AntiEntropyTimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(interval: Duration, actor_client: WeakActorClient) {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if actor_client.anti_entropy_tick().await.is_err() {
            return;
        }
    }
}
