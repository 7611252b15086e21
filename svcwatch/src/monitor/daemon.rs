use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use svcwatch_shared::run_state::StateMap;
use svcwatch_shared::service_spec::ServiceConfig;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::sleep;

use super::Monitor;
use super::gate::should_check;
use super::store::StateStore;
use crate::config::MonitorConfig;

impl Monitor {
    /// Long-lived mode. Each service gets its own task that re-evaluates the
    /// gate every `tick`; after each poll the whole map is saved under the
    /// shared lock. Returns once the shutdown token fires and every task has
    /// finished its current poll.
    pub async fn watch(
        self: Arc<Self>,
        config: &MonitorConfig,
        store: Arc<dyn StateStore>,
    ) -> Result<()> {
        let states = Arc::new(Mutex::new(store.load()?));
        let tick = config.effective_tick();
        let mut tasks = JoinSet::new();

        for (name, svc) in &config.services {
            tasks.spawn(watch_service(
                self.clone(),
                name.clone(),
                svc.clone(),
                states.clone(),
                store.clone(),
                tick,
            ));
        }

        tracing::info!(
            "Watching {} services on {} (tick {:?})",
            config.services.len(),
            self.host(),
            tick
        );

        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                tracing::error!("watch task failed: {e}");
            }
        }

        tracing::info!("All watchers stopped");
        Ok(())
    }
}

async fn watch_service(
    monitor: Arc<Monitor>,
    name: String,
    svc: ServiceConfig,
    states: Arc<Mutex<StateMap>>,
    store: Arc<dyn StateStore>,
    tick: Duration,
) {
    let token = monitor.shutdown_token().clone();

    loop {
        if token.is_cancelled() {
            break;
        }

        // only this task writes this service's entry
        let prior = states.lock().await.get(&name).cloned().unwrap_or_default();
        let now = Utc::now();

        if should_check(&prior, svc.check_interval_seconds, now) {
            let next = monitor.apply_poll(&name, &svc, prior, now).await;
            let mut guard = states.lock().await;
            guard.insert(name.clone(), next);
            if let Err(e) = store.save(&guard) {
                tracing::error!("failed to persist state after polling {}: {e}", name);
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = sleep(tick) => {}
        }
    }

    tracing::debug!("watcher for {} stopped", name);
}
