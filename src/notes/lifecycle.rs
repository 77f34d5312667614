//! Lifecycle coordinator - periodic cache sweeps and app-state hooks
//!
//! Runs independently of user actions: a repeating sweep drives the
//! derived-stats cache eviction policy (with a forced full clear every tenth
//! sweep), a resident-memory probe reacts to memory pressure, and the
//! foreground/background hooks persist, repair, and prefetch at the right
//! moments. The sweep task is torn down deterministically through a stop
//! channel.

use super::manager::NoteManager;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::{mpsc, RwLock};

/// Tuning knobs for the coordinator
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Sweep period
    pub sweep_interval: Duration,
    /// Every Nth sweep forces a full cache clear
    pub full_clear_every: u64,
    /// Resident-set size that counts as memory pressure
    pub memory_limit_bytes: u64,
    /// Time away after which a foreground transition rebuilds the prefetch
    /// caches
    pub foreground_rebuild_after: ChronoDuration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            full_clear_every: 10,
            memory_limit_bytes: 100 * 1024 * 1024,
            foreground_rebuild_after: ChronoDuration::minutes(10),
        }
    }
}

/// Owns the periodic sweep task and the app-state transition hooks
pub struct LifecycleCoordinator {
    manager: Arc<RwLock<NoteManager>>,
    config: LifecycleConfig,
    stop_tx: Option<mpsc::Sender<()>>,
    last_background: Option<DateTime<Utc>>,
}

impl LifecycleCoordinator {
    pub fn new(manager: Arc<RwLock<NoteManager>>, config: LifecycleConfig) -> Self {
        Self {
            manager,
            config,
            stop_tx: None,
            last_background: None,
        }
    }

    /// Start the sweep background task. Idempotent while running.
    pub fn start(&mut self) {
        if self.stop_tx.is_some() {
            return;
        }

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        self.stop_tx = Some(stop_tx);

        let manager = self.manager.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + config.sweep_interval;
            let mut ticker = tokio::time::interval_at(start, config.sweep_interval);
            let mut sweeps: u64 = 0;

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!(sweeps, "lifecycle sweep stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        sweeps += 1;
                        let mut mgr = manager.write().await;
                        mgr.drain_completions();

                        if sweeps % config.full_clear_every == 0 {
                            mgr.invalidate_caches();
                            tracing::debug!(sweeps, "forced full cache clear");
                        } else {
                            let evicted = mgr.evict_caches();
                            if evicted > 0 {
                                tracing::debug!(evicted, "cache sweep evicted entries");
                            }
                        }
                        drop(mgr);

                        check_pressure(&manager, config.memory_limit_bytes).await;
                    }
                }
            }
        });
    }

    /// Stop the sweep task
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    /// One-shot memory-pressure check: on pressure, full cache clear plus
    /// release of scratch allocations. Returns whether pressure was detected.
    pub async fn check_memory_pressure(&self) -> bool {
        check_pressure(&self.manager, self.config.memory_limit_bytes).await
    }

    /// Transition to background: persist immediately, run the opportunistic
    /// eviction, record the transition time
    pub async fn on_background(&mut self) {
        {
            let mut mgr = self.manager.write().await;
            mgr.save_now().await;
            mgr.evict_caches();
        }
        self.last_background = Some(Utc::now());
        tracing::debug!("entered background, notes persisted");
    }

    /// Transition to foreground: re-validate the collection; after a long
    /// absence, rebuild the tag/stats prefetch caches asynchronously
    pub async fn on_foreground(&mut self) {
        let mut mgr = self.manager.write().await;
        let repaired = mgr.validate_and_repair();
        if repaired > 0 {
            tracing::info!(repaired, "foreground validation repaired notes");
        }

        let away_long = self
            .last_background
            .is_some_and(|t| Utc::now() - t > self.config.foreground_rebuild_after);
        if away_long {
            tracing::debug!("long background period, rebuilding prefetch caches");
            mgr.spawn_prefetch();
        }
    }
}

async fn check_pressure(manager: &Arc<RwLock<NoteManager>>, limit_bytes: u64) -> bool {
    let Some(resident) = resident_memory_bytes() else {
        return false;
    };
    if resident <= limit_bytes {
        return false;
    }

    tracing::warn!(
        resident_mib = resident / (1024 * 1024),
        limit_mib = limit_bytes / (1024 * 1024),
        "memory pressure, releasing caches"
    );
    manager.write().await.release_memory();
    true
}

/// Resident-set size of this process, in bytes
fn resident_memory_bytes() -> Option<u64> {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map(|p| p.memory())
}
