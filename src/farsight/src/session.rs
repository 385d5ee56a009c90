//! Attached-process session
//!
//! A [`Session`] owns everything built on top of one memory source: the
//! channel, buffer pool, entity registries and their worker threads. It lives
//! until the process goes away or the caller shuts it down; a new process
//! needs a new session.

use crate::cache::DEFAULT_CACHE_TTL;
use crate::channel::MemoryChannel;
use crate::collection::{BufferPool, DEFAULT_MAX_IDLE_BUFFERS};
use crate::context::ReadContext;
use crate::entities::{Explosive, Player, QuestEntry};
use crate::entity::Tracked;
use crate::error::{ChannelError, ReadError, SessionError};
use crate::layout::LayoutTable;
use crate::registry::Registry;
use crate::scheduler::{Cadence, CancelToken, Worker};
use crate::source::MemorySource;

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Timing knobs for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Players loop
    pub world_interval: Duration,
    pub explosives_interval: Duration,
    pub quests_interval: Duration,
    /// How often liveness is polled and the read cache is swept
    pub liveness_interval: Duration,
    pub cache_ttl: Duration,
    /// Hold a constant period instead of sleeping a fixed delay
    pub dynamic_sleep: bool,
    pub max_idle_buffers: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            world_interval: Duration::from_millis(50),
            explosives_interval: Duration::from_millis(100),
            quests_interval: Duration::from_millis(1000),
            liveness_interval: Duration::from_millis(500),
            cache_ttl: DEFAULT_CACHE_TTL,
            dynamic_sleep: true,
            max_idle_buffers: DEFAULT_MAX_IDLE_BUFFERS,
        }
    }
}

/// Compact, serializable view of every registry at one instant
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub uptime_ms: u64,
    pub lost: bool,
    pub players: Vec<Player>,
    pub explosives: Vec<Explosive>,
    pub quests: Vec<QuestEntry>,
}

/// State shared between a session and its workers
struct Tracking {
    ctx: Arc<ReadContext>,
    players: Arc<Registry<Player>>,
    explosives: Arc<Registry<Explosive>>,
    quests: Arc<Registry<QuestEntry>>,
    lost: AtomicBool,
}

impl Tracking {
    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    /// Drop every tracked entity, cached read and pooled buffer
    fn release(&self) {
        self.players.clear();
        self.explosives.clear();
        self.quests.clear();
        self.ctx.channel.cache().clear();
        self.ctx.pool.clear();
    }

    /// First caller logs and tears everything down; workers stop either way
    fn mark_lost(&self, token: &CancelToken, err: &ReadError) {
        token.cancel();
        if !self.lost.swap(true, Ordering::SeqCst) {
            warn!(error = %err, "target lost, stopping session");
            self.release();
        }
    }
}

pub struct Session {
    tracking: Arc<Tracking>,
    cancel: CancelToken,
    workers: Vec<Worker>,
    started: Instant,
}

impl Session {
    /// Resolve offsets, build the registries and start every worker
    pub fn start(
        source: Arc<dyn MemorySource>,
        layout: LayoutTable,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        layout.validate()?;
        let layout = Arc::new(layout);
        let channel = Arc::new(MemoryChannel::new(source, config.cache_ttl));
        let pool = Arc::new(BufferPool::new(config.max_idle_buffers));
        let ctx = Arc::new(ReadContext::new(channel, Arc::clone(&layout), pool)?);

        let tracking = Arc::new(Tracking {
            players: Arc::new(Registry::new(&layout)?),
            explosives: Arc::new(Registry::new(&layout)?),
            quests: Arc::new(Registry::new(&layout)?),
            ctx,
            lost: AtomicBool::new(false),
        });
        let mut session = Self {
            tracking,
            cancel: CancelToken::new(),
            workers: Vec::new(),
            started: Instant::now(),
        };

        let cadence = |interval| Cadence::new(interval, config.dynamic_sleep);
        let (players, explosives, quests) = (
            Arc::clone(&session.tracking.players),
            Arc::clone(&session.tracking.explosives),
            Arc::clone(&session.tracking.quests),
        );
        session.spawn_refresh("players", cadence(config.world_interval), players)?;
        session.spawn_refresh("explosives", cadence(config.explosives_interval), explosives)?;
        session.spawn_refresh("quests", cadence(config.quests_interval), quests)?;
        session.spawn_liveness(config.liveness_interval)?;

        info!(
            layout = %layout.version,
            module = %layout.module,
            workers = session.workers.len(),
            "session started"
        );
        Ok(session)
    }

    fn spawn_refresh<E: Tracked>(
        &mut self,
        name: &str,
        cadence: Cadence,
        registry: Arc<Registry<E>>,
    ) -> Result<(), SessionError> {
        let tracking = Arc::clone(&self.tracking);
        let worker = Worker::spawn(name, cadence, self.cancel.clone(), move |token| {
            let result = registry.refresh(&tracking.ctx, token);
            // A tick racing the loss may have refilled what was released
            if tracking.is_lost() {
                tracking.release();
            }
            match result {
                Ok(stats) => {
                    if stats.added > 0 || stats.removed > 0 {
                        debug!(
                            kind = E::KIND,
                            added = stats.added,
                            removed = stats.removed,
                            tracked = stats.tracked,
                            "registry changed"
                        );
                    }
                    Ok(())
                }
                Err(err) => {
                    if err.is_fatal() {
                        tracking.mark_lost(token, &err);
                    }
                    Err(err)
                }
            }
        })
        .map_err(|source| SessionError::Spawn {
            name: name.to_string(),
            source,
        })?;
        self.workers.push(worker);
        Ok(())
    }

    fn spawn_liveness(&mut self, interval: Duration) -> Result<(), SessionError> {
        let tracking = Arc::clone(&self.tracking);
        let cadence = Cadence::Fixed(interval);
        let worker = Worker::spawn("liveness", cadence, self.cancel.clone(), move |token| {
            let channel = &tracking.ctx.channel;
            if !channel.is_alive() {
                let err = ReadError::from(ChannelError::ProcessGone);
                tracking.mark_lost(token, &err);
                return Err(err);
            }
            let purged = channel.maintain();
            trace!(purged, cached = channel.cache().len(), "cache swept");
            Ok(())
        })
        .map_err(|source| SessionError::Spawn {
            name: "liveness".to_string(),
            source,
        })?;
        self.workers.push(worker);
        Ok(())
    }

    pub fn players(&self) -> &Arc<Registry<Player>> {
        &self.tracking.players
    }

    pub fn explosives(&self) -> &Arc<Registry<Explosive>> {
        &self.tracking.explosives
    }

    pub fn quests(&self) -> &Arc<Registry<QuestEntry>> {
        &self.tracking.quests
    }

    pub fn context(&self) -> &Arc<ReadContext> {
        &self.tracking.ctx
    }

    /// The process went away. Registries, cache and pool have been released
    /// and the session will not recover.
    pub fn is_lost(&self) -> bool {
        self.tracking.is_lost()
    }

    /// Block until the session is lost or shut down, or `timeout` passes.
    /// Returns whether the session was lost.
    pub fn wait_until_lost(&self, timeout: Duration) -> bool {
        self.cancel.wait(timeout);
        self.is_lost()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            uptime_ms: self.uptime().as_millis() as u64,
            lost: self.is_lost(),
            players: self.players().collect(Player::clone),
            explosives: self.explosives().collect(Explosive::clone),
            quests: self.quests().collect(QuestEntry::clone),
        }
    }

    /// Stop every worker and release everything the session holds
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.cancel.cancel();
        for worker in &mut self.workers {
            worker.stop();
        }
        self.workers.clear();

        self.tracking.release();
        info!(lost = self.is_lost(), "session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
