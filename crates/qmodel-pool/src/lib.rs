//! Bounded connection pools.
//!
//! `min_size` connections are created up front; the pool grows on demand up
//! to `max_size`. At the cap, `acquire` waits up to `timeout` and then
//! fails with a pool-exhausted error. With `check_on_acquire` set, every
//! connection is pinged before being handed out and dead ones are replaced
//! transparently. A connection released in broken state is closed and
//! leaves the count, so a later acquire can open a replacement.
//!
//! Ownership is single-holder: the pool transfers the connection to the
//! caller for the duration of the acquisition.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use asupersync::{Cx, Outcome};
use qmodel_core::{task, Error, Result};
use qmodel_ipc::{AsyncConnection, ConnectConfig, SyncConnection};

/// Sizing and health-check knobs shared by both pool variants.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    /// Deadline for `acquire` once the pool is at capacity.
    pub timeout: Duration,
    /// Ping connections before handing them out.
    pub check_on_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            timeout: Duration::from_secs(30),
            check_on_acquire: true,
        }
    }
}

impl PoolConfig {
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self {
            min_size,
            max_size,
            ..Self::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn check_on_acquire(mut self, check: bool) -> Self {
        self.check_on_acquire = check;
        self
    }
}

// ==================== Synchronous pool ====================

struct SyncState {
    idle: VecDeque<SyncConnection>,
    size: usize,
    closed: bool,
}

/// Thread-safe pool of blocking connections.
pub struct SyncPool {
    connect: ConnectConfig,
    config: PoolConfig,
    state: Mutex<SyncState>,
    available: Condvar,
}

impl SyncPool {
    /// Create the pool and pre-open `min_size` connections.
    pub fn new(connect: ConnectConfig, config: PoolConfig) -> Result<Self> {
        let pool = Self {
            connect,
            config,
            state: Mutex::new(SyncState {
                idle: VecDeque::new(),
                size: 0,
                closed: false,
            }),
            available: Condvar::new(),
        };
        for _ in 0..pool.config.min_size {
            let conn = pool.open_connection()?;
            let mut state = pool.lock();
            state.idle.push_back(conn);
            state.size += 1;
        }
        Ok(pool)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SyncState> {
        self.state.lock().expect("pool state poisoned")
    }

    fn open_connection(&self) -> Result<SyncConnection> {
        let mut conn = SyncConnection::new(self.connect.clone());
        conn.open()?;
        Ok(conn)
    }

    /// Live connection count (idle + handed out).
    pub fn size(&self) -> usize {
        self.lock().size
    }

    pub fn idle(&self) -> usize {
        self.lock().idle.len()
    }

    /// Take a connection, waiting up to the configured timeout at the cap.
    pub fn acquire(&self) -> Result<SyncConnection> {
        let deadline = Instant::now() + self.config.timeout;
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(Error::pool_closed("acquire on a closed pool"));
            }
            if let Some(conn) = state.idle.pop_front() {
                drop(state);
                return self.check_out(conn, deadline);
            }
            if state.size < self.config.max_size {
                state.size += 1;
                drop(state);
                match self.open_connection() {
                    Ok(conn) => return Ok(conn),
                    Err(e) => {
                        self.forget_one();
                        return Err(e);
                    }
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::pool_exhausted(format!(
                    "no connections available within {:?} (max {})",
                    self.config.timeout, self.config.max_size
                )));
            }
            let (guard, wait) = self
                .available
                .wait_timeout(state, remaining)
                .expect("pool state poisoned");
            state = guard;
            if wait.timed_out() && state.idle.is_empty() && state.size >= self.config.max_size {
                return Err(Error::pool_exhausted(format!(
                    "no connections available within {:?} (max {})",
                    self.config.timeout, self.config.max_size
                )));
            }
        }
    }

    /// Health-check a pooled connection; replace it while the deadline
    /// allows.
    fn check_out(&self, mut conn: SyncConnection, deadline: Instant) -> Result<SyncConnection> {
        if !self.config.check_on_acquire || conn.ping() {
            return Ok(conn);
        }
        tracing::debug!(address = %self.connect.address(), "replacing dead pooled connection");
        conn.close();
        loop {
            if Instant::now() >= deadline {
                self.forget_one();
                return Err(Error::pool_exhausted(
                    "timed out replacing a dead connection",
                ));
            }
            match self.open_connection() {
                Ok(mut fresh) => {
                    if !self.config.check_on_acquire || fresh.ping() {
                        return Ok(fresh);
                    }
                    fresh.close();
                }
                Err(e) => {
                    self.forget_one();
                    return Err(e);
                }
            }
        }
    }

    /// Return a connection to the idle set. Broken connections are closed
    /// and dropped from the count.
    pub fn release(&self, mut conn: SyncConnection) {
        let mut state = self.lock();
        if state.closed {
            conn.close();
            state.size = state.size.saturating_sub(1);
            return;
        }
        if conn.is_open() && !conn.is_broken() {
            state.idle.push_back(conn);
        } else {
            conn.close();
            state.size = state.size.saturating_sub(1);
        }
        drop(state);
        self.available.notify_one();
    }

    fn forget_one(&self) {
        let mut state = self.lock();
        state.size = state.size.saturating_sub(1);
        drop(state);
        self.available.notify_one();
    }

    /// Close every idle connection and refuse further acquires.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        while let Some(mut conn) = state.idle.pop_front() {
            conn.close();
            state.size = state.size.saturating_sub(1);
        }
        drop(state);
        self.available.notify_all();
    }
}

// ==================== Asynchronous pool ====================

struct AsyncState {
    idle: VecDeque<AsyncConnection>,
    size: usize,
    closed: bool,
}

/// Task-safe pool of cooperative connections.
pub struct AsyncPool {
    connect: ConnectConfig,
    config: PoolConfig,
    state: asupersync::sync::Mutex<AsyncState>,
}

/// Wait granularity while parked at the pool cap.
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(5);

impl AsyncPool {
    pub fn new(connect: ConnectConfig, config: PoolConfig) -> Self {
        Self {
            connect,
            config,
            state: asupersync::sync::Mutex::new(AsyncState {
                idle: VecDeque::new(),
                size: 0,
                closed: false,
            }),
        }
    }

    /// Pre-open `min_size` connections.
    pub async fn initialize(&self, cx: &Cx) -> Outcome<(), Error> {
        for _ in 0..self.config.min_size {
            let conn = match self.open_connection(cx).await {
                Outcome::Ok(c) => c,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };
            let Ok(mut state) = self.state.lock(cx).await else {
                return Outcome::Err(Error::pool_closed("cannot lock pool state"));
            };
            state.idle.push_back(conn);
            state.size += 1;
        }
        Outcome::Ok(())
    }

    async fn open_connection(&self, cx: &Cx) -> Outcome<AsyncConnection, Error> {
        let mut conn = AsyncConnection::new(self.connect.clone());
        match conn.open(cx).await {
            Outcome::Ok(()) => Outcome::Ok(conn),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    pub async fn size(&self, cx: &Cx) -> usize {
        match self.state.lock(cx).await {
            Ok(state) => state.size,
            Err(_) => 0,
        }
    }

    /// Take a connection; suspends until one frees up or `timeout`
    /// elapses.
    pub async fn acquire(&self, cx: &Cx) -> Outcome<AsyncConnection, Error> {
        let deadline = Instant::now() + self.config.timeout;
        loop {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            let action = {
                let Ok(mut state) = self.state.lock(cx).await else {
                    return Outcome::Err(Error::pool_closed("cannot lock pool state"));
                };
                if state.closed {
                    return Outcome::Err(Error::pool_closed("acquire on a closed pool"));
                }
                if let Some(conn) = state.idle.pop_front() {
                    Some(conn)
                } else if state.size < self.config.max_size {
                    state.size += 1;
                    None
                } else {
                    if Instant::now() >= deadline {
                        return Outcome::Err(Error::pool_exhausted(format!(
                            "no connections available within {:?} (max {})",
                            self.config.timeout, self.config.max_size
                        )));
                    }
                    drop(state);
                    task::sleep_for(ACQUIRE_POLL_INTERVAL).await;
                    continue;
                }
            };

            match action {
                Some(conn) => match self.check_out(cx, conn, deadline).await {
                    Outcome::Ok(conn) => return Outcome::Ok(conn),
                    other => return other,
                },
                None => match self.open_connection(cx).await {
                    Outcome::Ok(conn) => return Outcome::Ok(conn),
                    Outcome::Err(e) => {
                        self.forget_one(cx).await;
                        return Outcome::Err(e);
                    }
                    Outcome::Cancelled(r) => {
                        self.forget_one(cx).await;
                        return Outcome::Cancelled(r);
                    }
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                },
            }
        }
    }

    async fn check_out(
        &self,
        cx: &Cx,
        mut conn: AsyncConnection,
        deadline: Instant,
    ) -> Outcome<AsyncConnection, Error> {
        if !self.config.check_on_acquire || conn.ping(cx).await {
            return Outcome::Ok(conn);
        }
        tracing::debug!(address = %self.connect.address(), "replacing dead pooled connection");
        let _ = conn.close().await;
        loop {
            if Instant::now() >= deadline {
                self.forget_one(cx).await;
                return Outcome::Err(Error::pool_exhausted(
                    "timed out replacing a dead connection",
                ));
            }
            match self.open_connection(cx).await {
                Outcome::Ok(mut fresh) => {
                    if !self.config.check_on_acquire || fresh.ping(cx).await {
                        return Outcome::Ok(fresh);
                    }
                    let _ = fresh.close().await;
                }
                Outcome::Err(e) => {
                    self.forget_one(cx).await;
                    return Outcome::Err(e);
                }
                Outcome::Cancelled(r) => {
                    self.forget_one(cx).await;
                    return Outcome::Cancelled(r);
                }
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
    }

    pub async fn release(&self, cx: &Cx, mut conn: AsyncConnection) {
        let Ok(mut state) = self.state.lock(cx).await else {
            return;
        };
        if state.closed {
            let _ = conn.close().await;
            state.size = state.size.saturating_sub(1);
            return;
        }
        if conn.is_open() && !conn.is_broken() {
            state.idle.push_back(conn);
        } else {
            let _ = conn.close().await;
            state.size = state.size.saturating_sub(1);
        }
    }

    async fn forget_one(&self, cx: &Cx) {
        if let Ok(mut state) = self.state.lock(cx).await {
            state.size = state.size.saturating_sub(1);
        }
    }

    pub async fn close(&self, cx: &Cx) {
        let Ok(mut state) = self.state.lock(cx).await else {
            return;
        };
        state.closed = true;
        while let Some(mut conn) = state.idle.pop_front() {
            let _ = conn.close().await;
            state.size = state.size.saturating_sub(1);
        }
    }
}
