//! Owns the HID connection: connect handshake, background read loop, and
//! command writes.
//!
//! Failures never cross this boundary as panics. Open, read and write
//! errors end the current session and raise [`TransportEvent::Disconnected`];
//! there is no automatic reconnect.
//!
//! Safety: the read loop runs on one thread per session, stopped and joined
//! by `disconnect` and on drop.

use crate::config::DeviceCfg;
use crate::error::{Result, RotoError};
use crate::hw_error::map_hw_error;
use crate::protocol::{Command, FEATURE_REPORT, REPORT_LEN, RawState, Reassembler};
use crate::util::{hex_dump, lock};
use roto_traits::{HidLink, HidOpener};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// A complete state message was reassembled.
    State(RawState),
}

pub type TransportListener = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Counters for diagnostics.
#[derive(Debug, Default)]
pub struct TransportStats {
    pub reports_in: AtomicU64,
    pub messages_in: AtomicU64,
    pub dropped_in: AtomicU64,
    pub reports_out: AtomicU64,
}

#[derive(Default)]
struct Listeners(Mutex<Vec<TransportListener>>);

impl Listeners {
    fn emit(&self, ev: TransportEvent) {
        // call outside the lock so a listener may register others
        let snapshot: Vec<TransportListener> = lock(&self.0).clone();
        for l in snapshot {
            l(ev);
        }
    }
}

struct Session {
    link: Arc<dyn HidLink>,
    alive: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl Session {
    /// Stops the reader and waits for it unless called from the reader itself.
    fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.alive.store(false, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            match handle.join() {
                Ok(()) => tracing::trace!("read loop joined"),
                Err(e) => tracing::warn!(?e, "read loop panicked"),
            }
        }
    }
}

pub struct DeviceTransport {
    opener: Arc<dyn HidOpener>,
    cfg: DeviceCfg,
    session: Mutex<Option<Session>>,
    listeners: Arc<Listeners>,
    stats: Arc<TransportStats>,
}

impl DeviceTransport {
    pub fn new(opener: Arc<dyn HidOpener>, cfg: DeviceCfg) -> Self {
        Self {
            opener,
            cfg,
            session: Mutex::new(None),
            listeners: Arc::new(Listeners::default()),
            stats: Arc::new(TransportStats::default()),
        }
    }

    pub fn add_listener(&self, listener: TransportListener) {
        lock(&self.listeners.0).push(listener);
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.session)
            .as_ref()
            .is_some_and(|s| s.alive.load(Ordering::Relaxed))
    }

    /// Opens the device and performs the handshake. Returns `false` on any
    /// failure; the error is logged and `Disconnected` is raised.
    pub fn connect(&self) -> bool {
        let mut slot = lock(&self.session);
        if let Some(s) = slot.as_ref() {
            if s.alive.load(Ordering::Relaxed) {
                return true;
            }
        }
        if let Some(stale) = slot.take() {
            stale.shutdown();
        }

        match self.open_session() {
            Ok(session) => {
                *slot = Some(session);
                drop(slot);
                tracing::info!(vid = self.cfg.vid, pid = self.cfg.pid, "chair connected");
                self.listeners.emit(TransportEvent::Connected);
                true
            }
            Err(e) => {
                drop(slot);
                tracing::warn!(error = %e, "chair connect failed");
                self.listeners.emit(TransportEvent::Disconnected);
                false
            }
        }
    }

    fn open_session(&self) -> std::result::Result<Session, RotoError> {
        let link: Arc<dyn HidLink> = Arc::from(
            self.opener
                .open(self.cfg.vid, self.cfg.pid)
                .map_err(|e| map_hw_error(e.as_ref()))?,
        );

        link.send_feature(&FEATURE_REPORT)
            .map_err(|e| map_hw_error(e.as_ref()))?;
        let mut feature = [0u8; FEATURE_REPORT.len()];
        match link.get_feature(&mut feature) {
            Ok(n) => tracing::debug!(feature = %hex_dump(&feature[..n.min(feature.len())]), "feature read back"),
            Err(e) => tracing::debug!(error = %e, "feature read back failed"),
        }

        let report = Command::Connect.report()?;
        tracing::trace!(report = %hex_dump(&report), "tx connect");
        link.write(&report).map_err(|e| map_hw_error(e.as_ref()))?;
        self.stats.reports_out.fetch_add(1, Ordering::Relaxed);

        let alive = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(AtomicBool::new(false));
        let reader = spawn_reader(
            link.clone(),
            self.cfg.read_timeout(),
            alive.clone(),
            stop.clone(),
            self.listeners.clone(),
            self.stats.clone(),
        );
        Ok(Session {
            link,
            alive,
            stop,
            reader: Some(reader),
        })
    }

    /// Sends the disconnect message (best effort), stops the read loop and
    /// closes the link. Raises `Disconnected` if a session existed.
    pub fn disconnect(&self) {
        let Some(session) = lock(&self.session).take() else {
            return;
        };
        session.stop.store(true, Ordering::Relaxed);
        if session.alive.load(Ordering::Relaxed) {
            match Command::Disconnect.report() {
                Ok(r) => {
                    if let Err(e) = session.link.write(&r) {
                        tracing::debug!(error = %e, "disconnect write failed");
                    }
                }
                Err(e) => tracing::debug!(error = %e, "disconnect encode failed"),
            }
        }
        session.shutdown();
        tracing::info!("chair disconnected");
        self.listeners.emit(TransportEvent::Disconnected);
    }

    /// Encodes and writes one command. A write failure ends the session.
    pub fn send(&self, cmd: &Command) -> Result<()> {
        let report = cmd.report()?;
        let link = {
            let slot = lock(&self.session);
            match slot.as_ref() {
                Some(s) if s.alive.load(Ordering::Relaxed) => s.link.clone(),
                _ => return Err(RotoError::NotConnected.into()),
            }
        };
        tracing::trace!(report = %hex_dump(&report), "tx");
        match link.write(&report) {
            Ok(_) => {
                self.stats.reports_out.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                let err = map_hw_error(e.as_ref());
                tracing::warn!(error = %err, "write failed, dropping session");
                let stale = lock(&self.session).take();
                if let Some(s) = stale {
                    s.shutdown();
                    self.listeners.emit(TransportEvent::Disconnected);
                }
                Err(err.into())
            }
        }
    }
}

impl Drop for DeviceTransport {
    fn drop(&mut self) {
        if let Some(s) = lock(&self.session).take() {
            s.shutdown();
        }
    }
}

fn spawn_reader(
    link: Arc<dyn HidLink>,
    timeout: std::time::Duration,
    alive: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    listeners: Arc<Listeners>,
    stats: Arc<TransportStats>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut reassembler = Reassembler::new();
        let mut buf = [0u8; REPORT_LEN];
        loop {
            if stop.load(Ordering::Relaxed) {
                tracing::debug!("read loop received shutdown signal");
                break;
            }
            match link.read(&mut buf, timeout) {
                Ok(0) => {}
                Ok(n) => {
                    stats.reports_in.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(report = %hex_dump(&buf[..n]), "rx");
                    let before = reassembler.dropped();
                    if let Some(state) = reassembler.push(&buf[..n]) {
                        stats.messages_in.fetch_add(1, Ordering::Relaxed);
                        listeners.emit(TransportEvent::State(state));
                    }
                    stats
                        .dropped_in
                        .fetch_add(reassembler.dropped() - before, Ordering::Relaxed);
                }
                Err(e) => {
                    if !stop.load(Ordering::Relaxed) {
                        tracing::warn!(error = %e, "read failed, connection lost");
                        alive.store(false, Ordering::Relaxed);
                        listeners.emit(TransportEvent::Disconnected);
                    }
                    break;
                }
            }
        }
        tracing::trace!("read loop exiting cleanly");
    })
}
