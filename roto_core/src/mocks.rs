//! Test and helper mocks for roto_core.
//!
//! [`MockLink`] is a scriptable in-memory HID link: tests queue incoming
//! reports, inspect what was written, and inject failures. With mode
//! confirmation enabled it answers every SetMode with a state report the
//! way the device does.

use crate::protocol::{Command, REPORT_LEN, Report, split_into_reports, state_message};
use crate::types::ModeType;
use crate::util::lock;
use roto_traits::{HidLink, HidOpener};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Default)]
struct MockState {
    incoming: Mutex<VecDeque<Vec<u8>>>,
    written: Mutex<Vec<Vec<u8>>>,
    features: Mutex<Vec<Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    confirm_modes: AtomicBool,
    angle: AtomicI32,
}

/// Cloneable handle; clones share the same script and history.
#[derive(Clone, Default)]
pub struct MockLink {
    st: Arc<MockState>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer SetMode commands with a confirming state report.
    pub fn confirm_modes(self, on: bool) -> Self {
        self.st.confirm_modes.store(on, Ordering::Relaxed);
        self
    }

    pub fn set_fail_writes(&self, on: bool) {
        self.st.fail_writes.store(on, Ordering::Relaxed);
    }

    pub fn set_fail_reads(&self, on: bool) {
        self.st.fail_reads.store(on, Ordering::Relaxed);
    }

    pub fn push_report(&self, report: &[u8]) {
        lock(&self.st.incoming).push_back(report.to_vec());
    }

    /// Queues a state message split into a first packet and a continuation.
    pub fn push_state(&self, mode: ModeType, angle: i32) {
        self.st.angle.store(angle, Ordering::Relaxed);
        for r in split_into_reports(&state_message(mode, angle), 8, 11) {
            self.push_report(&r);
        }
    }

    pub fn pending(&self) -> usize {
        lock(&self.st.incoming).len()
    }

    /// Raw reports written so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.st.written).clone()
    }

    /// Written reports parsed back into commands.
    pub fn commands(&self) -> Vec<Command> {
        self.written()
            .iter()
            .filter_map(|r| Command::parse(r))
            .collect()
    }

    pub fn features(&self) -> Vec<Vec<u8>> {
        lock(&self.st.features).clone()
    }

    pub fn clear_written(&self) {
        lock(&self.st.written).clear();
    }
}

impl HidLink for MockLink {
    fn write(&self, report: &[u8]) -> Result<usize, BoxError> {
        if self.st.fail_writes.load(Ordering::Relaxed) {
            return Err("mock write failure".into());
        }
        lock(&self.st.written).push(report.to_vec());
        if self.st.confirm_modes.load(Ordering::Relaxed) {
            if let Some(Command::SetMode { mode, .. }) = Command::parse(report) {
                let angle = self.st.angle.load(Ordering::Relaxed);
                self.push_state(mode.device_mode(), angle);
            }
        }
        Ok(report.len())
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, BoxError> {
        if self.st.fail_reads.load(Ordering::Relaxed) {
            return Err("mock read failure".into());
        }
        let next = lock(&self.st.incoming).pop_front();
        match next {
            Some(r) => {
                let n = r.len().min(buf.len()).min(REPORT_LEN);
                buf[..n].copy_from_slice(&r[..n]);
                Ok(n)
            }
            None => {
                std::thread::sleep(timeout.min(Duration::from_millis(2)));
                Ok(0)
            }
        }
    }

    fn send_feature(&self, data: &[u8]) -> Result<(), BoxError> {
        lock(&self.st.features).push(data.to_vec());
        Ok(())
    }

    fn get_feature(&self, buf: &mut [u8]) -> Result<usize, BoxError> {
        let last = lock(&self.st.features).last().cloned().unwrap_or_default();
        let n = last.len().min(buf.len());
        buf[..n].copy_from_slice(&last[..n]);
        Ok(n)
    }
}

/// Opener handing out clones of one [`MockLink`], or failing on demand.
#[derive(Clone, Default)]
pub struct MockOpener {
    link: MockLink,
    fail: Arc<AtomicBool>,
}

impl MockOpener {
    pub fn new(link: MockLink) -> Self {
        Self {
            link,
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// An opener that never finds a device.
    pub fn absent() -> Self {
        let o = Self::default();
        o.fail.store(true, Ordering::Relaxed);
        o
    }

    pub fn link(&self) -> &MockLink {
        &self.link
    }
}

impl HidOpener for MockOpener {
    fn open(&self, vid: u16, pid: u16) -> Result<Box<dyn HidLink>, BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(format!("no device {vid:04x}:{pid:04x}").into());
        }
        Ok(Box::new(self.link.clone()))
    }
}

/// An empty report, handy for desync tests.
pub fn blank_report() -> Report {
    [0; REPORT_LEN]
}
