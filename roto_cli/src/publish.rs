//! UDP telemetry publisher.
//!
//! Sends the 64-byte little-endian telemetry record to one unicast target
//! whenever the record changed, at most once per interval. Send failures are
//! logged and never stop the publisher.

use roto_core::TelemetrySink;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

pub struct UdpPublisher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl UdpPublisher {
    pub fn spawn(
        target: SocketAddr,
        interval: Duration,
        sink: Arc<TelemetrySink>,
    ) -> eyre::Result<Self> {
        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("roto-telemetry".into())
            .spawn(move || {
                let mut seen = 0;
                let mut sent: u64 = 0;
                while !stop_flag.load(Ordering::Relaxed) {
                    if let Some((v, record)) = sink.changed_since(seen) {
                        seen = v;
                        match socket.send_to(&record.to_bytes(), target) {
                            Ok(_) => sent += 1,
                            Err(e) => tracing::debug!(error = %e, %target, "telemetry send failed"),
                        }
                    }
                    std::thread::sleep(interval);
                }
                tracing::debug!(sent, "telemetry publisher stopped");
            })?;
        tracing::info!(%target, interval_ms = interval.as_millis() as u64, "telemetry publisher started");
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for UdpPublisher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take()
            && let Err(e) = h.join()
        {
            tracing::warn!(?e, "telemetry publisher panicked");
        }
    }
}
