pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// One open HID connection to the chair.
///
/// Reports are exchanged as whole fixed-size packets including the leading
/// report id byte. Methods take `&self` so the read loop and the command
/// senders can share one link; implementations serialize access internally.
pub trait HidLink: Send + Sync {
    /// Write one output report. Returns the number of bytes accepted.
    fn write(&self, report: &[u8]) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;

    /// Block for at most `timeout` waiting for one input report.
    /// Returns `Ok(0)` when nothing arrived in time.
    fn read(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;

    fn send_feature(&self, data: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn get_feature(&self, buf: &mut [u8])
    -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;
}

/// Opens a [`HidLink`] by USB vendor/product id.
pub trait HidOpener: Send + Sync {
    fn open(
        &self,
        vid: u16,
        pid: u16,
    ) -> Result<Box<dyn HidLink>, Box<dyn std::error::Error + Send + Sync>>;
}
