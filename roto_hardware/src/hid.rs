use crate::error::HwError;
use hidapi::{HidApi, HidDevice};
use roto_traits::{HidLink, HidOpener};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Longest a single read holds the device lock, so writers are not starved.
const READ_SLICE: Duration = Duration::from_millis(5);

/// A chair reached through the platform's HID stack.
pub struct HidapiLink {
    dev: Mutex<HidDevice>,
}

fn hid_err(e: hidapi::HidError) -> HwError {
    HwError::Hid(e.to_string())
}

impl HidapiLink {
    fn dev(&self) -> MutexGuard<'_, HidDevice> {
        self.dev.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HidLink for HidapiLink {
    fn write(&self, report: &[u8]) -> Result<usize, BoxError> {
        let n = self.dev().write(report).map_err(hid_err)?;
        tracing::trace!(bytes = n, "hid write");
        Ok(n)
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, BoxError> {
        if buf.len() < 2 {
            return Err(Box::new(HwError::Hid("read buffer too small".into())));
        }
        // hidapi strips the id of unnumbered reports; keep the report layout
        // identical to what the codec expects by putting id 0 back.
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let slice = left.min(READ_SLICE);
            let ms = i32::try_from(slice.as_millis()).unwrap_or(i32::MAX);
            let n = self.dev().read_timeout(&mut buf[1..], ms).map_err(hid_err)?;
            if n > 0 {
                buf[0] = 0;
                return Ok(n + 1);
            }
            if left.is_zero() {
                return Ok(0);
            }
        }
    }

    fn send_feature(&self, data: &[u8]) -> Result<(), BoxError> {
        self.dev().send_feature_report(data).map_err(hid_err)?;
        Ok(())
    }

    fn get_feature(&self, buf: &mut [u8]) -> Result<usize, BoxError> {
        if let Some(id) = buf.first_mut() {
            *id = 0;
        }
        Ok(self.dev().get_feature_report(buf).map_err(hid_err)?)
    }
}

/// Opens the chair with hidapi.
#[derive(Debug, Default, Clone, Copy)]
pub struct HidapiOpener;

impl HidOpener for HidapiOpener {
    fn open(&self, vid: u16, pid: u16) -> Result<Box<dyn HidLink>, BoxError> {
        let api = HidApi::new().map_err(hid_err)?;
        let dev = api.open(vid, pid).map_err(hid_err)?;
        match dev.get_product_string() {
            Ok(Some(name)) => tracing::info!(vid, pid, %name, "opened HID device"),
            _ => tracing::info!(vid, pid, "opened HID device"),
        }
        Ok(Box::new(HidapiLink {
            dev: Mutex::new(dev),
        }))
    }
}
