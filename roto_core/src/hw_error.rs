//! Maps `Box<dyn Error>` from the HID seams to typed `RotoError`.
//!
//! `HidLink` and `HidOpener` return boxed errors so backends stay free of
//! this crate; the `hardware-errors` feature adds precise downcasting of
//! `roto_hardware::error::HwError`.

use crate::error::RotoError;

/// Map a trait-boundary error to a typed `RotoError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> RotoError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<roto_hardware::error::HwError>() {
            return match hw {
                roto_hardware::error::HwError::Timeout => RotoError::Timeout,
                roto_hardware::error::HwError::Disconnected => RotoError::NotConnected,
                other => RotoError::Transport(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        RotoError::Timeout
    } else {
        RotoError::Transport(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_fallback_detects_timeouts() {
        let e: Box<dyn std::error::Error + Send + Sync> = "read timeout".into();
        assert_eq!(map_hw_error(e.as_ref()), RotoError::Timeout);
        let e: Box<dyn std::error::Error + Send + Sync> = "pipe closed".into();
        assert_eq!(
            map_hw_error(e.as_ref()),
            RotoError::Transport("pipe closed".into())
        );
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_errors_downcast() {
        let e: Box<dyn std::error::Error + Send + Sync> =
            Box::new(roto_hardware::error::HwError::Disconnected);
        assert_eq!(map_hw_error(e.as_ref()), RotoError::NotConnected);
    }
}
