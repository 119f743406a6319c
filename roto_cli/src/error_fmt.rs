//! Human-readable error descriptions and structured JSON error formatting.

use roto_core::error::{BuildError, RotoError};

/// Stable short name of an error, used as the JSON `reason`.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingOpener => "MissingOpener",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    match err.downcast_ref::<RotoError>() {
        Some(RotoError::Transport(_)) => "Transport",
        Some(RotoError::Timeout) => "Timeout",
        Some(RotoError::NotConnected) => "NotConnected",
        Some(RotoError::ModeConfirmTimeout { .. }) => "ModeConfirmTimeout",
        Some(RotoError::InvalidMode(_)) => "InvalidMode",
        Some(RotoError::Config(_)) => "Config",
        Some(RotoError::State(_)) => "State",
        None => "Error",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingOpener => {
                "What happened: No device backend was configured.\nLikely causes: The binary was built without a HID backend and --sim was not given.\nHow to fix: Rebuild with --features hardware or pass --sim.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RotoError>() {
        return match re {
            RotoError::NotConnected => "What happened: The chair is not connected.\nLikely causes: USB cable unplugged, wrong vid/pid, or missing permissions on the HID device.\nHow to fix: Check the cable and [device] vid/pid; on Linux add a udev rule granting access to the hidraw node.".to_string(),
            RotoError::ModeConfirmTimeout { mode, waited_ms } => format!(
                "What happened: The chair did not confirm mode {mode} within {waited_ms} ms.\nLikely causes: Device busy or firmware not answering mode changes.\nHow to fix: Power-cycle the chair, or raise device.mode_confirm_timeout_ms."
            ),
            RotoError::Timeout => "What happened: A device read timed out.\nLikely causes: Device stalled or cable issue.\nHow to fix: Reconnect the chair and retry; consider raising device.read_timeout_ms.".to_string(),
            RotoError::InvalidMode(mode) => format!(
                "What happened: Mode {mode} cannot be commanded.\nLikely causes: Only the device reports this mode.\nHow to fix: Pick one of idle, calibration, head-track, free, cockpit, follow, joystick."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("parsing") || lower.contains("reading") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid.\nDetails: {msg}\nHow to fix: Edit the TOML config and try again."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 not connected, 3 mode not confirmed, 4 transport,
/// 5 configuration, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 5;
    }
    match err.downcast_ref::<RotoError>() {
        Some(RotoError::NotConnected) => 2,
        Some(RotoError::ModeConfirmTimeout { .. }) => 3,
        Some(RotoError::Transport(_) | RotoError::Timeout) => 4,
        Some(RotoError::Config(_)) => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    if let Some(RotoError::ModeConfirmTimeout { mode, waited_ms }) = err.downcast_ref::<RotoError>()
    {
        obj["details"] = json!({ "mode": mode.to_string(), "waited_ms": waited_ms });
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use roto_core::ModeType;

    #[test]
    fn typed_errors_map_to_stable_codes() {
        let e: eyre::Report = RotoError::NotConnected.into();
        assert_eq!(exit_code_for_error(&e), 2);
        let e: eyre::Report = RotoError::ModeConfirmTimeout {
            mode: ModeType::CockpitMode,
            waited_ms: 50,
        }
        .into();
        assert_eq!(exit_code_for_error(&e), 3);
        assert!(humanize(&e).contains("CockpitMode"));
        let e = eyre::Report::new(BuildError::MissingOpener);
        assert_eq!(exit_code_for_error(&e), 5);
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
    }

    #[test]
    fn json_carries_reason_and_details() {
        let e: eyre::Report = RotoError::ModeConfirmTimeout {
            mode: ModeType::FreeMode,
            waited_ms: 75,
        }
        .into();
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "ModeConfirmTimeout");
        assert_eq!(v["details"]["waited_ms"], 75);
        assert_eq!(v["details"]["mode"], "FreeMode");
    }
}
