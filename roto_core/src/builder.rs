//! Type-state builder for `MotionController`.
//!
//! `build()` is only available once a device opener has been supplied;
//! `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use roto_traits::HidOpener;
use roto_traits::clock::{Clock, MonotonicClock};

use crate::config::{ControllerCfg, DeviceCfg, FollowCfg, InterpolatorCfg};
use crate::controller::MotionController;
use crate::error::{BuildError, Result};
use crate::telemetry::TelemetrySink;
use crate::transport::DeviceTransport;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `MotionController`. Configuration is validated on `build()`.
pub struct MotionControllerBuilder<O> {
    opener: Option<Arc<dyn HidOpener>>,
    cfg: ControllerCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    telemetry: Option<Arc<TelemetrySink>>,
    _o: PhantomData<O>,
}

impl Default for MotionControllerBuilder<Missing> {
    fn default() -> Self {
        Self {
            opener: None,
            cfg: ControllerCfg::default(),
            clock: None,
            telemetry: None,
            _o: PhantomData,
        }
    }
}

impl MotionController {
    /// Start building a controller.
    pub fn builder() -> MotionControllerBuilder<Missing> {
        MotionControllerBuilder::default()
    }
}

impl<O> MotionControllerBuilder<O> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<MotionController> {
        let opener = self
            .opener
            .ok_or_else(|| eyre::Report::new(BuildError::MissingOpener))?;
        self.cfg.check().map_err(eyre::Report::new)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let telemetry = self.telemetry.unwrap_or_default();
        let transport = DeviceTransport::new(opener, self.cfg.device.clone());
        Ok(MotionController::new(self.cfg, clock, transport, telemetry))
    }

    pub fn with_config(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = cfg;
        self
    }
    pub fn with_device(mut self, device: DeviceCfg) -> Self {
        self.cfg.device = device;
        self
    }
    pub fn with_follow(mut self, follow: FollowCfg) -> Self {
        self.cfg.follow = follow;
        self
    }
    pub fn with_interpolator(mut self, interpolator: InterpolatorCfg) -> Self {
        self.cfg.interpolator = interpolator;
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Share an existing telemetry sink, e.g. with an exporter.
    pub fn with_telemetry(mut self, telemetry: Arc<TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }
}

impl MotionControllerBuilder<Missing> {
    pub fn with_opener(self, opener: Arc<dyn HidOpener>) -> MotionControllerBuilder<Set> {
        MotionControllerBuilder {
            opener: Some(opener),
            cfg: self.cfg,
            clock: self.clock,
            telemetry: self.telemetry,
            _o: PhantomData,
        }
    }
}

impl MotionControllerBuilder<Set> {
    /// Validate and build. Only available once an opener is set.
    pub fn build(self) -> Result<MotionController> {
        self.try_build()
    }
}
