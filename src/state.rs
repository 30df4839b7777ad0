//! Application state
//!
//! Configuration and the shared controller handle

use crate::error::{Error, Result};
use crate::ptz_controller::{
    Actuator, Axis, AxisRange, Capabilities, ControllerConfig, OnvifActuator, Position,
    PtzController, SimulatedActuator,
};
use std::sync::Arc;
use std::time::Duration;

/// Which actuator backend to drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorKind {
    Simulated,
    Onvif,
}

impl std::str::FromStr for ActuatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "simulated" | "sim" => Ok(Self::Simulated),
            "onvif" => Ok(Self::Onvif),
            other => Err(Error::Config(format!("unknown PTZ_ACTUATOR: {}", other))),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Actuator backend
    pub actuator: ActuatorKind,
    /// ONVIF device service endpoint
    pub onvif_endpoint: Option<String>,
    pub onvif_username: String,
    pub onvif_password: String,
    pub onvif_profile_token: String,
    /// Simulated apply latency
    pub sim_latency_ms: u64,
    /// Controller tuning
    pub controller: ControllerConfig,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for AppConfig {
    fn default() -> Self {
        let defaults = ControllerConfig::default();
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT", 8080),
            actuator: env_parse("PTZ_ACTUATOR", ActuatorKind::Simulated),
            onvif_endpoint: std::env::var("ONVIF_ENDPOINT").ok(),
            onvif_username: std::env::var("ONVIF_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            onvif_password: std::env::var("ONVIF_PASSWORD").unwrap_or_default(),
            onvif_profile_token: std::env::var("ONVIF_PROFILE_TOKEN")
                .unwrap_or_else(|_| "profile_1".to_string()),
            sim_latency_ms: env_parse("SIM_LATENCY_MS", 40),
            controller: ControllerConfig {
                step_fraction: env_parse("PTZ_STEP_FRACTION", defaults.step_fraction),
                ramp_multiplier: env_parse("PTZ_RAMP_MULTIPLIER", defaults.ramp_multiplier),
                apply_timeout_ms: env_parse("PTZ_APPLY_TIMEOUT_MS", defaults.apply_timeout_ms),
                rotation: env_parse("PTZ_ROTATION", defaults.rotation),
            },
        }
    }
}

impl AppConfig {
    /// Build the configured actuator backend
    pub fn build_actuator(&self) -> Result<Arc<dyn Actuator>> {
        match self.actuator {
            ActuatorKind::Simulated => {
                let capabilities = Capabilities::default()
                    .with(Axis::Pan, AxisRange::new(-200.0, 200.0))
                    .with(Axis::Tilt, AxisRange::new(-150.0, 150.0))
                    .with(Axis::Zoom, AxisRange::new(100.0, 400.0));
                Ok(Arc::new(
                    SimulatedActuator::new(capabilities, Position::new(0.0, 0.0, 100.0))
                        .with_latency(Duration::from_millis(self.sim_latency_ms)),
                ))
            }
            ActuatorKind::Onvif => {
                let endpoint = self
                    .onvif_endpoint
                    .as_deref()
                    .ok_or_else(|| Error::Config("ONVIF_ENDPOINT not set".to_string()))?;
                Ok(Arc::new(OnvifActuator::new(
                    endpoint,
                    &self.onvif_username,
                    &self.onvif_password,
                    &self.onvif_profile_token,
                )))
            }
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// PTZ controller (one actuator)
    pub controller: Arc<PtzController>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let actuator = config.build_actuator()?;
        let controller = PtzController::new(actuator, config.controller.clone())?;
        Ok(Self {
            config,
            controller: Arc::new(controller),
        })
    }
}
