use std::sync::Arc;

use crate::capture::device::DEVICE_LOOPBACK;
use crate::capture::microphone::MICROPHONE;
use crate::capture::plan::{plan_strategies, Collaborators};
use crate::encoding::EncoderRegistry;
use crate::models::capability::CapabilityRecord;
use crate::models::config::CaptureConfig;
use crate::models::device::{classify_devices, select_loopback_device};
use crate::models::error::CaptureError;
use crate::models::payload::CapturePayload;
use crate::monitor::level_monitor::LevelCallback;
use crate::process::TerminationPolicy;
use crate::session::capture_session::CaptureSession;
use crate::session::setup::{choose_method, instructions_for, SetupReport};
use crate::traits::capture_strategy::CaptureStrategy;
use crate::traits::session_delegate::SessionDelegate;

/// Entry point: owns the capability record and collaborators, and at most
/// one active capture session.
pub struct CaptureEngine {
    capabilities: CapabilityRecord,
    collaborators: Collaborators,
    registry: EncoderRegistry,
    delegate: Option<Arc<dyn SessionDelegate>>,
    termination: TerminationPolicy,
    active: Option<CaptureSession>,
}

impl CaptureEngine {
    pub fn new(capabilities: CapabilityRecord, collaborators: Collaborators) -> Self {
        log::info!(
            "capture engine on {:?}: system audio {}, {:?}",
            capabilities.platform,
            if capabilities.supports_system_audio() { "supported" } else { "unsupported" },
            collaborators
        );
        Self {
            capabilities,
            collaborators,
            registry: EncoderRegistry::default(),
            delegate: None,
            termination: TerminationPolicy::default(),
            active: None,
        }
    }

    pub fn with_registry(mut self, registry: EncoderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn SessionDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn with_termination_policy(mut self, policy: TerminationPolicy) -> Self {
        self.termination = policy;
        self
    }

    pub fn capabilities(&self) -> &CapabilityRecord {
        &self.capabilities
    }

    /// The strategies a session with `config` would try, in order.
    pub fn plan(&self, config: &CaptureConfig) -> Vec<Arc<dyn CaptureStrategy>> {
        plan_strategies(config, &self.capabilities, &self.collaborators)
    }

    /// Start a new session, tearing down the previous one first.
    pub async fn begin_session(&mut self, config: CaptureConfig) -> Result<&mut CaptureSession, CaptureError> {
        self.end_session().await;

        let strategies = self.plan(&config);
        let mut session = CaptureSession::new(config, self.capabilities.clone(), strategies, self.registry.clone())?
            .with_termination_policy(self.termination);
        if let Some(delegate) = &self.delegate {
            session = session.with_delegate(Arc::clone(delegate));
        }
        log::info!("capture session {} started", session.id());
        Ok(self.active.insert(session))
    }

    pub fn active_session(&mut self) -> Option<&mut CaptureSession> {
        self.active.as_mut()
    }

    /// Clean up and drop the active session. Returns whether there was one.
    pub async fn end_session(&mut self) -> bool {
        match self.active.take() {
            Some(mut session) => {
                log::info!("ending capture session {}", session.id());
                session.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Negotiate, record for the configured duration and return the payload.
    pub async fn capture_once(
        &mut self,
        config: CaptureConfig,
        on_levels: Option<LevelCallback>,
    ) -> Result<CapturePayload, CaptureError> {
        if config.duration().is_none() {
            return Err(CaptureError::ConfigurationFailed(
                "a one-shot capture needs a fixed duration".into(),
            ));
        }
        let session = self.begin_session(config).await?;
        session.negotiate().await?;
        session.start_recording(on_levels).await?;
        session.run().await
    }

    /// Report which method a capture with `config` would use, without capturing.
    pub async fn probe_setup(&self, config: &CaptureConfig) -> SetupReport {
        let plan = self.plan(config);
        let planned: Vec<String> = plan.iter().map(|s| s.name().to_string()).collect();

        let mut device = None;
        if planned.iter().any(|name| name == DEVICE_LOOPBACK) {
            if let Some(media) = &self.collaborators.media {
                match media.enumerate_devices().await {
                    Ok(devices) => {
                        device = select_loopback_device(&classify_devices(devices)).map(|d| d.display_name.clone());
                    }
                    Err(e) => log::warn!("device enumeration failed during setup probe: {}", e),
                }
            }
        }

        let method = choose_method(
            &self.capabilities,
            device.as_deref(),
            !self.collaborators.platform_strategies.is_empty(),
            self.collaborators.host.is_some(),
            planned.iter().any(|name| name == MICROPHONE),
        );
        SetupReport {
            method,
            instructions: instructions_for(method, device.as_deref(), self.capabilities.platform),
            device,
            planned,
        }
    }
}
