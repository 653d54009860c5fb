//! Root context of the control loop.
//!
//! `ControlEngine` owns the registry, the optional calibration session and the
//! engine clock. A host calls [`ControlEngine::tick`] at its fixed rate; each
//! tick first applies everything the inbox buffered since the previous tick,
//! in arrival order, and only then advances timers and recomputes outputs.

use crate::calibration::{CalibrationSession, Thresholds};
use crate::config::EngineConfig;
use crate::constants::{KEY_BCI_MAX, KEY_BCI_MIN};
use crate::entity::{ControllableEntity, EntityConfig};
use crate::host::{Host, SettingsStore};
use crate::inbox::{Drained, Inbox};
use crate::mapping::{
    apply_sample, first_selected, reset_entity, update_entity, SelectionResolver,
};
use crate::message::{ChannelEvent, EntityId, SignalSample};
use crate::registry::{EntityRegistry, RegistryError};
use std::time::Duration;

pub struct ControlEngine {
    config: EngineConfig,
    registry: EntityRegistry,
    calibration: Option<CalibrationSession>,
    resolver: SelectionResolver,
    thresholds: Option<Thresholds>,
    now: f64,
    auto_select_pending: bool,
    connection_closed: bool,
    drained: Vec<Drained>,
}

impl ControlEngine {
    pub fn new(config: EngineConfig) -> Self {
        let auto_select_pending = config.auto_select_id.is_some();
        Self {
            config,
            registry: EntityRegistry::new(),
            calibration: None,
            resolver: first_selected,
            thresholds: None,
            now: 0.0,
            auto_select_pending,
            connection_closed: false,
            drained: Vec::new(),
        }
    }

    /// Replace the routing rule that picks which entity receives samples.
    pub fn with_resolver(mut self, resolver: SelectionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Engine clock in seconds since construction.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn entity(&self, id: EntityId) -> Option<&ControllableEntity> {
        self.registry.get(id)
    }

    pub fn thresholds(&self) -> Option<Thresholds> {
        self.thresholds
    }

    /// Read previously persisted thresholds. Both keys must be present.
    pub fn load_thresholds<S: SettingsStore>(&mut self, store: &S) -> Option<Thresholds> {
        let loaded = match (store.load(KEY_BCI_MIN), store.load(KEY_BCI_MAX)) {
            (Some(low), Some(high)) => Some(Thresholds { low, high }),
            _ => None,
        };
        if let Some(t) = loaded {
            log::info!("loaded thresholds low={:.3} high={:.3}", t.low, t.high);
        }
        self.thresholds = loaded;
        loaded
    }

    pub fn register(&mut self, config: EntityConfig) -> Result<(), RegistryError> {
        self.registry.register(config)?;
        self.connection_closed = false;
        Ok(())
    }

    /// Remove an entity, resetting it first if it was active. Removing the
    /// last entity closes the channel connection.
    pub fn deregister<H: Host>(
        &mut self,
        id: EntityId,
        host: &mut H,
    ) -> Option<ControllableEntity> {
        let mut removed = self.registry.deregister(id)?;
        if removed.selected {
            reset_entity(&mut removed, &self.config.mapping, host);
            removed.selected = false;
            host.selection_changed(self.registry.selected_id());
        }
        if self.registry.is_empty() && !self.connection_closed {
            log::info!("no entities left; closing connection");
            self.connection_closed = true;
            host.close_connection();
        }
        Some(removed)
    }

    pub fn select<H: Host>(&mut self, id: EntityId, host: &mut H) -> Option<EntityId> {
        self.registry.select(id, &self.config.mapping, host)
    }

    pub fn calibration(&self) -> Option<&CalibrationSession> {
        self.calibration.as_ref()
    }

    /// Begin a fresh calibration session, replacing any previous one.
    pub fn start_calibration<H: Host>(&mut self, host: &mut H) {
        let session = CalibrationSession::new(self.config.calibration.clone());
        log::info!(
            "calibration starting; lead-in {:.1}s",
            self.config.calibration.lead_in_sec
        );
        host.calibration_phase_changed(session.phase());
        self.calibration = Some(session);
    }

    pub fn abort_calibration<H: Host>(&mut self, host: &mut H) {
        if let Some(session) = self.calibration.as_mut() {
            session.abort(host);
        }
    }

    /// Drain the inbox and run one tick.
    pub fn tick<H: Host>(&mut self, dt: Duration, inbox: &Inbox, host: &mut H) {
        let mut drained = std::mem::take(&mut self.drained);
        inbox.drain_into(&mut drained);
        self.tick_with(dt, drained.drain(..), host);
        self.drained = drained;
    }

    /// Run one tick with an explicit batch of already-decoded items.
    pub fn tick_with<H, I>(&mut self, dt: Duration, items: I, host: &mut H)
    where
        H: Host,
        I: IntoIterator<Item = Drained>,
    {
        let dt_sec = dt.as_secs_f32();
        self.now += dt.as_secs_f64();

        self.fire_auto_select(host);

        for item in items {
            match item {
                Drained::Event(event) => self.handle_event(event, host),
                Drained::Status(status) => {
                    log::info!("connection status: {:?}", status);
                    host.connection_status(&status);
                }
            }
        }

        if let Some(session) = self.calibration.as_mut() {
            session.tick(dt_sec, host);
            if let Some(t) = session.thresholds() {
                self.thresholds = Some(t);
            }
        }

        let mapping = &self.config.mapping;
        let tone = &self.config.tone;
        for entity in self.registry.entities_mut().iter_mut().filter(|e| e.selected) {
            update_entity(entity, self.now, dt_sec, mapping, tone, host);
        }
    }

    /// Apply one decoded event at the current engine time.
    pub fn handle_event<H: Host>(&mut self, event: ChannelEvent, host: &mut H) {
        match event {
            ChannelEvent::Selection(cmd) => {
                // An explicit choice supersedes the startup default.
                self.auto_select_pending = false;
                self.select(cmd.entity_id, host);
            }
            ChannelEvent::Signal(value) => {
                let raw = SignalSample::new(value, self.now);
                if let Some(session) = self.calibration.as_mut() {
                    session.record(raw, host);
                }
                let routed = SignalSample::new(
                    self.config.threshold_policy.apply(raw.value(), self.thresholds),
                    self.now,
                );
                let entities = self.registry.entities_mut();
                if let Some(index) = (self.resolver)(entities) {
                    if let Some(entity) = entities.get_mut(index) {
                        apply_sample(entity, routed);
                    }
                }
            }
        }
    }

    fn fire_auto_select<H: Host>(&mut self, host: &mut H) {
        if !self.auto_select_pending || self.now < self.config.auto_select_delay_sec as f64 {
            return;
        }
        self.auto_select_pending = false;
        let Some(id) = self.config.auto_select_id else {
            return;
        };
        if self.registry.selected_id().is_some() || !self.registry.contains(id) {
            log::debug!("auto-select of entity {} skipped", id);
            return;
        }
        self.select(id, host);
    }
}
