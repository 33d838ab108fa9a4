//! Connection actor
//!
//! One task per connection owns the session, the protocol engine, the
//! band/VFO latches and the value cache. [`Rig`](crate::Rig) handles talk
//! to it over a channel, so commands are processed one at a time in the
//! order they were issued and a selection can never be separated from the
//! command it prepares.
//!
//! Capability checks run here before any wire traffic.

use cat_protocol::{Band, RadioCapabilities, Slot, Vfo};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::cache::StateCache;
use crate::engine::{Engine, Operation, Value};
use crate::error::{Result, RigError};
use crate::session::Session;
use crate::vfo::{Address, AddressingState, Axis, Selection};

/// Operations whose values move when receivers or VFOs are swapped,
/// copied or reselected
const SLOT_OPS: &[Operation] = &[Operation::Frequency, Operation::Mode];

/// Native commands acting on a pair of slots
#[derive(Debug, Clone, Copy)]
enum PairCommand {
    Exchange,
    Equalize,
}

/// Commands sent to the connection actor
#[derive(Debug)]
pub enum RigCommand {
    /// Read a value
    Get {
        /// What to read
        op: Operation,
        /// Where (ignored for operations not addressed to a slot)
        slot: Slot,
        /// Serve from cache when fresh
        use_cache: bool,
        /// Reply channel
        reply: oneshot::Sender<Result<Value>>,
    },

    /// Write a value
    Set {
        /// What to write
        op: Operation,
        /// Where (ignored for operations not addressed to a slot)
        slot: Slot,
        /// New value; must belong to `op`
        value: Value,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },

    /// Make a receiver active
    SelectBand {
        /// Receiver to select
        band: Band,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },

    /// Make a VFO of the active receiver active
    SelectVfo {
        /// VFO to select
        vfo: Vfo,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },

    /// Select receiver then VFO
    SelectBandVfo {
        /// Slot to make active
        slot: Slot,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },

    /// Swap two slots with the radio's native exchange command
    Exchange {
        /// First slot
        primary: Slot,
        /// Second slot
        secondary: Slot,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },

    /// Copy one slot onto another
    Equalize {
        /// Source
        primary: Slot,
        /// Destination
        secondary: Slot,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },

    /// Close the session and stop the actor
    Disconnect {
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },
}

/// State owned by the connection actor
pub(crate) struct Connection {
    session: Option<Session>,
    engine: Engine,
    state: AddressingState,
    cache: StateCache,
    caps: RadioCapabilities,
}

impl Connection {
    pub(crate) fn new(session: Session, engine: Engine, cache: StateCache) -> Self {
        let caps = session.capabilities().clone();
        Self {
            session: Some(session),
            engine,
            state: AddressingState::new(caps.topology),
            cache,
            caps,
        }
    }

    fn session(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(RigError::NotConnected)
    }

    /// Canonical slot for `op`; operations not addressed to a slot share one key
    fn resolve_slot(&self, op: Operation, slot: Slot) -> Result<Slot> {
        if op.is_slot_addressed() {
            self.normalize(slot)
        } else {
            Ok(Slot::MAIN_A)
        }
    }

    fn normalize(&self, slot: Slot) -> Result<Slot> {
        slot.normalize(self.caps.topology).ok_or_else(|| {
            RigError::UnsupportedOperation(format!(
                "{} does not exist on a {:?} radio",
                slot, self.caps.topology
            ))
        })
    }

    fn check_supported(&self, op: Operation) -> Result<()> {
        let supported = match op {
            Operation::Split => self.caps.has_split,
            Operation::Rit => self.caps.has_rit,
            Operation::Xit => self.caps.has_xit,
            _ => true,
        };
        if supported {
            Ok(())
        } else {
            Err(RigError::UnsupportedOperation(format!(
                "{:?} not supported by this model",
                op
            )))
        }
    }

    fn validate(&self, value: &Value) -> Result<()> {
        let caps = &self.caps;
        match value {
            Value::Frequency(hz) if !caps.frequency_in_range(*hz) => {
                Err(RigError::InvalidParameter(format!(
                    "{} Hz outside {}..={} Hz",
                    hz, caps.min_frequency_hz, caps.max_frequency_hz
                )))
            }
            Value::Mode(mode) if !caps.supports_mode(*mode) => Err(
                RigError::UnsupportedOperation(format!("{:?} not supported by this model", mode)),
            ),
            Value::Power(watts) if *watts > caps.max_power_watts => Err(
                RigError::InvalidParameter(format!(
                    "{} W above the {} W maximum",
                    watts, caps.max_power_watts
                )),
            ),
            Value::Rit(state) | Value::Xit(state) if state.offset_hz.abs() > caps.rit_max_hz => {
                Err(RigError::InvalidParameter(format!(
                    "offset {} Hz beyond ±{} Hz",
                    state.offset_hz, caps.rit_max_hz
                )))
            }
            _ => Ok(()),
        }
    }

    /// Issue one selection and update the latches from its outcome
    async fn run_selection(&mut self, selection: Selection) -> Result<()> {
        let session = self.session.as_mut().ok_or(RigError::NotConnected)?;
        match self.engine.select(session, selection).await {
            Ok(()) => {
                self.state.selected(selection);
                Ok(())
            }
            Err(e) => {
                warn!("selection {:?} failed: {}", selection, e);
                self.state.unknown(selection);
                Err(e)
            }
        }
    }

    /// Issue whatever selections `op` on `slot` still needs
    async fn route(&mut self, op: Operation, slot: Slot) -> Result<Address> {
        if !op.is_slot_addressed() {
            return Ok(Address::Current(slot));
        }
        let route = self.state.plan(slot, self.engine.targeting(op));
        for step in route.steps {
            self.run_selection(step).await?;
        }
        Ok(route.address)
    }

    async fn get(&mut self, op: Operation, slot: Slot, use_cache: bool) -> Result<Value> {
        self.session()?;
        self.check_supported(op)?;
        let slot = self.resolve_slot(op, slot)?;

        if use_cache {
            if let Some(value) = self.cache.get(op, slot) {
                trace!("cache hit {:?} {}", op, slot);
                return Ok(value);
            }
        }

        let address = self.route(op, slot).await?;
        let session = self.session.as_mut().ok_or(RigError::NotConnected)?;
        let value = self.engine.read(session, op, address).await?;
        self.cache.put(op, slot, value.clone());
        Ok(value)
    }

    async fn set(&mut self, op: Operation, slot: Slot, value: Value) -> Result<()> {
        self.session()?;
        if value.operation() != op {
            return Err(RigError::InvalidParameter(format!(
                "{:?} is not a value for {:?}",
                value, op
            )));
        }
        if op.is_read_only() {
            return Err(RigError::UnsupportedOperation(format!("{:?} is read-only", op)));
        }
        self.check_supported(op)?;
        self.validate(&value)?;
        let slot = self.resolve_slot(op, slot)?;

        let address = self.route(op, slot).await?;
        let session = self.session.as_mut().ok_or(RigError::NotConnected)?;
        let result = self.engine.write(session, address, &value).await;

        // RIT and XIT share one offset register
        match op {
            Operation::Rit => self.cache.invalidate(Operation::Xit, slot),
            Operation::Xit => self.cache.invalidate(Operation::Rit, slot),
            _ => {}
        }
        match result {
            Ok(()) => {
                self.cache.put(op, slot, value);
                Ok(())
            }
            Err(e) => {
                self.cache.invalidate(op, slot);
                Err(e)
            }
        }
    }

    async fn select(&mut self, steps: Vec<Selection>) -> Result<()> {
        let mut result = Ok(());
        for step in steps {
            result = self.run_selection(step).await;
            if result.is_err() {
                break;
            }
        }
        self.cache.invalidate_ops(SLOT_OPS);
        result
    }

    async fn select_band(&mut self, band: Band) -> Result<()> {
        self.session()?;
        if !self.caps.topology.has_sub_receiver() {
            return Err(RigError::UnsupportedOperation(
                "model has a single receiver".into(),
            ));
        }
        self.select(vec![Selection::Band(band)]).await
    }

    async fn select_vfo(&mut self, vfo: Vfo) -> Result<()> {
        self.session()?;
        if !self.caps.topology.has_vfo_pair() {
            return Err(RigError::UnsupportedOperation(
                "model's receivers have no VFO A/B pair".into(),
            ));
        }
        self.select(vec![Selection::Vfo(vfo)]).await
    }

    async fn select_band_vfo(&mut self, slot: Slot) -> Result<()> {
        self.session()?;
        let slot = self.normalize(slot)?;
        let steps = self.state.select_steps(slot);
        self.select(steps).await
    }

    fn pair(&self, primary: Slot, secondary: Slot) -> Result<Axis> {
        let a = self.normalize(primary)?;
        let b = self.normalize(secondary)?;
        self.state.pair_axis(a, b).ok_or_else(|| {
            RigError::InvalidParameter(format!("{} and {} are not a hardware pair", a, b))
        })
    }

    async fn exchange(&mut self, primary: Slot, secondary: Slot) -> Result<()> {
        self.session()?;
        let axis = self.pair(primary, secondary)?;
        self.engine.check_exchange(axis)?;
        self.run_pair(PairCommand::Exchange, primary, axis).await
    }

    async fn equalize(&mut self, primary: Slot, secondary: Slot) -> Result<()> {
        self.session()?;
        let axis = self.pair(primary, secondary)?;
        let forward = match axis {
            Axis::Vfo => primary.vfo == Vfo::A,
            Axis::Band => primary.band == Band::Main,
        };
        if !forward {
            return Err(RigError::UnsupportedOperation(format!(
                "radios only copy {} onto {}",
                secondary, primary
            )));
        }
        self.engine.check_equalize(axis)?;
        self.run_pair(PairCommand::Equalize, primary, axis).await
    }

    /// Issue a pair command on the receiver holding `slot`
    ///
    /// If that receiver had to be selected first, the previously active
    /// receiver is selected again afterwards.
    async fn run_pair(&mut self, command: PairCommand, slot: Slot, axis: Axis) -> Result<()> {
        let slot = self.normalize(slot)?;
        let previous = self.state.active_band();
        let steps = self.state.pair_steps(slot, axis);
        let moved = !steps.is_empty();
        if moved {
            self.select(steps).await?;
        }

        let session = self.session.as_mut().ok_or(RigError::NotConnected)?;
        let result = match command {
            PairCommand::Exchange => self.engine.exchange(session, axis).await,
            PairCommand::Equalize => self.engine.equalize(session, axis).await,
        };
        self.cache.invalidate_ops(SLOT_OPS);

        let restored = match previous {
            Some(band) if moved => {
                debug!("reselecting {:?} receiver", band);
                self.select(vec![Selection::Band(band)]).await
            }
            _ => Ok(()),
        };
        result.and(restored)
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.cache.clear();
        self.state.reset();
        match self.session.take() {
            Some(mut session) => session.close().await,
            None => Err(RigError::NotConnected),
        }
    }
}

/// Run the actor until disconnected or every handle is dropped
pub(crate) async fn run(mut rx: mpsc::Receiver<RigCommand>, mut conn: Connection) {
    debug!("Rig actor started");
    while let Some(command) = rx.recv().await {
        match command {
            RigCommand::Get {
                op,
                slot,
                use_cache,
                reply,
            } => {
                let _ = reply.send(conn.get(op, slot, use_cache).await);
            }
            RigCommand::Set {
                op,
                slot,
                value,
                reply,
            } => {
                let _ = reply.send(conn.set(op, slot, value).await);
            }
            RigCommand::SelectBand { band, reply } => {
                let _ = reply.send(conn.select_band(band).await);
            }
            RigCommand::SelectVfo { vfo, reply } => {
                let _ = reply.send(conn.select_vfo(vfo).await);
            }
            RigCommand::SelectBandVfo { slot, reply } => {
                let _ = reply.send(conn.select_band_vfo(slot).await);
            }
            RigCommand::Exchange {
                primary,
                secondary,
                reply,
            } => {
                let _ = reply.send(conn.exchange(primary, secondary).await);
            }
            RigCommand::Equalize {
                primary,
                secondary,
                reply,
            } => {
                let _ = reply.send(conn.equalize(primary, secondary).await);
            }
            RigCommand::Disconnect { reply } => {
                let _ = reply.send(conn.disconnect().await);
                break;
            }
        }
    }

    // Every handle dropped without disconnecting
    if let Some(mut session) = conn.session.take() {
        if let Err(e) = session.close().await {
            warn!("failed to close session: {}", e);
        }
    }
    info!("Rig actor stopped");
}
