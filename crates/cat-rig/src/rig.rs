//! Public rig handle

use std::sync::Arc;

use cat_protocol::{Band, OperatingMode, RadioCapabilities, RitState, SMeterReading, Slot, Vfo};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::actor::{self, Connection, RigCommand};
use crate::cache::StateCache;
use crate::config::RigConfig;
use crate::engine::{Engine, Operation, Value};
use crate::error::{Result, RigError};
use crate::session::Session;
use crate::transport::{SerialConfig, SerialTransport, Transport};

/// Handle to a connected radio
///
/// Cheap to clone; all clones talk to the same connection task, which
/// processes commands strictly in the order they arrive. Typed getters
/// serve fresh cached values; use [`get`](Rig::get) with `use_cache = false`
/// to force a round trip.
#[derive(Clone)]
pub struct Rig {
    tx: mpsc::Sender<RigCommand>,
    caps: Arc<RadioCapabilities>,
}

impl std::fmt::Debug for Rig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rig")
            .field("protocol", &self.caps.protocol)
            .field("connected", &!self.tx.is_closed())
            .finish()
    }
}

impl Rig {
    /// Open `transport` and start the connection task
    pub async fn connect<T>(transport: T, caps: RadioCapabilities, config: RigConfig) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let engine = Engine::for_radio(&caps, &config)?;
        let session = Session::open(Box::new(transport), caps.clone(), config.timeout(), config.echo).await?;
        let (tx, rx) = mpsc::channel(config.channel_depth.max(1));
        let conn = Connection::new(session, engine, StateCache::new(config.cache_ttl()));
        tokio::spawn(actor::run(rx, conn));
        info!("Connected to {} radio", caps.protocol);
        Ok(Self {
            tx,
            caps: Arc::new(caps),
        })
    }

    /// Open a serial port and connect
    pub async fn connect_serial(serial: SerialConfig, caps: RadioCapabilities, config: RigConfig) -> Result<Self> {
        Self::connect(SerialTransport::new(serial), caps, config).await
    }

    /// Capability descriptor of the radio
    pub fn capabilities(&self) -> &RadioCapabilities {
        &self.caps
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<Result<T>>) -> RigCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| RigError::NotConnected)?;
        rx.await.map_err(|_| RigError::NotConnected)?
    }

    /// Read `op` at `slot`
    pub async fn get(&self, op: Operation, slot: Slot, use_cache: bool) -> Result<Value> {
        self.request(|reply| RigCommand::Get {
            op,
            slot,
            use_cache,
            reply,
        })
        .await
    }

    /// Write `value` (which must belong to `op`) at `slot`
    pub async fn set(&self, op: Operation, slot: Slot, value: Value) -> Result<()> {
        self.request(|reply| RigCommand::Set {
            op,
            slot,
            value,
            reply,
        })
        .await
    }

    /// Make a receiver active
    pub async fn select_band(&self, band: Band) -> Result<()> {
        self.request(|reply| RigCommand::SelectBand { band, reply })
            .await
    }

    /// Make a VFO of the active receiver active
    pub async fn select_vfo(&self, vfo: Vfo) -> Result<()> {
        self.request(|reply| RigCommand::SelectVfo { vfo, reply })
            .await
    }

    /// Select a receiver and then one of its VFOs
    pub async fn select_band_vfo(&self, band: Band, vfo: Vfo) -> Result<()> {
        let slot = Slot::new(band, vfo);
        self.request(|reply| RigCommand::SelectBandVfo { slot, reply })
            .await
    }

    /// Swap frequency and mode of two paired slots
    pub async fn exchange(&self, primary: Slot, secondary: Slot) -> Result<()> {
        self.request(|reply| RigCommand::Exchange {
            primary,
            secondary,
            reply,
        })
        .await
    }

    /// Copy frequency and mode of `primary` onto `secondary`
    pub async fn equalize(&self, primary: Slot, secondary: Slot) -> Result<()> {
        self.request(|reply| RigCommand::Equalize {
            primary,
            secondary,
            reply,
        })
        .await
    }

    /// Close the connection; later commands fail with `NotConnected`
    pub async fn disconnect(&self) -> Result<()> {
        self.request(|reply| RigCommand::Disconnect { reply }).await
    }

    /// Frequency of `slot` in Hz
    pub async fn frequency(&self, slot: Slot) -> Result<u64> {
        match self.get(Operation::Frequency, slot, true).await? {
            Value::Frequency(hz) => Ok(hz),
            other => Err(unexpected(other)),
        }
    }

    /// Tune `slot`
    pub async fn set_frequency(&self, slot: Slot, hz: u64) -> Result<()> {
        self.set(Operation::Frequency, slot, Value::Frequency(hz))
            .await
    }

    /// Mode of `slot`
    pub async fn mode(&self, slot: Slot) -> Result<OperatingMode> {
        match self.get(Operation::Mode, slot, true).await? {
            Value::Mode(mode) => Ok(mode),
            other => Err(unexpected(other)),
        }
    }

    /// Change the mode of `slot`
    pub async fn set_mode(&self, slot: Slot, mode: OperatingMode) -> Result<()> {
        self.set(Operation::Mode, slot, Value::Mode(mode)).await
    }

    /// Transmitter keyed (always read from the radio)
    pub async fn ptt(&self) -> Result<bool> {
        match self.get(Operation::Ptt, Slot::MAIN_A, false).await? {
            Value::Ptt(on) => Ok(on),
            other => Err(unexpected(other)),
        }
    }

    /// Key or unkey the transmitter
    pub async fn set_ptt(&self, on: bool) -> Result<()> {
        self.set(Operation::Ptt, Slot::MAIN_A, Value::Ptt(on)).await
    }

    /// RF power in watts
    pub async fn power(&self) -> Result<u16> {
        match self.get(Operation::Power, Slot::MAIN_A, true).await? {
            Value::Power(watts) => Ok(watts),
            other => Err(unexpected(other)),
        }
    }

    /// Set RF power in watts
    pub async fn set_power(&self, watts: u16) -> Result<()> {
        self.set(Operation::Power, Slot::MAIN_A, Value::Power(watts))
            .await
    }

    /// Split on
    pub async fn split(&self) -> Result<bool> {
        match self.get(Operation::Split, Slot::MAIN_A, true).await? {
            Value::Split(on) => Ok(on),
            other => Err(unexpected(other)),
        }
    }

    /// Turn split on or off
    pub async fn set_split(&self, on: bool) -> Result<()> {
        self.set(Operation::Split, Slot::MAIN_A, Value::Split(on))
            .await
    }

    /// RIT state
    pub async fn rit(&self) -> Result<RitState> {
        match self.get(Operation::Rit, Slot::MAIN_A, true).await? {
            Value::Rit(state) => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    /// Set RIT on/off and offset
    pub async fn set_rit(&self, state: RitState) -> Result<()> {
        self.set(Operation::Rit, Slot::MAIN_A, Value::Rit(state))
            .await
    }

    /// Move the RIT offset by `delta_hz`, keeping its on/off state
    pub async fn adjust_rit(&self, delta_hz: i32) -> Result<RitState> {
        let current = match self.get(Operation::Rit, Slot::MAIN_A, false).await? {
            Value::Rit(state) => state,
            other => return Err(unexpected(other)),
        };
        let offset_hz = current.offset_hz.checked_add(delta_hz).ok_or_else(|| {
            RigError::InvalidParameter(format!("RIT offset overflow by {} Hz", delta_hz))
        })?;
        let next = RitState::new(current.enabled, offset_hz);
        self.set_rit(next).await?;
        Ok(next)
    }

    /// XIT state
    pub async fn xit(&self) -> Result<RitState> {
        match self.get(Operation::Xit, Slot::MAIN_A, true).await? {
            Value::Xit(state) => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    /// Set XIT on/off and offset
    pub async fn set_xit(&self, state: RitState) -> Result<()> {
        self.set(Operation::Xit, Slot::MAIN_A, Value::Xit(state))
            .await
    }

    /// Current S-meter reading (always read from the radio)
    pub async fn s_meter(&self) -> Result<SMeterReading> {
        match self.get(Operation::SMeter, Slot::MAIN_A, false).await? {
            Value::SMeter(reading) => Ok(reading),
            other => Err(unexpected(other)),
        }
    }

    /// Identification string reported by the radio
    pub async fn identify(&self) -> Result<String> {
        match self.get(Operation::Identify, Slot::MAIN_A, true).await? {
            Value::Identity(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(value: Value) -> RigError {
    RigError::invalid(format!("unexpected value {:?}", value), &[])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::MockTransport;
    use cat_protocol::civ::{encode_frame, opcode};
    use cat_protocol::{EchoMode, RadioDatabase};

    fn config() -> RigConfig {
        RigConfig {
            echo: Some(EchoMode::Off),
            ..RigConfig::default()
        }
    }

    #[tokio::test]
    async fn test_capability_checks_precede_traffic() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let caps = RadioDatabase::by_name("IC-9700").unwrap().capabilities;
        let rig = Rig::connect(mock, caps, config()).await.unwrap();

        assert!(matches!(
            rig.set_frequency(Slot::MAIN_A, 7_100_000).await,
            Err(RigError::InvalidParameter(_))
        ));
        assert!(matches!(
            rig.rit().await,
            Err(RigError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            rig.set_mode(Slot::MAIN_A, OperatingMode::DataU).await,
            Err(RigError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            rig.set_power(500).await,
            Err(RigError::InvalidParameter(_))
        ));
        assert!(matches!(
            rig.set(Operation::SMeter, Slot::MAIN_A, Value::Power(5)).await,
            Err(RigError::InvalidParameter(_))
        ));
        assert_eq!(handle.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_receiver_is_unsupported() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let rig = Rig::connect(mock, RadioCapabilities::default(), config())
            .await
            .unwrap();
        assert!(matches!(
            rig.frequency(Slot::SUB_A).await,
            Err(RigError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            rig.select_band(Band::Sub).await,
            Err(RigError::UnsupportedOperation(_))
        ));
        assert_eq!(handle.write_count(), 0);
    }

    #[tokio::test]
    async fn test_reverse_equalize_unsupported() {
        let rig = Rig::connect(MockTransport::new(), RadioCapabilities::default(), config())
            .await
            .unwrap();
        assert!(matches!(
            rig.equalize(Slot::MAIN_B, Slot::MAIN_A).await,
            Err(RigError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            rig.exchange(Slot::MAIN_A, Slot::MAIN_A).await,
            Err(RigError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_closes_transport() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let rig = Rig::connect(mock, RadioCapabilities::default(), config())
            .await
            .unwrap();
        let other = rig.clone();
        rig.disconnect().await.unwrap();
        assert!(!handle.is_open());
        assert_eq!(handle.close_count(), 1);
        assert!(matches!(
            other.frequency(Slot::MAIN_A).await,
            Err(RigError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_dropping_handles_closes_transport() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let rig = Rig::connect(mock, RadioCapabilities::default(), config())
            .await
            .unwrap();
        drop(rig);
        for _ in 0..100 {
            if !handle.is_open() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn test_set_then_cached_get_skips_wire() {
        let ok = encode_frame(0xE0, 0x94, opcode::OK, None, &[]);
        let mut mock = MockTransport::new();
        // CI-V selects VFO A before the current-VFO command
        mock.expect(&encode_frame(0x94, 0xE0, opcode::VFO, Some(0x00), &[]), &ok);
        mock.expect(
            &encode_frame(0x94, 0xE0, opcode::SET_FREQUENCY, None, &[0x00, 0x00, 0x10, 0x07, 0x00]),
            &ok,
        );
        let handle = mock.handle();
        let rig = Rig::connect(mock, RadioCapabilities::default(), config())
            .await
            .unwrap();

        rig.set_frequency(Slot::MAIN_A, 7_100_000).await.unwrap();
        assert_eq!(handle.write_count(), 2);
        assert_eq!(rig.frequency(Slot::MAIN_A).await.unwrap(), 7_100_000);
        assert_eq!(handle.write_count(), 2);
    }
}
