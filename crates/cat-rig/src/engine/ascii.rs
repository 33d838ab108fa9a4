//! Shared ASCII engine for Kenwood, Elecraft and Yaesu
//!
//! All three families speak `MNEMONIC[params];`. Everything that differs
//! (mnemonics, code tables, field widths, how RIT offsets are changed)
//! comes from the session's [`Dialect`].
//!
//! Queries answer with the same mnemonic. SETs are silent on most radios;
//! a radio configured to echo SETs back has that echo checked. A dialect
//! error token in place of a reply is a rejection.

use cat_protocol::ascii::{build_command, parse_response, query, AsciiResponse, Param};
use cat_protocol::dialect::{PttStyle, RitOffsetStyle};
use cat_protocol::{AckMode, Band, Dialect, RadioCapabilities, RitState, SMeterCalibration, Topology, Vfo};
use tracing::debug;

use super::{mismatch, Operation, Value};
use crate::error::{Result, RigError};
use crate::session::Session;
use crate::vfo::{Address, Axis, Selection, Targeting};

/// Width of the power field in watts
const POWER_DIGITS: usize = 3;

/// ASCII protocol engine, parameterised by a vendor dialect
#[derive(Debug, Clone)]
pub struct AsciiEngine {
    dialect: &'static Dialect,
    topology: Topology,
    s_meter: SMeterCalibration,
}

impl AsciiEngine {
    /// Engine for `dialect` on a radio with `caps`
    pub fn new(dialect: &'static Dialect, caps: &RadioCapabilities) -> Self {
        Self {
            dialect,
            topology: caps.topology,
            s_meter: caps.s_meter,
        }
    }

    /// The vendor dialect
    pub fn dialect(&self) -> &'static Dialect {
        self.dialect
    }

    pub(crate) fn targeting(&self, op: Operation) -> Targeting {
        match op {
            Operation::Frequency => Targeting::Indexed,
            Operation::Mode if self.dialect.mode_indexed => Targeting::Indexed,
            _ => Targeting::Current,
        }
    }

    fn index_digit(&self, address: Address) -> &'static str {
        if address.index(self.topology) == 0 {
            "0"
        } else {
            "1"
        }
    }

    fn build(&self, mnemonic: &str, params: &[Param<'_>]) -> Result<Vec<u8>> {
        build_command(mnemonic, params).map_err(|e| RigError::InvalidParameter(e.to_string()))
    }

    /// Send `command` and parse the reply, which must carry `expected`
    async fn ask(&self, session: &mut Session, command: &[u8], expected: &str) -> Result<AsciiResponse> {
        session.send(command).await?;
        let reply = session.read_reply().await?;
        if self.dialect.is_error_token(&reply) {
            return Err(RigError::rejected(
                format!("{} {}", self.dialect.name, String::from_utf8_lossy(command)),
                &reply,
            ));
        }
        parse_response(&reply, expected).map_err(|e| RigError::parse(e, &reply))
    }

    /// Send a SET command
    async fn set(&self, session: &mut Session, command: &[u8]) -> Result<()> {
        session.send(command).await?;
        match session.set_ack() {
            AckMode::Echo => {
                let reply = session.read_confirmation().await?;
                if self.dialect.is_error_token(&reply) {
                    Err(RigError::rejected(
                        format!("{} {}", self.dialect.name, String::from_utf8_lossy(command)),
                        &reply,
                    ))
                } else if reply != command {
                    Err(RigError::invalid("SET confirmation does not match", &reply))
                } else {
                    Ok(())
                }
            }
            AckMode::Frame | AckMode::None => session.finish().await,
        }
    }

    pub(crate) async fn select(&self, session: &mut Session, selection: Selection) -> Result<()> {
        let (mnemonic, digit) = match selection {
            Selection::Vfo(vfo) => (self.dialect.vfo_select, if vfo == Vfo::A { "0" } else { "1" }),
            Selection::Band(band) => (
                self.dialect.band_select,
                if band == Band::Main { "0" } else { "1" },
            ),
        };
        let mnemonic = mnemonic.ok_or_else(|| {
            RigError::UnsupportedOperation(format!("{} cannot select {:?}", self.dialect.name, selection))
        })?;
        let command = self.build(mnemonic, &[Param::Raw(digit)])?;
        self.set(session, &command).await
    }

    pub(crate) async fn read(&self, session: &mut Session, op: Operation, address: Address) -> Result<Value> {
        let d = self.dialect;
        match op {
            Operation::Frequency => {
                let mnemonic = d.frequency[address.index(self.topology)];
                let reply = self.ask(session, &query(mnemonic), mnemonic).await?;
                let hz = reply
                    .digits(0, d.frequency_digits)
                    .map_err(|e| invalid_field(e, &reply))?;
                Ok(Value::Frequency(hz))
            }
            Operation::Mode => {
                let code = if d.mode_indexed {
                    let digit = self.index_digit(address);
                    let command = self.build(d.mode, &[Param::Raw(digit)])?;
                    let expected = format!("{}{}", d.mode, digit);
                    let reply = self.ask(session, &command, &expected).await?;
                    reply.body().to_string()
                } else {
                    let reply = self.ask(session, &query(d.mode), d.mode).await?;
                    reply.body().to_string()
                };
                let mode = d
                    .mode_from_code(&code)
                    .map_err(|e| RigError::parse(e, code.as_bytes()))?;
                Ok(Value::Mode(mode))
            }
            Operation::Ptt => match d.ptt {
                PttStyle::TxRx => {
                    let reply = self.ask(session, &query("IF"), "IF").await?;
                    let info = d.info.decode(&reply).map_err(|e| invalid_field(e, &reply))?;
                    let tx = info.tx.ok_or_else(|| {
                        RigError::UnsupportedOperation(format!("{} reports no TX state", d.name))
                    })?;
                    Ok(Value::Ptt(tx))
                }
                PttStyle::TxDigit => {
                    let reply = self.ask(session, &query("TX"), "TX").await?;
                    Ok(Value::Ptt(reply.flag(0).map_err(|e| invalid_field(e, &reply))?))
                }
            },
            Operation::Power => {
                let reply = self.ask(session, &query(d.power), d.power).await?;
                let watts = reply
                    .digits(0, POWER_DIGITS)
                    .map_err(|e| invalid_field(e, &reply))?;
                Ok(Value::Power(watts as u16))
            }
            Operation::Split => {
                let reply = self.ask(session, &query(d.split), d.split).await?;
                Ok(Value::Split(reply.flag(0).map_err(|e| invalid_field(e, &reply))?))
            }
            Operation::Rit | Operation::Xit => {
                let mnemonic = if op == Operation::Rit { d.rit } else { d.xit };
                let reply = self.ask(session, &query(mnemonic), mnemonic).await?;
                let enabled = reply.flag(0).map_err(|e| invalid_field(e, &reply))?;
                // The offset is shared by RIT and XIT and only reported by IF
                let reply = self.ask(session, &query("IF"), "IF").await?;
                let info = d.info.decode(&reply).map_err(|e| invalid_field(e, &reply))?;
                let state = RitState::new(enabled, info.offset_hz);
                Ok(if op == Operation::Rit {
                    Value::Rit(state)
                } else {
                    Value::Xit(state)
                })
            }
            Operation::SMeter => {
                let command = self.build(d.s_meter, &[Param::Raw(d.s_meter_selector)])?;
                let expected = format!("{}{}", d.s_meter, d.s_meter_selector);
                let reply = self.ask(session, &command, &expected).await?;
                let raw = reply
                    .digits(0, d.s_meter_digits)
                    .map_err(|e| invalid_field(e, &reply))?;
                let raw = u16::try_from(raw).unwrap_or(u16::MAX);
                Ok(Value::SMeter(self.s_meter.convert(raw)))
            }
            Operation::Identify => {
                let reply = self.ask(session, &query(d.identify), d.identify).await?;
                Ok(Value::Identity(reply.body().to_string()))
            }
        }
    }

    pub(crate) async fn write(&self, session: &mut Session, address: Address, value: &Value) -> Result<()> {
        let d = self.dialect;
        match value {
            Value::Frequency(hz) => {
                let mnemonic = d.frequency[address.index(self.topology)];
                let command = self.build(
                    mnemonic,
                    &[Param::Digits {
                        value: *hz,
                        width: d.frequency_digits,
                    }],
                )?;
                self.set(session, &command).await
            }
            Value::Mode(mode) => {
                let code = d.mode_code(*mode).ok_or_else(|| {
                    RigError::UnsupportedOperation(format!("{} has no code for {:?}", d.name, mode))
                })?;
                let command = if d.mode_indexed {
                    self.build(d.mode, &[Param::Raw(self.index_digit(address)), Param::Raw(code)])?
                } else {
                    self.build(d.mode, &[Param::Raw(code)])?
                };
                self.set(session, &command).await
            }
            Value::Ptt(on) => {
                let command = match (d.ptt, on) {
                    (PttStyle::TxRx, true) => query("TX"),
                    (PttStyle::TxRx, false) => query("RX"),
                    (PttStyle::TxDigit, true) => self.build("TX", &[Param::Raw("1")])?,
                    (PttStyle::TxDigit, false) => self.build("TX", &[Param::Raw("0")])?,
                };
                self.set(session, &command).await
            }
            Value::Power(watts) => {
                let command = self.build(
                    d.power,
                    &[Param::Digits {
                        value: u64::from(*watts),
                        width: POWER_DIGITS,
                    }],
                )?;
                self.set(session, &command).await
            }
            Value::Split(on) => {
                let command = self.build(d.split, &[Param::Raw(if *on { "1" } else { "0" })])?;
                self.set(session, &command).await
            }
            Value::Rit(state) | Value::Xit(state) => {
                let mnemonic = if matches!(value, Value::Rit(_)) { d.rit } else { d.xit };
                if state.offset_hz % d.rit_step_hz != 0 {
                    return Err(RigError::InvalidParameter(format!(
                        "{} Hz is not a multiple of the {} Hz {} step",
                        state.offset_hz, d.rit_step_hz, d.name
                    )));
                }
                let flag = self.build(mnemonic, &[Param::Raw(if state.enabled { "1" } else { "0" })])?;
                self.set(session, &flag).await?;
                self.set_offset(session, state.offset_hz).await
            }
            Value::SMeter(_) | Value::Identity(_) => Err(mismatch("ASCII write", value)),
        }
    }

    /// Set the shared RIT/XIT offset
    ///
    /// Dialects without an absolute offset command get clear-then-step.
    async fn set_offset(&self, session: &mut Session, offset_hz: i32) -> Result<()> {
        let d = self.dialect;
        match d.rit_offset {
            RitOffsetStyle::Absolute { mnemonic, digits } => {
                let command = self.build(
                    mnemonic,
                    &[Param::Signed {
                        value: i64::from(offset_hz),
                        width: digits,
                    }],
                )?;
                self.set(session, &command).await
            }
            RitOffsetStyle::Relative { up, down, digits } => {
                self.set(session, &query(d.rit_clear)).await?;
                if offset_hz == 0 {
                    return Ok(());
                }
                let mnemonic = if offset_hz > 0 { up } else { down };
                debug!("{} offset {} Hz emulated by clear and step", d.name, offset_hz);
                let command = self.build(
                    mnemonic,
                    &[Param::Digits {
                        value: u64::from(offset_hz.unsigned_abs()),
                        width: digits,
                    }],
                )?;
                self.set(session, &command).await
            }
        }
    }

    /// The one axis the dialect's exchange/equalize commands act on
    fn native_axis(&self) -> Axis {
        if self.topology.has_sub_receiver() {
            Axis::Band
        } else {
            Axis::Vfo
        }
    }

    pub(crate) fn check_exchange(&self, axis: Axis) -> Result<()> {
        self.pair_command(self.dialect.exchange, axis, "exchange").map(|_| ())
    }

    pub(crate) fn check_equalize(&self, axis: Axis) -> Result<()> {
        self.pair_command(self.dialect.equalize, axis, "equalize").map(|_| ())
    }

    pub(crate) async fn exchange(&self, session: &mut Session, axis: Axis) -> Result<()> {
        let command = self.pair_command(self.dialect.exchange, axis, "exchange")?;
        self.set(session, command.as_bytes()).await
    }

    pub(crate) async fn equalize(&self, session: &mut Session, axis: Axis) -> Result<()> {
        let command = self.pair_command(self.dialect.equalize, axis, "equalize")?;
        self.set(session, command.as_bytes()).await
    }

    fn pair_command(&self, command: Option<&'static str>, axis: Axis, what: &str) -> Result<&'static str> {
        match command {
            Some(command) if axis == self.native_axis() => Ok(command),
            _ => Err(RigError::UnsupportedOperation(format!(
                "{} has no {:?} {}",
                self.dialect.name, axis, what
            ))),
        }
    }
}

fn invalid_field(err: cat_protocol::ParseError, reply: &AsciiResponse) -> RigError {
    RigError::invalid(
        err.to_string(),
        format!("{}{};", reply.mnemonic(), reply.body()).as_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::MockTransport;
    use cat_protocol::{EchoMode, OperatingMode, Protocol, QuirkProfile, RadioDatabase};

    async fn setup(model: &str, mock: MockTransport) -> (AsciiEngine, Session) {
        let caps = RadioDatabase::by_name(model).unwrap().capabilities;
        let engine = AsciiEngine::new(caps.protocol.dialect().unwrap(), &caps);
        let session = Session::open(
            Box::new(mock),
            caps,
            Duration::from_millis(100),
            Some(EchoMode::Off),
        )
        .await
        .unwrap();
        (engine, session)
    }

    #[tokio::test]
    async fn test_kenwood_frequency_per_vfo() {
        let mut mock = MockTransport::new();
        mock.expect(b"FB;", b"FB00007074000;");
        mock.expect(b"FA00014250000;", b"");
        let handle = mock.handle();
        let (engine, mut session) = setup("TS-590SG", mock).await;

        let value = engine
            .read(&mut session, Operation::Frequency, Address::Vfo(Vfo::B))
            .await
            .unwrap();
        assert_eq!(value, Value::Frequency(7_074_000));
        engine
            .write(&mut session, Address::Vfo(Vfo::A), &Value::Frequency(14_250_000))
            .await
            .unwrap();
        assert_eq!(handle.remaining(), 0);
    }

    #[tokio::test]
    async fn test_yaesu_indexed_mode() {
        let mut mock = MockTransport::new();
        mock.expect(b"MD0;", b"MD0C;");
        mock.expect(b"MD02;", b"");
        let (engine, mut session) = setup("FT-991A", mock).await;
        assert_eq!(engine.targeting(Operation::Mode), Targeting::Indexed);
        let value = engine
            .read(&mut session, Operation::Mode, Address::Vfo(Vfo::A))
            .await
            .unwrap();
        assert_eq!(value, Value::Mode(OperatingMode::DataU));
        engine
            .write(&mut session, Address::Vfo(Vfo::A), &Value::Mode(OperatingMode::Usb))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_mnemonic_mismatch_is_invalid() {
        let mut mock = MockTransport::new();
        mock.expect(b"FA;", b"FB00007074000;");
        let (engine, mut session) = setup("K3", mock).await;
        let err = engine
            .read(&mut session, Operation::Frequency, Address::Vfo(Vfo::A))
            .await
            .unwrap_err();
        assert!(matches!(err, RigError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_kenwood_busy_while_transmitting() {
        let mut mock = MockTransport::new();
        mock.expect(b"FA;", b"?;");
        let (engine, mut session) = setup("TS-590SG", mock).await;
        let err = engine
            .read(&mut session, Operation::Frequency, Address::Vfo(Vfo::A))
            .await
            .unwrap_err();
        assert!(matches!(err, RigError::Busy));
    }

    #[tokio::test]
    async fn test_error_token_without_busy_quirk_is_rejection() {
        let mut mock = MockTransport::new();
        mock.expect(b"PC;", b"?;");
        let (engine, mut session) = setup("K3", mock).await;
        let err = engine
            .read(&mut session, Operation::Power, Address::Vfo(Vfo::A))
            .await
            .unwrap_err();
        assert!(matches!(err, RigError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_elecraft_absolute_rit() {
        let mut mock = MockTransport::new();
        mock.expect(b"RT1;", b"");
        mock.expect(b"RO-0125;", b"");
        let handle = mock.handle();
        let (engine, mut session) = setup("K3", mock).await;
        engine
            .write(
                &mut session,
                Address::Vfo(Vfo::A),
                &Value::Rit(RitState::new(true, -125)),
            )
            .await
            .unwrap();
        assert_eq!(handle.remaining(), 0);
    }

    #[tokio::test]
    async fn test_kenwood_relative_rit_emulation() {
        let mut mock = MockTransport::new();
        mock.expect(b"XT1;", b"");
        mock.expect(b"RC;", b"");
        mock.expect(b"RD00120;", b"");
        let handle = mock.handle();
        let (engine, mut session) = setup("TS-590SG", mock).await;
        engine
            .write(
                &mut session,
                Address::Vfo(Vfo::A),
                &Value::Xit(RitState::new(true, -120)),
            )
            .await
            .unwrap();
        assert_eq!(handle.remaining(), 0);
    }

    #[tokio::test]
    async fn test_offset_must_match_step() {
        let (engine, mut session) = setup("TS-590SG", MockTransport::new()).await;
        let err = engine
            .write(
                &mut session,
                Address::Vfo(Vfo::A),
                &Value::Rit(RitState::new(true, 15)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RigError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn test_rit_read_uses_info() {
        let mut mock = MockTransport::new();
        mock.expect(b"RT;", b"RT1;");
        mock.expect(b"IF;", b"IF00014250000     -002010 0000000200000080;");
        let (engine, mut session) = setup("TS-590SG", mock).await;
        let value = engine
            .read(&mut session, Operation::Rit, Address::Vfo(Vfo::A))
            .await
            .unwrap();
        assert_eq!(value, Value::Rit(RitState::new(true, -20)));
    }

    #[tokio::test]
    async fn test_ptt_styles() {
        let mut kenwood = MockTransport::new();
        kenwood.expect(b"TX;", b"");
        kenwood.expect(b"IF;", b"IF00014250000     +000000 0001200000080;");
        let (engine, mut session) = setup("TS-590SG", kenwood).await;
        engine
            .write(&mut session, Address::Vfo(Vfo::A), &Value::Ptt(true))
            .await
            .unwrap();
        assert_eq!(
            engine
                .read(&mut session, Operation::Ptt, Address::Vfo(Vfo::A))
                .await
                .unwrap(),
            Value::Ptt(true)
        );

        let mut yaesu = MockTransport::new();
        yaesu.expect(b"TX0;", b"");
        yaesu.expect(b"TX;", b"TX0;");
        let (engine, mut session) = setup("FT-991A", yaesu).await;
        engine
            .write(&mut session, Address::Vfo(Vfo::A), &Value::Ptt(false))
            .await
            .unwrap();
        assert_eq!(
            engine
                .read(&mut session, Operation::Ptt, Address::Vfo(Vfo::A))
                .await
                .unwrap(),
            Value::Ptt(false)
        );
    }

    #[tokio::test]
    async fn test_s_meter_selector() {
        let mut mock = MockTransport::new();
        mock.expect(b"SM0;", b"SM00015;");
        let (engine, mut session) = setup("TS-590SG", mock).await;
        match engine
            .read(&mut session, Operation::SMeter, Address::Vfo(Vfo::A))
            .await
            .unwrap()
        {
            Value::SMeter(reading) => {
                assert_eq!(reading.raw, 15);
                assert_eq!(reading.s_units, 9.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_echo_confirmation() {
        let mut mock = MockTransport::new();
        mock.expect(b"PC050;", b"PC050;");
        let mut caps = RadioCapabilities {
            protocol: Protocol::Kenwood,
            ..RadioCapabilities::default()
        };
        caps.quirks = QuirkProfile {
            set_ack: AckMode::Echo,
            ..QuirkProfile::ascii()
        };
        let engine = AsciiEngine::new(&cat_protocol::dialect::KENWOOD, &caps);
        let mut session = Session::open(Box::new(mock), caps, Duration::from_millis(100), None)
            .await
            .unwrap();
        engine
            .write(&mut session, Address::Vfo(Vfo::A), &Value::Power(50))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_confirmation_leaves_echo_undecided() {
        let mut mock = MockTransport::new();
        mock.expect(b"PC050;", b"PC050;");
        mock.expect(b"PC;", b"PC050;");
        let mut caps = RadioCapabilities {
            protocol: Protocol::Kenwood,
            ..RadioCapabilities::default()
        };
        caps.quirks = QuirkProfile {
            set_ack: AckMode::Echo,
            echo: EchoMode::Auto,
            ..QuirkProfile::ascii()
        };
        let engine = AsciiEngine::new(&cat_protocol::dialect::KENWOOD, &caps);
        let mut session = Session::open(Box::new(mock), caps, Duration::from_millis(100), None)
            .await
            .unwrap();

        engine
            .write(&mut session, Address::Vfo(Vfo::A), &Value::Power(50))
            .await
            .unwrap();
        assert_eq!(session.echo(), crate::quirks::EchoState::Detecting);

        assert_eq!(
            engine
                .read(&mut session, Operation::Power, Address::Vfo(Vfo::A))
                .await
                .unwrap(),
            Value::Power(50)
        );
        assert_eq!(session.echo(), crate::quirks::EchoState::Off);
    }

    #[tokio::test]
    async fn test_exchange_needs_native_command() {
        let mut mock = MockTransport::new();
        mock.expect(b"SWT11;", b"");
        let (engine, mut session) = setup("K3", mock).await;
        engine.exchange(&mut session, Axis::Vfo).await.unwrap();

        let (kenwood, mut session) = setup("TS-590SG", MockTransport::new()).await;
        assert!(matches!(
            kenwood.exchange(&mut session, Axis::Vfo).await,
            Err(RigError::UnsupportedOperation(_))
        ));
    }
}
