//! Async CAT rig control
//!
//! This crate drives a transceiver through one uniform API regardless of
//! its wire protocol:
//!
//! - **Transports** ([`transport`]): serial port, any async byte stream, or
//!   a scripted mock
//! - **Session** ([`Session`]): echo handling, inter-command spacing, busy
//!   classification and a per-command deadline
//! - **Addressing** ([`vfo`]): the band/VFO state machine for dual-VFO,
//!   dual-receiver and dual-receiver-dual-VFO radios
//! - **Engines** ([`engine`]): CI-V and the shared ASCII engine
//! - **Rig** ([`Rig`]): a cloneable handle to a connection task that owns
//!   all of the above plus a short-lived value cache
//!
//! # Example
//!
//! ```rust,no_run
//! use cat_protocol::{RadioDatabase, Slot};
//! use cat_rig::{Rig, RigConfig, SerialConfig};
//!
//! # async fn run() -> cat_rig::Result<()> {
//! let caps = RadioDatabase::by_name("IC-7300").unwrap().capabilities;
//! let serial = SerialConfig::for_model("/dev/ttyUSB0", &caps);
//! let rig = Rig::connect_serial(serial, caps, RigConfig::default()).await?;
//!
//! rig.set_frequency(Slot::MAIN_A, 14_074_000).await?;
//! println!("{} Hz", rig.frequency(Slot::MAIN_A).await?);
//! rig.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod quirks;
pub mod rig;
pub mod session;
pub mod transport;
pub mod vfo;

pub use actor::RigCommand;
pub use cache::StateCache;
pub use config::RigConfig;
pub use engine::{Engine, Operation, Value};
pub use error::{Result, RigError};
pub use rig::Rig;
pub use session::Session;
pub use transport::{
    list_ports, FlowControl, MockHandle, MockTransport, SerialConfig, SerialTransport, StopBits,
    StreamTransport, Transport,
};
pub use vfo::{AddressingState, Targeting};
