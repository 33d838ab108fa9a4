//! Virtual transceivers for CAT testing
//!
//! This crate stands in for radio hardware when testing CAT control:
//!
//! - **VirtualRadio**: per-slot radio state that answers CI-V frames or any
//!   of the ASCII dialects the way the real radio would, including echo,
//!   busy replies while transmitting, and a silent (dead) mode
//! - **Task**: runs a virtual radio behind a `tokio::io::duplex` stream and
//!   hands back a handle for inspecting its state mid-test
//!
//! # Example
//!
//! ```rust
//! use cat_protocol::Slot;
//! use cat_sim::VirtualRadio;
//!
//! let mut radio = VirtualRadio::for_model("TS-590SG").unwrap();
//!
//! // Select VFO B, tune it, then ask for it back
//! let reply = radio.receive(b"FR1;FB00007074000;FB;");
//! assert_eq!(reply, b"FB00007074000;");
//! assert_eq!(radio.active_slot(), Slot::MAIN_B);
//! ```

pub mod error;
pub mod radio;
pub mod task;

pub use error::{Result, SimError};
pub use radio::{SlotState, VirtualRadio, VirtualRadioConfig};
pub use task::{run_virtual_radio, spawn_virtual_radio, SimCommand, VirtualRadioHandle};
