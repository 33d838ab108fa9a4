//! VFO / band addressing state machine
//!
//! Radios differ in how a frequency register is addressed:
//!
//! - **Dual VFO**: one receiver, VFO A/B. Commands act on the selected VFO
//!   unless the protocol has per-VFO mnemonics.
//! - **Dual receiver**: main and sub receivers, one VFO each. Selecting
//!   the receiver is a separate side-effecting command.
//! - **Dual receiver, dual VFO**: each receiver carries its own A/B pair.
//!   No command addresses both axes at once, so reaching a slot means
//!   selecting the receiver, then the VFO, then issuing the command.
//!
//! [`AddressingState`] latches what was last selected so repeated commands
//! to the same slot skip redundant selections. A latch is only set after
//! the radio accepted the selection; a failed or timed-out selection
//! leaves it unknown.

use cat_protocol::{Band, Slot, Topology, Vfo};

/// How an engine's command for an operation can address a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Targeting {
    /// Acts on whatever is currently selected
    Current,
    /// Carries an index for the topology's single axis (VFO on a dual-VFO
    /// radio, receiver on a dual-receiver radio), e.g. `FA`/`FB`
    Indexed,
}

/// One selection command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selection {
    /// Make a receiver active
    Band(Band),
    /// Make a VFO active (within the active receiver)
    Vfo(Vfo),
}

/// How the final command addresses its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// The slot is selected; use the current-slot command
    Current(Slot),
    /// Index the command by VFO
    Vfo(Vfo),
    /// Index the command by receiver
    Band(Band),
}

impl Address {
    /// Index (0 or 1) for commands that carry one
    pub fn index(&self, topology: Topology) -> usize {
        match self {
            Address::Vfo(v) => v.index(),
            Address::Band(b) => b.index(),
            Address::Current(slot) if topology.has_vfo_pair() => slot.vfo.index(),
            Address::Current(slot) => slot.band.index(),
        }
    }
}

/// Selections still needed, in order, plus the final addressing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Selection commands to issue first
    pub steps: Vec<Selection>,
    /// How to address the command itself
    pub address: Address,
}

/// Axis along which two slots form a hardware pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// VFO A and B of one receiver
    Vfo,
    /// Main and sub receivers
    Band,
}

/// Latched band/VFO selection of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressingState {
    topology: Topology,
    band: Option<Band>,
    vfo: [Option<Vfo>; 2],
}

impl AddressingState {
    /// Fresh state with nothing known
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            band: None,
            vfo: [None, None],
        }
    }

    /// Topology this state models
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Latched active receiver
    pub fn active_band(&self) -> Option<Band> {
        match self.topology {
            Topology::DualVfo => Some(Band::Main),
            _ => self.band,
        }
    }

    /// Latched active VFO of `band`
    pub fn active_vfo(&self, band: Band) -> Option<Vfo> {
        match self.topology {
            Topology::DualReceiver => Some(Vfo::A),
            _ => self.vfo[band.index()],
        }
    }

    /// Latched active slot, if fully known
    pub fn active_slot(&self) -> Option<Slot> {
        let band = self.active_band()?;
        Some(Slot::new(band, self.active_vfo(band)?))
    }

    /// Plan how to reach `slot` with a command of the given targeting
    ///
    /// `slot` must already be normalized for the topology.
    pub fn plan(&self, slot: Slot, targeting: Targeting) -> Route {
        let mut steps = Vec::with_capacity(2);
        let address = match (self.topology, targeting) {
            (Topology::DualVfo, Targeting::Indexed) => Address::Vfo(slot.vfo),
            (Topology::DualReceiver, Targeting::Indexed) => Address::Band(slot.band),
            (Topology::DualVfo, Targeting::Current) => {
                if self.active_vfo(Band::Main) != Some(slot.vfo) {
                    steps.push(Selection::Vfo(slot.vfo));
                }
                Address::Current(slot)
            }
            (Topology::DualReceiver, Targeting::Current) => {
                if self.band != Some(slot.band) {
                    steps.push(Selection::Band(slot.band));
                }
                Address::Current(slot)
            }
            // Receiver first, then VFO, whatever the command could index
            (Topology::DualReceiverDualVfo, _) => {
                if self.band != Some(slot.band) {
                    steps.push(Selection::Band(slot.band));
                }
                if self.vfo[slot.band.index()] != Some(slot.vfo) {
                    steps.push(Selection::Vfo(slot.vfo));
                }
                Address::Current(slot)
            }
        };
        Route { steps, address }
    }

    /// Selections for an explicit select of `slot`, ignoring latches
    pub fn select_steps(&self, slot: Slot) -> Vec<Selection> {
        match self.topology {
            Topology::DualVfo => vec![Selection::Vfo(slot.vfo)],
            Topology::DualReceiver => vec![Selection::Band(slot.band)],
            Topology::DualReceiverDualVfo => {
                vec![Selection::Band(slot.band), Selection::Vfo(slot.vfo)]
            }
        }
    }

    /// Selections that make the receiver holding `slot` active before a
    /// pair command along `axis`
    ///
    /// A/B pair commands act on the active receiver, which only matters
    /// when each receiver has its own pair.
    pub fn pair_steps(&self, slot: Slot, axis: Axis) -> Vec<Selection> {
        match (self.topology, axis) {
            (Topology::DualReceiverDualVfo, Axis::Vfo) if self.band != Some(slot.band) => {
                vec![Selection::Band(slot.band)]
            }
            _ => Vec::new(),
        }
    }

    /// Latch a selection the radio accepted
    pub fn selected(&mut self, selection: Selection) {
        match selection {
            Selection::Band(band) => self.band = Some(band),
            Selection::Vfo(vfo) => match self.active_band() {
                Some(band) => self.vfo[band.index()] = Some(vfo),
                None => self.vfo = [None, None],
            },
        }
    }

    /// Forget what a failed or timed-out selection may have changed
    pub fn unknown(&mut self, selection: Selection) {
        match selection {
            Selection::Band(_) => self.band = None,
            Selection::Vfo(_) => match self.active_band() {
                Some(band) => self.vfo[band.index()] = None,
                None => self.vfo = [None, None],
            },
        }
    }

    /// Forget everything
    pub fn reset(&mut self) {
        self.band = None;
        self.vfo = [None, None];
    }

    /// The axis along which `a` and `b` form an exchangeable pair
    pub fn pair_axis(&self, a: Slot, b: Slot) -> Option<Axis> {
        match self.topology {
            Topology::DualVfo if a.band == b.band && a.vfo != b.vfo => Some(Axis::Vfo),
            Topology::DualReceiver if a.vfo == b.vfo && a.band != b.band => Some(Axis::Band),
            Topology::DualReceiverDualVfo if a.vfo == b.vfo && a.band != b.band => {
                Some(Axis::Band)
            }
            Topology::DualReceiverDualVfo if a.band == b.band && a.vfo != b.vfo => {
                Some(Axis::Vfo)
            }
            _ => None,
        }
    }
}
