//! Shared setup for the integration suites: a rig connected to a virtual
//! radio over an in-memory duplex stream

#![allow(dead_code)]

use cat_protocol::{RadioCapabilities, RadioDatabase};
use cat_rig::{Rig, RigConfig, StreamTransport};
use cat_sim::{spawn_virtual_radio, VirtualRadio, VirtualRadioConfig, VirtualRadioHandle};

pub fn capabilities(model: &str) -> RadioCapabilities {
    RadioDatabase::by_name(model)
        .unwrap_or_else(|| panic!("no reference model {}", model))
        .capabilities
}

/// Rig and virtual radio for a reference model
///
/// The cache TTL is long enough that entries never expire mid-test.
pub async fn connect(model: &str) -> (Rig, VirtualRadioHandle) {
    let sim = VirtualRadioConfig::for_model(model).unwrap();
    let config = RigConfig {
        cache_ttl_ms: 60_000,
        ..RigConfig::default()
    };
    connect_with(model, sim, config).await
}

/// Rig for `model`'s capabilities talking to a radio built from `sim`
pub async fn connect_with(
    model: &str,
    sim: VirtualRadioConfig,
    config: RigConfig,
) -> (Rig, VirtualRadioHandle) {
    let radio = VirtualRadio::from_config(sim).unwrap();
    let (stream, handle) = spawn_virtual_radio(radio);
    let rig = Rig::connect(StreamTransport::new(model, stream), capabilities(model), config)
        .await
        .unwrap();
    (rig, handle)
}
