//! One pass over each ASCII dialect against the virtual radio

mod common;

use cat_protocol::{OperatingMode, RitState, Slot};

#[tokio::test]
async fn test_elecraft_k3() {
    let (rig, radio) = common::connect("K3").await;

    rig.set_mode(Slot::MAIN_A, OperatingMode::Cw).await.unwrap();
    rig.set_power(50).await.unwrap();
    rig.set_split(true).await.unwrap();
    rig.set_rit(RitState::new(true, -125)).await.unwrap();

    assert_eq!(radio.with(|r| r.mode(Slot::MAIN_A)), OperatingMode::Cw);
    assert_eq!(radio.with(|r| r.power_watts()), 50);
    assert!(radio.with(|r| r.split()));
    assert_eq!(radio.with(|r| r.rit()), RitState::new(true, -125));

    // Writes primed the cache
    let start = radio.requests();
    assert_eq!(rig.mode(Slot::MAIN_A).await.unwrap(), OperatingMode::Cw);
    assert_eq!(rig.power().await.unwrap(), 50);
    assert_eq!(radio.requests(), start);
    assert_eq!(rig.identify().await.unwrap(), "017");

    radio.with(|r| r.set_s_meter_raw(9));
    let reading = rig.s_meter().await.unwrap();
    assert_eq!(reading.raw, 9);
    assert_eq!(reading.s_units, 9.0);
    assert_eq!(reading.db_over_s9, 0.0);
}

#[tokio::test]
async fn test_kenwood_ts590_offsets() {
    let (rig, radio) = common::connect("TS-590SG").await;

    rig.set_xit(RitState::new(true, 120)).await.unwrap();
    assert_eq!(radio.with(|r| r.xit()), RitState::new(true, 120));
    assert!(!radio.with(|r| r.rit()).enabled);

    // The offset is shared, so RIT sees the XIT offset
    let next = rig.adjust_rit(30).await.unwrap();
    assert_eq!(next, RitState::new(false, 150));
    assert_eq!(radio.with(|r| r.rit()).offset_hz, 150);
    assert_eq!(rig.xit().await.unwrap(), RitState::new(true, 150));
}

#[tokio::test]
async fn test_yaesu_ft991a() {
    let (rig, radio) = common::connect("FT-991A").await;

    rig.set_ptt(true).await.unwrap();
    assert!(radio.with(|r| r.ptt()));
    assert!(rig.ptt().await.unwrap());
    rig.set_ptt(false).await.unwrap();
    assert!(!rig.ptt().await.unwrap());

    rig.set_mode(Slot::MAIN_B, OperatingMode::DataU).await.unwrap();
    assert_eq!(radio.with(|r| r.mode(Slot::MAIN_B)), OperatingMode::DataU);
    assert_eq!(radio.with(|r| r.mode(Slot::MAIN_A)), OperatingMode::Usb);
    assert_eq!(
        rig.get(cat_rig::Operation::Mode, Slot::MAIN_B, false)
            .await
            .unwrap(),
        cat_rig::Value::Mode(OperatingMode::DataU)
    );

    radio.with(|r| r.set_s_meter_raw(130));
    let reading = rig.s_meter().await.unwrap();
    assert_eq!(reading.s_units, 9.0);
    assert_eq!(reading.to_string(), "S9.0");
}

#[tokio::test]
async fn test_out_of_range_rejected_before_sending() {
    let (rig, radio) = common::connect("FT-991A").await;

    assert!(matches!(
        rig.set_frequency(Slot::MAIN_A, 1_000_000_000).await,
        Err(cat_rig::RigError::InvalidParameter(_))
    ));
    assert!(matches!(
        rig.set_power(500).await,
        Err(cat_rig::RigError::InvalidParameter(_))
    ));
    assert_eq!(radio.requests(), 0);
}
