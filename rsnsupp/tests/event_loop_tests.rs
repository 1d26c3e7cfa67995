//! The tokio event loop: frames and timers delivered to a supplicant that
//! lives on its own task.

mod common;

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use rsnkey::Akm;

use rsnsupp::event_loop::{self, SupplicantEvent};
use rsnsupp::{Supplicant, SupplicantConfig, WpaState};

use common::*;

fn tokio_driver() -> (MockDriver, mpsc::UnboundedReceiver<(rsnkey::MacAddr, Bytes)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let driver = MockDriver {
        tokio_clock: true,
        outbox: Some(tx),
        ..Default::default()
    };
    (driver, rx)
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn handshake_over_event_channel() {
    let (driver, mut wire) = tokio_driver();
    let sup = Supplicant::new(psk_config(), driver, MockEapol::default()).unwrap();
    let (events, task) = event_loop::spawn(sup);
    let mut ap = TestAp::psk();

    events.send(SupplicantEvent::Assoc(ap.assoc_params())).await.unwrap();
    // Junk is logged and dropped; the loop keeps going.
    events
        .send(SupplicantEvent::Eapol {
            src: AP,
            frame: Bytes::from_static(&[2, 3, 0]),
        })
        .await
        .unwrap();
    events
        .send(SupplicantEvent::Eapol {
            src: AP,
            frame: ap.msg1(None),
        })
        .await
        .unwrap();

    let (dest, msg2) = wire.recv().await.unwrap();
    assert_eq!(dest, AP);
    ap.rx_msg2(&msg2);

    events
        .send(SupplicantEvent::Eapol {
            src: AP,
            frame: ap.msg3(),
        })
        .await
        .unwrap();
    let (_, msg4) = wire.recv().await.unwrap();
    ap.rx_msg4(&msg4);

    events.send(SupplicantEvent::Shutdown).await.unwrap();
    let sup = task.await.unwrap().unwrap();
    assert_eq!(sup.state(), WpaState::Completed);
    assert_eq!(sup.driver().keys.len(), 2);
}

#[tokio::test]
async fn loop_ends_when_senders_dropped() {
    let sup = supplicant(psk_config());
    let (events, task) = event_loop::spawn(sup);
    drop(events);
    let sup = task.await.unwrap().unwrap();
    assert_eq!(sup.state(), WpaState::Disconnected);
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn pmksa_expiry_fires_on_schedule() {
    let (driver, _wire) = tokio_driver();
    let config = SupplicantConfig {
        pmk_lifetime_secs: 100,
        ..eap_config()
    };
    let mut sup = Supplicant::new(config, driver, MockEapol::default()).unwrap();
    sup.pmksa_add(&[1; 32], Some([1; 16]), AP, NET, Akm::Ieee8021x, None)
        .unwrap();
    let (events, task) = event_loop::spawn(sup);

    tokio::time::sleep(Duration::from_secs(99)).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    events.send(SupplicantEvent::Shutdown).await.unwrap();
    let sup = task.await.unwrap().unwrap();
    assert!(sup.pmksa().is_empty());
    assert_eq!(sup.driver().pmkids_removed, vec![(AP, [1; 16])]);
}

#[tokio::test(start_paused = true)]
async fn ptk_rekey_requested_by_timer() {
    let (driver, mut wire) = tokio_driver();
    let config = SupplicantConfig {
        ptk_rekey_secs: Some(600),
        ..psk_config()
    };
    let sup = Supplicant::new(config, driver, MockEapol::default()).unwrap();
    let (events, task) = event_loop::spawn(sup);
    let mut ap = TestAp::psk();

    events.send(SupplicantEvent::Assoc(ap.assoc_params())).await.unwrap();
    events
        .send(SupplicantEvent::Eapol {
            src: AP,
            frame: ap.msg1(None),
        })
        .await
        .unwrap();
    let (_, msg2) = wire.recv().await.unwrap();
    ap.rx_msg2(&msg2);
    events
        .send(SupplicantEvent::Eapol {
            src: AP,
            frame: ap.msg3(),
        })
        .await
        .unwrap();
    wire.recv().await.unwrap();

    // Paused time advances to the rekey deadline while the test waits.
    let (dest, request) = wire.recv().await.unwrap();
    assert_eq!(dest, AP);
    let request = rsnkey::EapolKeyFrame::decode(&request, 16).unwrap();
    assert!(request.key_info.has(rsnkey::KeyInfo::REQUEST));
    assert!(request.key_info.has(rsnkey::KeyInfo::KEY_TYPE));

    drop(events);
    task.await.unwrap().unwrap();
}
