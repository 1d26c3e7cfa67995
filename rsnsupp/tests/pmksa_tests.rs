//! PMKSA cache behaviour seen through the supplicant: driver
//! notifications, timers and their effect on the association.

mod common;

use std::time::Duration;

use rsnkey::derive::pmkid;
use rsnkey::{Akm, MacAddr};

use rsnsupp::timer::TimerKind;
use rsnsupp::{ReasonCode, SupplicantConfig, WpaState};

use common::*;

fn peer(n: u8) -> MacAddr {
    MacAddr([0x02, 0, 0, 0, 0x10, n])
}

fn eap_ap(addr: MacAddr) -> TestAp {
    TestAp {
        addr,
        ..TestAp::new(Akm::Ieee8021x, &msk()[..32])
    }
}

/// 802.1X association with AP whose PMK came from the EAP master key.
fn connected_eap(config: SupplicantConfig) -> (TestSupplicant, TestAp) {
    let mut sup = supplicant(config);
    sup.eapol_mut().msk = Some(msk());
    let mut ap = eap_ap(AP);
    let id = pmkid(Akm::Ieee8021x, &msk()[..32], AP, STA).unwrap();
    associate(&mut sup, &ap);
    run_4way(&mut sup, &mut ap, Some(&id));
    (sup, ap)
}

// ---------------------------------------------------------------------------
// Insertion and eviction
// ---------------------------------------------------------------------------

#[test]
fn full_cache_evicts_oldest_entry() {
    let mut sup = supplicant(SupplicantConfig {
        pmksa_capacity: 2,
        ..eap_config()
    });
    for n in 1..=3u8 {
        sup.driver_mut().advance(Duration::from_secs(1));
        sup.pmksa_add(&[n; 32], Some([n; 16]), peer(n), NET, Akm::Ieee8021x, None)
            .unwrap();
    }

    assert_eq!(sup.pmksa().len(), 2);
    assert_eq!(sup.driver().pmkids_added.len(), 3);
    assert_eq!(sup.driver().pmkids_removed, vec![(peer(1), [1; 16])]);
    let left: Vec<MacAddr> = sup.pmksa().iter().map(|(_, e)| e.aa).collect();
    assert_eq!(left, vec![peer(2), peer(3)]);
}

#[test]
fn new_pmk_replaces_entry_for_same_peer() {
    let mut sup = supplicant(eap_config());
    sup.pmksa_add(&[1; 32], Some([1; 16]), AP, NET, Akm::Ieee8021x, None)
        .unwrap();
    // Same PMK and PMKID: kept as is.
    sup.pmksa_add(&[1; 32], Some([1; 16]), AP, NET, Akm::Ieee8021x, None)
        .unwrap();
    assert!(sup.driver().pmkids_removed.is_empty());

    sup.pmksa_add(&[2; 32], Some([2; 16]), AP, NET, Akm::Ieee8021x, None)
        .unwrap();
    assert_eq!(sup.pmksa().len(), 1);
    assert_eq!(sup.driver().pmkids_removed, vec![(AP, [1; 16])]);
    assert_eq!(sup.pmksa().iter().next().unwrap().1.pmkid, [2; 16]);
}

#[test]
fn pmkid_computed_when_absent() {
    let mut sup = supplicant(eap_config());
    let pmk = [0x21u8; 32];
    sup.pmksa_add(&pmk, None, AP, NET, Akm::Ieee8021x, None).unwrap();
    let (_, entry) = sup.pmksa().iter().next().unwrap();
    assert_eq!(entry.pmkid, pmkid(Akm::Ieee8021x, &pmk, AP, STA).unwrap());
    assert_eq!(entry.spa, STA);
    assert!(entry.external);
}

#[test]
fn short_pmk_rejected() {
    let mut sup = supplicant(eap_config());
    assert!(sup
        .pmksa_add(&[1; 8], None, AP, NET, Akm::Ieee8021x, None)
        .is_err());
    assert!(sup.pmksa().is_empty());
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[test]
fn idle_entry_expires() {
    let mut sup = supplicant(SupplicantConfig {
        pmk_lifetime_secs: 100,
        ..eap_config()
    });
    sup.pmksa_add(&[1; 32], Some([1; 16]), AP, NET, Akm::Ieee8021x, None)
        .unwrap();
    assert!(sup.timer_armed(TimerKind::PmksaExpire));
    assert!(!sup.timer_armed(TimerKind::PmksaReauth));

    sup.driver_mut().advance(Duration::from_secs(99));
    sup.poll_timers();
    assert_eq!(sup.pmksa().len(), 1);

    sup.driver_mut().advance(Duration::from_secs(1));
    sup.poll_timers();
    assert!(sup.pmksa().is_empty());
    assert_eq!(sup.driver().pmkids_removed, vec![(AP, [1; 16])]);
    assert!(!sup.timer_armed(TimerKind::PmksaExpire));
    assert!(sup.driver().deauths.is_empty());
}

#[test]
fn reauth_threshold_then_expiry() {
    let (mut sup, _ap) = connected_eap(SupplicantConfig {
        pmk_lifetime_secs: 100,
        ..eap_config()
    });
    assert!(sup.timer_armed(TimerKind::PmksaReauth));

    sup.driver_mut().advance(Duration::from_secs(69));
    sup.poll_timers();
    assert_eq!(sup.eapol().reauth_requests, 0);

    sup.driver_mut().advance(Duration::from_secs(1));
    sup.poll_timers();
    assert_eq!(sup.eapol().reauth_requests, 1);
    assert!(sup.pmksa().current().is_none());
    assert_eq!(sup.state(), WpaState::Completed);

    // Nobody refreshed the PMK; it is still in use when it expires.
    sup.driver_mut().advance(Duration::from_secs(30));
    sup.poll_timers();
    assert_eq!(sup.driver().deauths, vec![ReasonCode::Unspecified]);
    assert_eq!(sup.state(), WpaState::Disconnected);
    assert!(sup.pmksa().is_empty());
}

#[test]
fn driver_roaming_withdraws_pmkid_at_reauth() {
    let (mut sup, _ap) = connected_eap(SupplicantConfig {
        pmk_lifetime_secs: 100,
        driver_roaming: true,
        ..eap_config()
    });
    let id = sup.pmksa().current().unwrap().pmkid;

    sup.driver_mut().advance(Duration::from_secs(70));
    sup.poll_timers();
    assert_eq!(sup.eapol().reauth_requests, 0);
    assert_eq!(sup.driver().pmkids_removed, vec![(AP, id)]);
    assert_eq!(sup.pmksa().len(), 1);
}

#[test]
fn sae_entry_outlives_lifetime_while_associated() {
    let mut sup = supplicant(SupplicantConfig {
        akm: Akm::Sae,
        ssid: SSID.into(),
        pmk_lifetime_secs: 100,
        ..Default::default()
    });
    let ap = TestAp::new(Akm::Sae, &[0x42; 32]);
    associate(&mut sup, &ap);
    sup.set_pmk(&[0x42; 32]).unwrap();
    assert!(sup.pmksa().current().is_some());
    assert!(!sup.timer_armed(TimerKind::PmksaExpire));
    assert!(!sup.timer_armed(TimerKind::PmksaReauth));

    sup.driver_mut().advance(Duration::from_secs(200));
    sup.poll_timers();
    assert_eq!(sup.pmksa().len(), 1);

    sup.notify_disassoc();
    assert!(sup.pmksa().is_empty());
    assert_eq!(sup.driver().pmkids_removed.len(), 1);
    assert!(sup.driver().deauths.is_empty());
}

// ---------------------------------------------------------------------------
// Flush
// ---------------------------------------------------------------------------

#[test]
fn flushing_current_entry_deauths() {
    let (mut sup, _ap) = connected_eap(eap_config());
    assert_eq!(sup.pmksa_flush(None, None, false), 1);
    assert_eq!(sup.driver().deauths, vec![ReasonCode::Unspecified]);
    assert_eq!(sup.state(), WpaState::Disconnected);
}

#[test]
fn external_only_flush_keeps_own_entries() {
    let (mut sup, _ap) = connected_eap(eap_config());
    sup.pmksa_add(&[7; 32], Some([7; 16]), AP2, NET, Akm::Ieee8021x, None)
        .unwrap();
    assert_eq!(sup.pmksa().len(), 2);

    assert_eq!(sup.pmksa_flush(Some(NET), None, true), 1);
    assert_eq!(sup.pmksa().len(), 1);
    assert!(sup.pmksa().current().is_some());
    assert!(sup.driver().deauths.is_empty());
}

#[test]
fn flush_by_pmk() {
    let mut sup = supplicant(eap_config());
    sup.pmksa_add(&[1; 32], Some([1; 16]), peer(1), NET, Akm::Ieee8021x, None)
        .unwrap();
    sup.pmksa_add(&[2; 32], Some([2; 16]), peer(2), NET, Akm::Ieee8021x, None)
        .unwrap();
    assert_eq!(sup.pmksa_flush(None, Some(&[2; 32]), false), 1);
    assert_eq!(sup.pmksa().iter().next().unwrap().1.aa, peer(1));
}

// ---------------------------------------------------------------------------
// Opportunistic key caching
// ---------------------------------------------------------------------------

#[test]
fn okc_clones_entry_for_new_ap() {
    let config = SupplicantConfig {
        okc: true,
        ..eap_config()
    };
    let (mut sup, _ap) = connected_eap(config);
    sup.notify_disassoc();
    sup.eapol_mut().msk = None;

    let mut ap2 = eap_ap(AP2);
    associate(&mut sup, &ap2);
    let current = sup.pmksa().current().unwrap();
    assert_eq!(current.aa, AP2);
    assert!(current.opportunistic);
    assert_eq!(sup.pmksa().len(), 2);

    let id = pmkid(Akm::Ieee8021x, &msk()[..32], AP2, STA).unwrap();
    assert_eq!(current.pmkid, id);
    run_4way(&mut sup, &mut ap2, Some(&id));
    assert!(!sup.pmksa().current().unwrap().opportunistic);
    assert_eq!(sup.eapol().cached_pmk, 1);
    assert_eq!(sup.eapol().starts, 0);
}

#[test]
fn no_okc_without_config() {
    let (mut sup, _ap) = connected_eap(eap_config());
    sup.notify_disassoc();
    associate(&mut sup, &eap_ap(AP2));
    assert!(sup.pmksa().current().is_none());
    assert_eq!(sup.pmksa().len(), 1);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[test]
fn list_shows_remaining_lifetime() {
    let mut sup = supplicant(SupplicantConfig {
        pmk_lifetime_secs: 3600,
        ..eap_config()
    });
    sup.pmksa_add(&[1; 32], Some([0x11; 16]), AP, NET, Akm::Ieee8021x, None)
        .unwrap();
    sup.driver_mut().advance(Duration::from_secs(600));

    let list = sup.pmksa_list();
    let mut lines = list.lines();
    assert_eq!(
        lines.next(),
        Some("Index / AA / PMKID / expiration (in seconds) / opportunistic")
    );
    assert_eq!(
        lines.next(),
        Some("1 02:00:00:00:00:01 11111111111111111111111111111111 3000 0")
    );
    assert_eq!(lines.next(), None);
}
