//! Registration scenarios: NG Setup, 5G-AKA, secured registration,
//! deregistration and the idle plus service-request cycle.

use tokio::sync::oneshot;

use ransim_common::{Plmn, Tai};
use ransim_gnb::GnbMessage;
use ransim_ue::{MmState, UeMessage};

use crate::mock_amf::{MockAmf, MockAmfConfig, MockAmfEvent};
use crate::test_fixtures::{amf_address, gnb_config, ue_config, TEST_PLMN, TEST_TAC};
use crate::test_utils::{
    bring_up, init_test_logging, next_matching, settle, start_gnb, start_ue, ue_binding,
    ue_status,
};

#[tokio::test]
async fn test_ng_setup_refused_for_unknown_plmn() {
    init_test_logging();
    let (amf, mut amf_events) = MockAmf::start(MockAmfConfig::default());

    let mut config = gnb_config(1);
    config.plmn = Plmn::new(999, 99, true);
    let gnb = start_gnb(config);
    amf.attach(&gnb.handle, amf_address(1), 100).await;
    next_matching(&mut amf_events, |e| {
        matches!(
            e,
            MockAmfEvent::NgSetupRequested {
                gnb_id: 1,
                accepted: false,
            }
        )
    })
    .await;
    settle().await;

    // With no serving AMF the gNB refuses admission; the UE never gets
    // past DEREGISTERED.
    let ue_cfg = ue_config(1);
    amf.add_subscriber(ue_cfg.clone()).await;
    let ue = start_ue(ue_cfg, 1);
    ue.handle
        .send(UeMessage::Register {
            admission_tx: gnb.admission_tx.clone(),
        })
        .await
        .expect("UE task gone");
    settle().await;
    assert_eq!(ue_status(&ue).await.mm_state, MmState::Deregistered);
    assert!(ue_binding(&gnb, ue.pr_id).await.is_none());
}

#[tokio::test]
async fn test_registration_with_authentication() {
    init_test_logging();
    let (amf, mut amf_events, gnb) = bring_up(MockAmfConfig::default()).await;

    let config = ue_config(1);
    amf.add_subscriber(config.clone()).await;
    let mut ue = start_ue(config, 1);
    ue.register(&gnb).await;

    let supi = ue.supi.clone();
    next_matching(&mut amf_events, |e| {
        matches!(e, MockAmfEvent::UeRegistered { supi: s, .. } if *s == supi)
    })
    .await;

    let status = ue_status(&ue).await;
    assert_eq!(status.mm_state, MmState::Registered);
    assert!(status.tmsi.is_some());
    assert!(status.allowed_slice.is_some());
    assert!(ue_binding(&gnb, ue.pr_id).await.is_some());
}

#[tokio::test]
async fn test_deregistration_releases_context() {
    init_test_logging();
    let (amf, mut amf_events, gnb) = bring_up(MockAmfConfig::default()).await;

    let config = ue_config(1);
    amf.add_subscriber(config.clone()).await;
    let mut ue = start_ue(config, 1);
    ue.register(&gnb).await;

    ue.handle
        .send(UeMessage::Deregister)
        .await
        .expect("UE task gone");
    ue.wait_mm(MmState::Deregistered).await;
    next_matching(&mut amf_events, |e| {
        matches!(e, MockAmfEvent::UeDeregistered { .. })
    })
    .await;
    settle().await;

    assert!(ue_binding(&gnb, ue.pr_id).await.is_none());
}

#[tokio::test]
async fn test_idle_paging_and_service_request() {
    init_test_logging();
    let (amf, mut amf_events, gnb) = bring_up(MockAmfConfig::default()).await;

    let config = ue_config(1);
    amf.add_subscriber(config.clone()).await;
    let mut ue = start_ue(config, 1);
    ue.register(&gnb).await;
    let tmsi = ue_status(&ue).await.tmsi.expect("registered UE has a TMSI");

    ue.handle.send(UeMessage::GoIdle).await.expect("UE task gone");
    ue.wait_mm(MmState::Idle).await;
    next_matching(&mut amf_events, |e| {
        matches!(e, MockAmfEvent::UeWentIdle { .. })
    })
    .await;
    settle().await;
    assert!(ue_binding(&gnb, ue.pr_id).await.is_none());

    // Page in the gNB's tracking area; the identity must be cached.
    amf.page(
        tmsi,
        vec![Tai {
            plmn: TEST_PLMN,
            tac: TEST_TAC,
        }],
    )
    .await;
    settle().await;
    let (reply_tx, reply_rx) = oneshot::channel();
    gnb.handle
        .send(GnbMessage::IsPaged {
            tmsi,
            reply: reply_tx,
        })
        .await
        .expect("gNB task gone");
    assert!(reply_rx.await.expect("gNB task gone"));

    ue.handle
        .send(UeMessage::ServiceRequest)
        .await
        .expect("UE task gone");
    ue.wait_mm(MmState::Registered).await;
    next_matching(&mut amf_events, |e| {
        matches!(e, MockAmfEvent::ServiceRestored { .. })
    })
    .await;
    settle().await;
    assert!(ue_binding(&gnb, ue.pr_id).await.is_some());
}
