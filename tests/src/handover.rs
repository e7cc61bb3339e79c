//! Handover scenarios: Xn with a path switch, and N2 prepared through
//! the AMF. Both run two gNBs against one mock AMF and verify that the
//! UE's binding and its session survive the move.

use tokio::sync::mpsc;

use ransim_gnb::GnbMessage;
use ransim_ue::{MmState, SmState, UeMessage, UeStateEvent, UeStatus};

use crate::mock_amf::{MockAmf, MockAmfConfig, MockAmfEvent};
use crate::test_fixtures::{amf_address, gnb_config, ue_config};
use crate::test_utils::{
    init_test_logging, next_matching, settle, start_gnb, start_ue, ue_binding, ue_status,
    GnbUnderTest, UeUnderTest,
};

/// Two gNBs on one mock AMF, Xn-peered both ways, with one registered
/// UE holding an active session on the first gNB.
async fn two_cell_setup() -> (
    MockAmf,
    mpsc::Receiver<MockAmfEvent>,
    GnbUnderTest,
    GnbUnderTest,
    UeUnderTest,
) {
    let (amf, mut amf_events) = MockAmf::start(MockAmfConfig::default());
    let gnb1 = start_gnb(gnb_config(1));
    let gnb2 = start_gnb(gnb_config(2));
    amf.attach(&gnb1.handle, amf_address(1), 100).await;
    next_matching(&mut amf_events, |e| {
        matches!(
            e,
            MockAmfEvent::NgSetupRequested {
                gnb_id: 1,
                accepted: true,
            }
        )
    })
    .await;
    amf.attach(&gnb2.handle, amf_address(1), 100).await;
    next_matching(&mut amf_events, |e| {
        matches!(
            e,
            MockAmfEvent::NgSetupRequested {
                gnb_id: 2,
                accepted: true,
            }
        )
    })
    .await;
    settle().await;

    gnb1.handle
        .send(GnbMessage::AddPeer {
            gnb_id: 2,
            admission_tx: gnb2.admission_tx.clone(),
        })
        .await
        .expect("gNB task gone");
    gnb2.handle
        .send(GnbMessage::AddPeer {
            gnb_id: 1,
            admission_tx: gnb1.admission_tx.clone(),
        })
        .await
        .expect("gNB task gone");

    let config = ue_config(1);
    amf.add_subscriber(config.clone()).await;
    let mut ue = start_ue(config, 1);
    ue.register(&gnb1).await;
    ue.handle
        .send(UeMessage::EstablishSession)
        .await
        .expect("UE task gone");
    next_matching(&mut ue.events, |e| {
        matches!(e, UeStateEvent::SessionEstablished { .. })
    })
    .await;
    settle().await;

    (amf, amf_events, gnb1, gnb2, ue)
}

fn assert_session_active(status: &UeStatus) {
    assert_eq!(status.mm_state, MmState::Registered);
    let session = &status.sessions[0];
    assert_eq!(session.state, SmState::Active);
    assert!(session.user_plane.is_some());
}

#[tokio::test]
async fn test_xn_handover_with_path_switch() {
    init_test_logging();
    let (amf, mut amf_events, gnb1, gnb2, ue) = two_cell_setup().await;

    gnb1.handle
        .send(GnbMessage::XnHandover {
            pr_id: ue.pr_id,
            target_gnb_id: 2,
        })
        .await
        .expect("gNB task gone");
    next_matching(&mut amf_events, |e| {
        matches!(e, MockAmfEvent::PathSwitched { .. })
    })
    .await;
    settle().await;

    assert!(ue_binding(&gnb1, ue.pr_id).await.is_none());
    assert!(ue_binding(&gnb2, ue.pr_id).await.is_some());
    assert_session_active(&ue_status(&ue).await);

    // NAS still flows through the new cell: release the session over it.
    amf.release_session(&ue.supi, 1).await;
    next_matching(&mut amf_events, |e| {
        matches!(e, MockAmfEvent::SessionReleased { .. })
    })
    .await;
    settle().await;
    assert!(ue_status(&ue).await.sessions.is_empty());
}

#[tokio::test]
async fn test_n2_handover_via_amf() {
    init_test_logging();
    let (_amf, mut amf_events, gnb1, gnb2, ue) = two_cell_setup().await;

    gnb1.handle
        .send(GnbMessage::N2Handover {
            pr_id: ue.pr_id,
            target_gnb_id: 2,
        })
        .await
        .expect("gNB task gone");
    next_matching(&mut amf_events, |e| {
        matches!(e, MockAmfEvent::HandoverComplete { .. })
    })
    .await;
    settle().await;

    assert!(ue_binding(&gnb1, ue.pr_id).await.is_none());
    assert!(ue_binding(&gnb2, ue.pr_id).await.is_some());
    assert_session_active(&ue_status(&ue).await);
}
