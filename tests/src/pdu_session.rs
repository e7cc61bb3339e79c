//! PDU session scenarios: end-to-end establishment with user plane,
//! network-initiated release, and the reject backoff cap.

use ransim_ue::{MmState, SmState, UeMessage, UeStateEvent};

use crate::mock_amf::{MockAmfConfig, MockAmfEvent};
use crate::test_fixtures::ue_config;
use crate::test_utils::{
    bring_up, init_test_logging, next_matching, settle, start_ue, ue_status,
};

#[tokio::test]
async fn test_session_establishment_end_to_end() {
    init_test_logging();
    let (amf, mut amf_events, gnb) = bring_up(MockAmfConfig::default()).await;

    let config = ue_config(1);
    amf.add_subscriber(config.clone()).await;
    let mut ue = start_ue(config, 1);
    ue.register(&gnb).await;

    ue.handle
        .send(UeMessage::EstablishSession)
        .await
        .expect("UE task gone");
    let established = next_matching(&mut ue.events, |e| {
        matches!(e, UeStateEvent::SessionEstablished { .. })
    })
    .await;
    let UeStateEvent::SessionEstablished {
        pdu_session_id,
        ue_address,
        qfi,
    } = established
    else {
        unreachable!()
    };
    assert_eq!(pdu_session_id, 1);
    assert_eq!(qfi, 1);
    assert_eq!(ue_address.octets()[0..2], [10, 45]);

    next_matching(&mut amf_events, |e| {
        matches!(
            e,
            MockAmfEvent::SessionSetupComplete {
                pdu_session_id: 1,
                ..
            }
        )
    })
    .await;
    settle().await;

    let status = ue_status(&ue).await;
    assert_eq!(status.mm_state, MmState::Registered);
    let session = &status.sessions[0];
    assert_eq!(session.state, SmState::Active);
    assert_eq!(session.ue_address, Some(ue_address));
    assert!(session.user_plane.is_some());
}

#[tokio::test]
async fn test_network_initiated_session_release() {
    init_test_logging();
    let (amf, mut amf_events, gnb) = bring_up(MockAmfConfig::default()).await;

    let config = ue_config(1);
    amf.add_subscriber(config.clone()).await;
    let mut ue = start_ue(config, 1);
    ue.register(&gnb).await;

    ue.handle
        .send(UeMessage::EstablishSession)
        .await
        .expect("UE task gone");
    next_matching(&mut ue.events, |e| {
        matches!(e, UeStateEvent::SessionEstablished { .. })
    })
    .await;
    settle().await;

    amf.release_session(&ue.supi, 1).await;
    next_matching(&mut amf_events, |e| {
        matches!(
            e,
            MockAmfEvent::SessionReleased {
                pdu_session_id: 1,
                ..
            }
        )
    })
    .await;
    settle().await;

    let status = ue_status(&ue).await;
    assert_eq!(status.mm_state, MmState::Registered);
    assert!(status.sessions.is_empty());
}

// Paused clock: the exponential backoff between rejected attempts is
// minutes of virtual time.
#[tokio::test(start_paused = true)]
async fn test_session_reject_backoff_and_abandon() {
    init_test_logging();
    let (amf, _amf_events, gnb) = bring_up(MockAmfConfig {
        reject_sessions_with: Some(26),
        ..Default::default()
    })
    .await;

    let config = ue_config(1);
    amf.add_subscriber(config.clone()).await;
    let mut ue = start_ue(config, 1);
    ue.register(&gnb).await;

    ue.handle
        .send(UeMessage::EstablishSession)
        .await
        .expect("UE task gone");

    // No timeout wrapper here; the waits between retries outrun any
    // real-time bound and the paused clock skips through them.
    let abandoned = loop {
        match ue.events.recv().await.expect("event channel closed") {
            UeStateEvent::SessionAbandoned {
                pdu_session_id,
                cause,
            } => break (pdu_session_id, cause),
            _ => {}
        }
    };
    assert_eq!(abandoned, (1, 26));

    let status = ue_status(&ue).await;
    assert_eq!(status.mm_state, MmState::Registered);
    assert!(status.sessions.is_empty());
}
