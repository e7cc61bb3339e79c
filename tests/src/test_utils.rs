//! Actor startup and synchronisation helpers shared by the scenarios.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use ransim_common::{AdmissionRequest, GnbConfig, Task, TaskHandle, UeConfig};
use ransim_gnb::{GnbMessage, GnbTask};
use ransim_ue::{MmState, UeMessage, UeStateEvent, UeStatus, UeTask};

use crate::mock_amf::{MockAmf, MockAmfConfig, MockAmfEvent};
use crate::test_fixtures::{amf_address, gnb_config};

/// Upper bound for any single wait in a scenario.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialises tracing for a test binary. Safe to call from every test;
/// only the first call installs the subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Receives from the channel until `pred` matches, panicking on timeout
/// or channel closure.
pub async fn next_matching<T: std::fmt::Debug>(
    rx: &mut mpsc::Receiver<T>,
    pred: impl Fn(&T) -> bool,
) -> T {
    let wait = async {
        loop {
            let item = rx.recv().await.expect("event channel closed");
            if pred(&item) {
                return item;
            }
        }
    };
    match tokio::time::timeout(DEFAULT_TEST_TIMEOUT, wait).await {
        Ok(item) => item,
        Err(_) => panic!("timed out waiting for a matching event"),
    }
}

/// A running gNB actor.
pub struct GnbUnderTest {
    pub handle: TaskHandle<GnbMessage>,
    pub admission_tx: mpsc::Sender<AdmissionRequest>,
    pub gnb_id: u32,
}

/// Spawns a gNB actor from the given configuration.
pub fn start_gnb(config: GnbConfig) -> GnbUnderTest {
    let gnb_id = config.gnb_id;
    let (mut task, rx, handle, admission_tx) = GnbTask::new(config);
    tokio::spawn(async move { task.run(rx).await });
    GnbUnderTest {
        handle,
        admission_tx,
        gnb_id,
    }
}

/// A running UE actor with its state-event stream.
pub struct UeUnderTest {
    pub handle: TaskHandle<UeMessage>,
    pub events: mpsc::Receiver<UeStateEvent>,
    pub pr_id: i64,
    pub supi: String,
}

/// Spawns a UE actor from the given configuration.
pub fn start_ue(config: UeConfig, pr_id: i64) -> UeUnderTest {
    let supi = config.supi();
    let (mut task, rx, handle, events) = UeTask::new(config, pr_id).expect("bad UE fixture");
    tokio::spawn(async move { task.run(rx).await });
    UeUnderTest {
        handle,
        events,
        pr_id,
        supi,
    }
}

impl UeUnderTest {
    /// Registers through the given gNB and waits for 5GMM-REGISTERED.
    pub async fn register(&mut self, gnb: &GnbUnderTest) {
        self.handle
            .send(UeMessage::Register {
                admission_tx: gnb.admission_tx.clone(),
            })
            .await
            .expect("UE task gone");
        self.wait_mm(MmState::Registered).await;
    }

    /// Waits for a 5GMM transition into `state`.
    pub async fn wait_mm(&mut self, state: MmState) {
        next_matching(&mut self.events, |e| {
            matches!(e, UeStateEvent::MmTransition { to, .. } if *to == state)
        })
        .await;
    }
}

/// Snapshot of a UE's state via its control channel.
pub async fn ue_status(ue: &UeUnderTest) -> UeStatus {
    let (tx, rx) = oneshot::channel();
    ue.handle
        .send(UeMessage::Status { reply: tx })
        .await
        .expect("UE task gone");
    rx.await.expect("UE task gone")
}

/// (RAN UE NGAP id, AMF association id) the gNB holds for a PR id.
pub async fn ue_binding(gnb: &GnbUnderTest, pr_id: i64) -> Option<(i64, i32)> {
    let (tx, rx) = oneshot::channel();
    gnb.handle
        .send(GnbMessage::UeBinding { pr_id, reply: tx })
        .await
        .expect("gNB task gone");
    rx.await.expect("gNB task gone")
}

/// Lets in-flight channel traffic drain before the next assertion. The
/// paused-clock runtimes advance through this instantly.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// One mock AMF and one gNB with the NG Setup exchange completed, the
/// common starting point of most scenarios.
pub async fn bring_up(
    config: MockAmfConfig,
) -> (MockAmf, mpsc::Receiver<MockAmfEvent>, GnbUnderTest) {
    let (amf, mut amf_events) = MockAmf::start(config);
    let gnb = start_gnb(gnb_config(1));
    amf.attach(&gnb.handle, amf_address(1), 100).await;
    next_matching(&mut amf_events, |e| {
        matches!(e, MockAmfEvent::NgSetupRequested { accepted: true, .. })
    })
    .await;
    settle().await;
    (amf, amf_events, gnb)
}
