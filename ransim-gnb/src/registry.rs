//! gNB UE registry.
//!
//! Entries are stored once, keyed by RAN UE NGAP id, with secondary
//! indexes from PR id and downlink TEID. Ids and TEIDs come from
//! monotonic generators starting at 1; RAN UE NGAP ids are never
//! reused within a gNB's lifetime.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use ransim_common::{DownlinkSender, Error};

/// Lifecycle of a UE within the gNB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UeLifecycle {
    /// Admitted, Initial Context Setup not yet done
    #[default]
    Initial,
    /// Context established by the AMF
    Active,
    /// Release in progress
    Releasing,
}

/// One PDU session as the gNB sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GnbPduSession {
    /// PDU session id, 1..=16
    pub psi: u8,
    pub qfi: u8,
    /// Uplink tunnel endpoint at the UPF
    pub uplink_teid: u32,
    /// Downlink tunnel endpoint allocated by this gNB
    pub downlink_teid: u32,
    pub upf_address: IpAddr,
}

/// One UE tracked by the gNB.
#[derive(Debug)]
pub struct GnbUeEntry {
    pub ran_ue_ngap_id: i64,
    pub amf_ue_ngap_id: Option<i64>,
    /// Stable cross-gNB identity
    pub pr_id: i64,
    pub state: UeLifecycle,
    /// Sessions keyed by PSI
    pub sessions: HashMap<u8, GnbPduSession>,
    /// Bound AMF association id
    pub amf_id: i32,
    pub downlink: DownlinkSender,
    /// 5G-TMSI the UE answers paging with
    pub paging_tmsi: Option<u32>,
    /// Target gNB id while an N2 handover is being prepared
    pub handover_target: Option<u32>,
}

/// How long a paged identity stays in the cache.
pub const PAGING_EXPIRY: Duration = Duration::from_secs(1);

/// Cache of recently paged 5G-TMSIs, standing in for the radio
/// broadcast. Entries expire on a spawned timer.
#[derive(Debug, Clone, Default)]
pub struct PagedCache {
    inner: Arc<Mutex<HashSet<u32>>>,
}

impl PagedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a paged identity and schedules its expiry.
    pub async fn add(&self, tmsi: u32) {
        self.inner.lock().await.insert(tmsi);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(PAGING_EXPIRY).await;
            inner.lock().await.remove(&tmsi);
        });
    }

    pub async fn contains(&self, tmsi: u32) -> bool {
        self.inner.lock().await.contains(&tmsi)
    }
}

/// UE registry of one gNB.
#[derive(Debug)]
pub struct GnbRegistry {
    entries: HashMap<i64, GnbUeEntry>,
    by_pr_id: HashMap<i64, i64>,
    by_dl_teid: HashMap<u32, i64>,
    next_ran_ue_id: i64,
    next_teid: u32,
    pub paged: PagedCache,
}

impl Default for GnbRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GnbRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_pr_id: HashMap::new(),
            by_dl_teid: HashMap::new(),
            next_ran_ue_id: 1,
            next_teid: 1,
            paged: PagedCache::new(),
        }
    }

    /// Admits a UE: allocates a RAN UE NGAP id and binds the given AMF
    /// association. The caller selects the association beforehand.
    pub fn admit_ue(
        &mut self,
        downlink: DownlinkSender,
        pr_id: i64,
        paging_tmsi: Option<u32>,
        amf_id: i32,
    ) -> &mut GnbUeEntry {
        let ran_ue_ngap_id = self.next_ran_ue_id;
        self.next_ran_ue_id += 1;
        self.by_pr_id.insert(pr_id, ran_ue_ngap_id);
        let entry = GnbUeEntry {
            ran_ue_ngap_id,
            amf_ue_ngap_id: None,
            pr_id,
            state: UeLifecycle::Initial,
            sessions: HashMap::new(),
            amf_id,
            downlink,
            paging_tmsi,
            handover_target: None,
        };
        debug!(ran_ue_ngap_id, pr_id, amf_id, "UE admitted");
        self.entries.entry(ran_ue_ngap_id).or_insert(entry)
    }

    /// Allocates a downlink TEID and indexes it for the given UE.
    pub fn allocate_teid(&mut self, ran_ue_ngap_id: i64) -> u32 {
        let teid = self.next_teid;
        self.next_teid += 1;
        self.by_dl_teid.insert(teid, ran_ue_ngap_id);
        teid
    }

    pub fn get(&self, ran_ue_ngap_id: i64) -> Result<&GnbUeEntry, Error> {
        self.entries
            .get(&ran_ue_ngap_id)
            .ok_or_else(|| Error::unknown_ue(ran_ue_ngap_id))
    }

    pub fn get_mut(&mut self, ran_ue_ngap_id: i64) -> Result<&mut GnbUeEntry, Error> {
        self.entries
            .get_mut(&ran_ue_ngap_id)
            .ok_or_else(|| Error::unknown_ue(ran_ue_ngap_id))
    }

    pub fn find_by_pr_id(&self, pr_id: i64) -> Option<&GnbUeEntry> {
        self.by_pr_id
            .get(&pr_id)
            .and_then(|id| self.entries.get(id))
    }

    pub fn find_by_pr_id_mut(&mut self, pr_id: i64) -> Option<&mut GnbUeEntry> {
        let id = *self.by_pr_id.get(&pr_id)?;
        self.entries.get_mut(&id)
    }

    pub fn find_by_amf_ue_id(&self, amf_ue_ngap_id: i64) -> Option<&GnbUeEntry> {
        self.entries
            .values()
            .find(|e| e.amf_ue_ngap_id == Some(amf_ue_ngap_id))
    }

    pub fn find_by_dl_teid(&self, teid: u32) -> Option<&GnbUeEntry> {
        self.by_dl_teid
            .get(&teid)
            .and_then(|id| self.entries.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &GnbUeEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes a UE from every index and returns the entry. The caller
    /// closes the downlink sender; the registry never holds the lock.
    pub fn remove(&mut self, ran_ue_ngap_id: i64) -> Result<GnbUeEntry, Error> {
        let entry = self
            .entries
            .remove(&ran_ue_ngap_id)
            .ok_or_else(|| Error::unknown_ue(ran_ue_ngap_id))?;
        self.by_pr_id.remove(&entry.pr_id);
        self.by_dl_teid
            .retain(|_, ue| *ue != ran_ue_ngap_id);
        Ok(entry)
    }

    /// Best-effort rebind of every UE bound to `old_amf_id` onto
    /// `backup_amf_id`, used on AMF failover. Returns the number of UEs
    /// moved. A UE mid-handover may be re-pointed as well; that race is
    /// accepted.
    pub fn rebind_ues_from_association(&mut self, old_amf_id: i32, backup_amf_id: i32) -> usize {
        let mut moved = 0;
        for entry in self.entries.values_mut() {
            if entry.amf_id == old_amf_id {
                entry.amf_id = backup_amf_id;
                moved += 1;
            }
        }
        debug!(old_amf_id, backup_amf_id, moved, "UEs rebound after failover");
        moved
    }
}
