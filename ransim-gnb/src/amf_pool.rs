//! AMF association pool.
//!
//! Each AMF the gNB dials gets an association entry tracking its NG
//! Setup state, served GUAMIs, supported PLMNs and the TNLA weight
//! factor that drives selection. Associations are created on NG Setup
//! success or a Configuration Update "add", refreshed on "update"
//! (matched by endpoint address), and removed on "remove" or a Status
//! Indication failover.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tracing::debug;

use ransim_common::{Error, Guami, Plmn, Snssai};
use ransim_ngap::procedures::ng_setup::NgSetupResponse;
use ransim_ngap::NgapPdu;

/// Association state. Only Active associations take new UEs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmfAssociationState {
    /// Dialled but NG Setup not yet completed, or setup failed
    #[default]
    Inactive,
    /// NG Setup complete, ready for UE-associated signalling
    Active,
    /// Overload indicated; existing UEs stay, no new admissions
    Overloaded,
}

/// One AMF association.
#[derive(Debug)]
pub struct AmfAssociation {
    pub id: i32,
    pub address: SocketAddr,
    pub state: AmfAssociationState,
    pub name: Option<String>,
    /// Relative AMF capacity from the NG Setup Response
    pub relative_capacity: u8,
    /// TNLA weight factor; selection prefers the highest
    pub tnla_weight: u8,
    pub served_guamis: Vec<Guami>,
    pub backup_amf_name: Option<String>,
    pub plmns: Vec<Plmn>,
    pub slices: Vec<Snssai>,
    /// Outbound NGAP link towards this AMF
    pub link: mpsc::Sender<NgapPdu>,
}

impl AmfAssociation {
    pub fn is_active(&self) -> bool {
        self.state == AmfAssociationState::Active
    }

    /// Applies an NG Setup Response, activating the association.
    pub fn on_setup_response(&mut self, resp: &NgSetupResponse) {
        self.name = Some(resp.amf_name.clone());
        self.relative_capacity = resp.relative_amf_capacity;
        self.served_guamis = resp.served_guami_list.iter().map(|g| g.guami).collect();
        self.backup_amf_name = resp
            .served_guami_list
            .iter()
            .find_map(|g| g.backup_amf_name.clone());
        self.plmns = resp.plmn_support_list.iter().map(|p| p.plmn).collect();
        self.slices = resp
            .plmn_support_list
            .iter()
            .flat_map(|p| p.slices.iter().copied())
            .collect();
        self.state = AmfAssociationState::Active;
    }

    pub fn serves_guami(&self, guami: &Guami) -> bool {
        self.served_guamis.contains(guami)
    }
}

/// Pool of AMF associations keyed by internal id.
#[derive(Debug, Default)]
pub struct AmfPool {
    associations: HashMap<i32, AmfAssociation>,
    next_id: i32,
}

impl AmfPool {
    pub fn new() -> Self {
        Self {
            associations: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a new association in Inactive state and returns its id.
    pub fn add(&mut self, address: SocketAddr, weight: u8, link: mpsc::Sender<NgapPdu>) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        self.associations.insert(
            id,
            AmfAssociation {
                id,
                address,
                state: AmfAssociationState::Inactive,
                name: None,
                relative_capacity: 0,
                tnla_weight: weight,
                served_guamis: Vec::new(),
                backup_amf_name: None,
                plmns: Vec::new(),
                slices: Vec::new(),
                link,
            },
        );
        debug!(amf_id = id, %address, "AMF association registered");
        id
    }

    pub fn get(&self, id: i32) -> Option<&AmfAssociation> {
        self.associations.get(&id)
    }

    pub fn get_mut(&mut self, id: i32) -> Option<&mut AmfAssociation> {
        self.associations.get_mut(&id)
    }

    pub fn remove(&mut self, id: i32) -> Option<AmfAssociation> {
        self.associations.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AmfAssociation> {
        self.associations.values()
    }

    /// Selects the association for a new UE: Active only, highest TNLA
    /// weight factor, capacity as tiebreaker.
    pub fn select(&self) -> Result<&AmfAssociation, Error> {
        self.associations
            .values()
            .filter(|a| a.is_active())
            .max_by_key(|a| (a.tnla_weight, a.relative_capacity))
            .ok_or_else(|| Error::ResourceExhaustion("no Active AMF association".into()))
    }

    pub fn find_by_address(&mut self, address: SocketAddr) -> Option<&mut AmfAssociation> {
        self.associations
            .values_mut()
            .find(|a| a.address == address)
    }

    pub fn find_by_guami(&self, guami: &Guami) -> Option<&AmfAssociation> {
        self.associations.values().find(|a| a.serves_guami(guami))
    }

    /// Looks up the Active association carrying the given AMF name,
    /// used to resolve a backup AMF during failover.
    pub fn find_by_name(&self, name: &str) -> Option<&AmfAssociation> {
        self.associations
            .values()
            .find(|a| a.is_active() && a.name.as_deref() == Some(name))
    }
}
