//! Next hops and multi-client next-hop resolution.
//!
//! Routes and label entries accept contributions from several clients at
//! once. [`NextHopsMulti`] keeps one [`NextHopEntry`] per client and the
//! resolved best entry: lowest admin distance, ties broken by the lowest
//! client id.

use crate::error::{Result, StateError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use swstate_types::{AddressFamily, AdminDistance, ClientId, InterfaceId, IpAddress, Label};

/// Label operation applied when forwarding through a next hop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelAction {
    Swap(Label),
    Push(Vec<Label>),
    Pop,
    Php,
}

fn default_weight() -> u32 {
    1
}

/// One forwarding destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NextHop {
    pub addr: IpAddress,
    /// Egress interface; required for TE flows and link-local next hops
    #[serde(default)]
    pub interface: Option<InterfaceId>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub label_action: Option<LabelAction>,
}

impl NextHop {
    pub fn new(addr: IpAddress) -> Self {
        Self {
            addr,
            interface: None,
            weight: default_weight(),
            label_action: None,
        }
    }

    pub fn via(addr: IpAddress, interface: InterfaceId) -> Self {
        Self {
            interface: Some(interface),
            ..Self::new(addr)
        }
    }

    pub fn with_label_action(mut self, action: LabelAction) -> Self {
        self.label_action = Some(action);
        self
    }

    pub fn family(&self) -> AddressFamily {
        self.addr.family()
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)?;
        if let Some(intf) = self.interface {
            write!(f, "@if{}", intf)?;
        }
        if self.weight != 1 {
            write!(f, " w{}", self.weight)?;
        }
        Ok(())
    }
}

pub type NextHopSet = BTreeSet<NextHop>;

/// Checks that a next-hop set is usable for forwarding.
pub fn validate_next_hops(next_hops: &NextHopSet) -> Result<()> {
    let mut families = next_hops.iter().map(NextHop::family);
    let Some(first) = families.next() else {
        return Err(StateError::InvalidNextHops("empty next hop set".to_string()));
    };
    if families.any(|family| family != first) {
        return Err(StateError::InvalidNextHops(
            "mixed address families".to_string(),
        ));
    }
    if next_hops.iter().any(|nh| nh.weight == 0) {
        return Err(StateError::InvalidNextHops("zero weight".to_string()));
    }
    Ok(())
}

/// One client's contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopEntry {
    pub admin_distance: AdminDistance,
    pub next_hops: NextHopSet,
}

impl NextHopEntry {
    pub fn new(next_hops: NextHopSet, admin_distance: AdminDistance) -> Self {
        Self {
            admin_distance,
            next_hops,
        }
    }
}

/// The winning contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedNextHops {
    pub client: ClientId,
    pub entry: NextHopEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NextHopsMulti {
    #[serde(default)]
    clients: BTreeMap<ClientId, NextHopEntry>,
    #[serde(default)]
    resolved: Option<ResolvedNextHops>,
}

impl NextHopsMulti {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: ClientId, entry: NextHopEntry) -> Self {
        let mut multi = Self::new();
        multi.update(client, entry);
        multi
    }

    /// Replaces `client`'s contribution and re-resolves.
    pub fn update(&mut self, client: ClientId, entry: NextHopEntry) {
        self.clients.insert(client, entry);
        self.resolve();
    }

    /// Removes `client`'s contribution and re-resolves. Returns the removed
    /// entry, `None` if the client had none.
    pub fn remove(&mut self, client: ClientId) -> Option<NextHopEntry> {
        let removed = self.clients.remove(&client);
        if removed.is_some() {
            self.resolve();
        }
        removed
    }

    pub fn entry_for(&self, client: ClientId) -> Option<&NextHopEntry> {
        self.clients.get(&client)
    }

    pub fn has_client(&self, client: ClientId) -> bool {
        self.clients.contains_key(&client)
    }

    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn resolved(&self) -> Option<&ResolvedNextHops> {
        self.resolved.as_ref()
    }

    pub fn resolved_next_hops(&self) -> Option<&NextHopSet> {
        self.resolved.as_ref().map(|r| &r.entry.next_hops)
    }

    /// Best contribution: lowest admin distance, then lowest client id.
    pub fn best(&self) -> Option<(ClientId, &NextHopEntry)> {
        let mut best: Option<(ClientId, &NextHopEntry)> = None;
        // Ascending client order, so strict comparison keeps the lowest id.
        for (client, entry) in &self.clients {
            match best {
                Some((_, current)) if entry.admin_distance >= current.admin_distance => {}
                _ => best = Some((*client, entry)),
            }
        }
        best
    }

    fn resolve(&mut self) {
        self.resolved = self.best().map(|(client, entry)| ResolvedNextHops {
            client,
            entry: entry.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nhs(addrs: &[&str]) -> NextHopSet {
        addrs
            .iter()
            .map(|a| NextHop::new(a.parse().unwrap()))
            .collect()
    }

    #[test]
    fn test_validate_next_hops() {
        assert!(validate_next_hops(&nhs(&["10.0.0.1", "10.0.0.2"])).is_ok());
        assert!(matches!(
            validate_next_hops(&NextHopSet::new()),
            Err(StateError::InvalidNextHops(_))
        ));
        assert!(matches!(
            validate_next_hops(&nhs(&["10.0.0.1", "2001:db8::1"])),
            Err(StateError::InvalidNextHops(_))
        ));
    }

    #[test]
    fn test_lowest_distance_wins() {
        let mut multi = NextHopsMulti::new();
        multi.update(ClientId(2), NextHopEntry::new(nhs(&["10.0.0.2"]), AdminDistance(20)));
        multi.update(ClientId(1), NextHopEntry::new(nhs(&["10.0.0.1"]), AdminDistance(10)));

        let resolved = multi.resolved().unwrap();
        assert_eq!(resolved.client, ClientId(1));
        assert_eq!(multi.resolved_next_hops(), Some(&nhs(&["10.0.0.1"])));

        multi.remove(ClientId(1));
        assert_eq!(multi.resolved().unwrap().client, ClientId(2));

        multi.remove(ClientId(2));
        assert!(multi.is_empty());
        assert!(multi.resolved().is_none());
    }

    #[test]
    fn test_tie_breaks_on_lowest_client() {
        let mut multi = NextHopsMulti::new();
        multi.update(ClientId::OPENR, NextHopEntry::new(nhs(&["10.0.0.9"]), AdminDistance(10)));
        multi.update(ClientId::BGP, NextHopEntry::new(nhs(&["10.0.0.1"]), AdminDistance(10)));

        assert_eq!(multi.best().unwrap().0, ClientId::BGP);
    }

    #[test]
    fn test_remove_unknown_client_is_noop() {
        let mut multi = NextHopsMulti::with_client(
            ClientId(1),
            NextHopEntry::new(nhs(&["10.0.0.1"]), AdminDistance(10)),
        );
        let before = multi.clone();
        assert!(multi.remove(ClientId(5)).is_none());
        assert_eq!(multi, before);
    }

    #[test]
    fn test_serde_client_keys() {
        let multi = NextHopsMulti::with_client(
            ClientId(786),
            NextHopEntry::new(nhs(&["10.0.0.1"]), AdminDistance(10)),
        );
        let json = serde_json::to_string(&multi).unwrap();
        let back: NextHopsMulti = serde_json::from_str(&json).unwrap();
        assert_eq!(back, multi);
    }
}
