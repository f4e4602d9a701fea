//! Table operations shared by entries that resolve next hops from several
//! clients.

use crate::error::{Result, StateError};
use crate::node::{Frozen, NodeKey, NodeMap, StateEntity};
use crate::scope::{HasScope, ScopeResolver};
use crate::state::{LabelForwardingEntry, NextHopEntry, NextHopsMulti, Route};
use crate::debug_log;
use swstate_types::ClientId;

/// An entry carrying a [`NextHopsMulti`].
pub trait MultiClientEntry: StateEntity + HasScope {
    fn next_hops_multi(&self) -> &NextHopsMulti;
    fn next_hops_multi_mut(&mut self) -> &mut NextHopsMulti;
}

impl MultiClientEntry for LabelForwardingEntry {
    fn next_hops_multi(&self) -> &NextHopsMulti {
        &self.next_hops_multi
    }

    fn next_hops_multi_mut(&mut self) -> &mut NextHopsMulti {
        &mut self.next_hops_multi
    }
}

impl MultiClientEntry for Route {
    fn next_hops_multi(&self) -> &NextHopsMulti {
        &self.next_hops_multi
    }

    fn next_hops_multi_mut(&mut self) -> &mut NextHopsMulti {
        &mut self.next_hops_multi
    }
}

/// Installs `client`'s contribution under `key`, creating the entry with
/// `create` when absent. The entry is reinstalled at its resolved scope.
pub(crate) fn program_entry<K, V, F>(
    table: &mut NodeMap<K, V>,
    resolver: &ScopeResolver,
    key: K,
    client: ClientId,
    entry: NextHopEntry,
    create: F,
) -> Result<()>
where
    K: NodeKey,
    V: MultiClientEntry,
    F: FnOnce(ClientId, NextHopEntry) -> V,
{
    match table.get(&key) {
        Some(existing) => {
            let mut draft = existing.modify();
            draft.next_hops_multi_mut().update(client, entry);
            let scope = resolver.scope(&*draft)?;
            table.update(key, draft.freeze(), scope)
        }
        None => {
            let node = create(client, entry);
            let scope = resolver.scope(&node)?;
            table.add(key, Frozen::new(node), scope)
        }
    }
}

/// Removes `client`'s contribution from `key`, deleting the entry when no
/// contribution is left.
pub(crate) fn unprogram_entry<K, V>(
    table: &mut NodeMap<K, V>,
    key: &K,
    client: ClientId,
    missing: impl FnOnce() -> StateError,
) -> Result<()>
where
    K: NodeKey,
    V: MultiClientEntry,
{
    let existing = table.get(key).ok_or_else(missing)?;
    if !existing.next_hops_multi().has_client(client) {
        return Err(StateError::ClientNotFound {
            client,
            entry: key.to_string(),
        });
    }

    let emptied = table.modify_entry(key, |node| {
        node.next_hops_multi_mut().remove(client);
        Ok(node.next_hops_multi().is_empty())
    })?;
    if emptied {
        table.remove(key)?;
    }
    Ok(())
}

/// Strips `client` from every entry of `table`. Returns the number of
/// entries touched.
pub(crate) fn purge_client<K, V>(table: &mut NodeMap<K, V>, client: ClientId) -> usize
where
    K: NodeKey,
    V: MultiClientEntry,
{
    let keys: Vec<K> = table
        .iter()
        .filter(|(_, scoped)| scoped.node.next_hops_multi().has_client(client))
        .map(|(key, _)| key.clone())
        .collect();

    let mut touched = 0;
    for key in keys {
        let emptied = match table.modify_entry(&key, |node| {
            node.next_hops_multi_mut().remove(client);
            Ok(node.next_hops_multi().is_empty())
        }) {
            Ok(emptied) => emptied,
            Err(_) => {
                debug_log!("Fib", entry = %key, kind = V::KIND, "Entry vanished during purge");
                continue;
            }
        };
        if emptied {
            table.remove_if_present(&key);
        }
        touched += 1;
    }
    touched
}
