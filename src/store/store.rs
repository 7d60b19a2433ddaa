//! Priority store implementation
//!
//! Thin layer over a [`Database`] that owns the key naming convention and
//! the entry read/write/initialize semantics.

use std::io;

use super::database::Database;
use super::entry::{Entry, Role, RolePriorities};
use super::error::StoreError;
use super::key::{DeviceKey, DeviceKind};

/// How a write treats the existing key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Create the key or replace its value
    Upsert,
    /// Replace an existing key; fail if it is absent
    ReplaceOnly,
}

/// Direction of a single-step rank swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    /// Move one rank towards 1
    Prefer,
    /// Move one rank away from 1
    Defer,
}

/// Persisted device entries keyed by `"<kind>:<name>"`
pub struct PriorityStore<D> {
    db: D,
}

impl<D: Database> PriorityStore<D> {
    /// Wrap an opened database
    pub fn new(db: D) -> Self {
        Self { db }
    }

    /// Borrow the underlying database
    pub fn database(&self) -> &D {
        &self.db
    }

    #[cfg(test)]
    pub(crate) fn database_mut(&mut self) -> &mut D {
        &mut self.db
    }

    /// Read and decode an entry
    ///
    /// Absent and invalid records both yield `None`.
    pub fn read(&self, key: &DeviceKey) -> Option<Entry> {
        let data = self.db.get(&key.to_bytes())?;

        match Entry::decode(&data) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(
                    key = %key,
                    error = %e,
                    "Ignoring database entry, probably due to upgrade"
                );
                None
            }
        }
    }

    /// Persist an entry
    pub fn write(
        &mut self,
        key: &DeviceKey,
        entry: &Entry,
        policy: WritePolicy,
    ) -> Result<(), StoreError> {
        let raw = key.to_bytes();

        if policy == WritePolicy::ReplaceOnly && self.read(key).is_none() {
            return Err(StoreError::NotFound(key.clone()));
        }

        self.db.set(&raw, &entry.encode(), false)?;
        Ok(())
    }

    /// Remove an entry
    ///
    /// Ranks held by the removed entry are left as gaps.
    pub fn delete(&mut self, key: &DeviceKey) -> Result<(), StoreError> {
        self.db.unset(&key.to_bytes())?;
        Ok(())
    }

    /// Fetch the entry for `key` as a base to mutate
    ///
    /// Returns `(entry, previous)`. For an unknown device the entry has an
    /// empty description and ranks one past the current maximum of every
    /// role among entries of the same kind, so newcomers rank last.
    pub fn load_or_initialize(&self, key: &DeviceKey) -> (Entry, Option<Entry>) {
        if let Some(old) = self.read(key) {
            return (old.clone(), Some(old));
        }

        let priority = self.max_priority(key.kind()).successor();
        (Entry::new("", priority), None)
    }

    /// Per-role maximum rank among entries of `kind` (zero when empty)
    pub fn max_priority(&self, kind: DeviceKind) -> RolePriorities {
        self.entries(kind)
            .iter()
            .fold(RolePriorities::default(), |max, (_, entry)| {
                max.max(&entry.priority)
            })
    }

    /// Every valid entry of `kind`, in database iteration order
    pub fn entries(&self, kind: DeviceKind) -> Vec<(DeviceKey, Entry)> {
        self.all_entries()
            .into_iter()
            .filter(|(key, _)| key.kind() == kind)
            .collect()
    }

    /// Every valid entry of either kind
    pub fn all_entries(&self) -> Vec<(DeviceKey, Entry)> {
        let mut out = Vec::new();
        let mut cursor = self.db.first();

        while let Some(raw) = cursor {
            cursor = self.db.next(&raw);

            let Some(key) = DeviceKey::from_bytes(&raw) else {
                continue;
            };
            if let Some(entry) = self.read(&key) {
                out.push((key, entry));
            }
        }

        out
    }

    /// Swap the rank of `key` in `role` with its immediate neighbour
    ///
    /// Returns `Ok(false)` when no entry holds the neighbouring rank (the
    /// device is already at the boundary), which is not an error.
    pub fn shift(&mut self, key: &DeviceKey, role: Role, shift: Shift) -> Result<bool, StoreError> {
        let mut entry = self
            .read(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        let rank = entry.priority[role];
        let target = match shift {
            Shift::Prefer => rank.checked_sub(1),
            Shift::Defer => rank.checked_add(1),
        };
        let Some(target) = target else {
            return Ok(false);
        };

        let neighbour = self
            .entries(key.kind())
            .into_iter()
            .find(|(other, e)| other != key && e.priority[role] == target);

        let Some((other_key, mut other)) = neighbour else {
            return Ok(false);
        };

        // Neighbour first: if it cannot move, the target keeps its rank too
        other.priority[role] = rank;
        self.write(&other_key, &other, WritePolicy::ReplaceOnly)
            .map_err(|e| {
                tracing::warn!(key = %other_key, error = %e, "Could not save device");
                e
            })?;

        entry.priority[role] = target;
        self.write(key, &entry, WritePolicy::ReplaceOnly)?;

        tracing::debug!(
            key = %key,
            neighbour = %other_key,
            role = %role,
            rank = target,
            "Swapped device priority"
        );

        Ok(true)
    }

    /// Flush the database to durable storage
    pub fn sync(&mut self) -> io::Result<()> {
        self.db.sync()
    }

    /// Flush and close the database
    pub fn close(&mut self) -> io::Result<()> {
        self.db.close()
    }
}
