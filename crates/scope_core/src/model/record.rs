//! Shared record handles and ordered entity collections.
//!
//! # Responsibility
//! - Give views stable handles to records that stay valid across in-place merges.
//! - Keep write access to records inside the crate (stores and reconciler).
//!
//! # Invariants
//! - Cloning a `Record` aliases the same record; cloning a `Collection`
//!   copies values into fresh records so two owners never share storage.
//! - Identifiers are unique within a collection once assigned.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

/// Domain record that can live in a reconciled collection.
///
/// Implementors are tagged records: every wire field is enumerated in
/// `merge_from`, so partial responses merge without reflection.
pub trait Entity: Clone + Debug {
    /// Entity tag used for provisional identifiers and log lines.
    const KIND: &'static str;

    fn id(&self) -> Option<&str>;

    fn id_slot(&mut self) -> &mut Option<String>;

    /// Optimistic-concurrency revision echoed by the backend.
    fn rev(&self) -> Option<u64>;

    fn rev_slot(&mut self) -> &mut Option<u64>;

    /// Prefix for client-synthesized identifiers.
    fn provisional_tag(&self) -> String {
        Self::KIND.to_string()
    }

    /// Overwrites every field present on `incoming`; absent fields are kept.
    fn merge_from(&mut self, incoming: &Self);
}

/// Overwrites `slot` when `incoming` carries a value.
pub(crate) fn merge_field<V: Clone>(slot: &mut Option<V>, incoming: &Option<V>) {
    if let Some(value) = incoming {
        *slot = Some(value.clone());
    }
}

/// Shared, read-only handle to one record owned by a store.
pub struct Record<T>(Rc<RefCell<T>>);

impl<T> Clone for Record<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Debug> Debug for Record<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.borrow().fmt(f)
    }
}

impl<T> Record<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Borrows the current field values.
    ///
    /// Do not hold the borrow across an `.await`; the owning store may merge
    /// into this record when a remote call settles.
    pub fn get(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Whether both handles point at the same record.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn update<R>(&self, mutate: impl FnOnce(&mut T) -> R) -> R {
        mutate(&mut self.0.borrow_mut())
    }
}

impl<T: Clone> Record<T> {
    /// Copies the current field values out of the record.
    pub fn snapshot(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T: Entity> Record<T> {
    pub fn id(&self) -> Option<String> {
        self.0.borrow().id().map(str::to_string)
    }
}

/// Ordered sequence of records keyed by the entity identifier.
pub struct Collection<T> {
    records: Vec<Record<T>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: Clone> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            records: self
                .records
                .iter()
                .map(|record| Record::new(record.snapshot()))
                .collect(),
        }
    }
}

impl<T: Debug> Debug for Collection<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.records.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for Collection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.records.len() == other.records.len()
            && self
                .records
                .iter()
                .zip(other.records.iter())
                .all(|(left, right)| *left.get() == *right.get())
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            records: values.into_iter().map(Record::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record<T>> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record<T>] {
        &self.records
    }

    pub(crate) fn push(&mut self, record: Record<T>) {
        self.records.push(record);
    }
}

impl<T: Clone> Collection<T> {
    /// Copies every record's current values, preserving order.
    pub fn values(&self) -> Vec<T> {
        self.records.iter().map(Record::snapshot).collect()
    }
}

impl<T: Entity> Collection<T> {
    /// Finds the record carrying identifier `id`.
    pub fn find(&self, id: &str) -> Option<&Record<T>> {
        self.records
            .iter()
            .find(|record| record.get().id() == Some(id))
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Takes the contents and order of `incoming`, merging into records that
    /// share an identifier so their handles stay live.
    pub(crate) fn sync_from(&mut self, incoming: &Collection<T>) {
        let records = incoming
            .records
            .iter()
            .map(|record| {
                let value = record.snapshot();
                match value.id().and_then(|id| self.find(id)).cloned() {
                    Some(existing) => {
                        existing.update(|current| current.merge_from(&value));
                        existing
                    }
                    None => Record::new(value),
                }
            })
            .collect();
        self.records = records;
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.iter().map(|record| &*record.0))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Collection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<T>::deserialize(deserializer)?;
        Ok(Self::from_values(values))
    }
}
