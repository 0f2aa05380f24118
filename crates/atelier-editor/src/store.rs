//! Content Record Store.
//!
//! Holds the record under edit and applies mutations as whole-value
//! replacements: every applied mutation builds a new [`ContentRecord`] behind
//! a fresh `Arc`, so a snapshot handed out earlier never changes underneath
//! its holder.
//!
//! Array elements carry [`SlotToken`]s minted here. Asynchronous writers
//! (upload resolution) address elements by token, which keeps them pointed
//! at the right element when other elements are inserted or removed.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use atelier_core::{ContentRecord, Error, Result, SlotToken};

/// A record mutation, addressed to one record key by [`ContentStore::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Replace the value.
    Set(Value),
    /// Push an element onto an array (absent key starts from `[]`).
    Append(Value),
    /// Remove the element at an index.
    RemoveAt(usize),
    /// Replace the element at an index.
    SetAt(usize, Value),
    /// Replace the element identified by a slot token.
    SetSlot(SlotToken, Value),
    /// Set one member of the struct element at an index.
    UpdateField {
        index: usize,
        field: String,
        value: Value,
    },
    /// Add an id to an id list if absent, remove it if present.
    Toggle(String),
    /// Set one member of a nested group.
    SetField { field: String, value: Value },
}

impl Mutation {
    fn name(&self) -> &'static str {
        match self {
            Mutation::Set(_) => "set",
            Mutation::Append(_) => "append",
            Mutation::RemoveAt(_) => "remove_at",
            Mutation::SetAt(..) => "set_at",
            Mutation::SetSlot(..) => "set_slot",
            Mutation::UpdateField { .. } => "update_field",
            Mutation::Toggle(_) => "toggle",
            Mutation::SetField { .. } => "set_field",
        }
    }
}

/// Result of [`ContentStore::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The mutation produced this new record, now current.
    Applied(Arc<ContentRecord>),
    /// The addressed element no longer exists; nothing changed.
    Skipped(String),
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied(_))
    }
}

/// Holder of the record under edit.
#[derive(Debug, Default)]
pub struct ContentStore {
    record: Arc<ContentRecord>,
    slots: HashMap<String, Vec<SlotToken>>,
    next_slot: u64,
    epoch: u64,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record wholesale and start a new epoch.
    ///
    /// Every array value gets fresh slot tokens, so tokens handed out for the
    /// previous record never match again.
    pub fn load(&mut self, initial: ContentRecord) -> u64 {
        self.slots.clear();
        let arrays: Vec<(String, usize)> = initial
            .iter()
            .filter_map(|(k, v)| v.as_array().map(|items| (k.clone(), items.len())))
            .collect();
        for (key, len) in arrays {
            let tokens = self.mint(len);
            self.slots.insert(key, tokens);
        }
        self.record = Arc::new(initial);
        self.epoch += 1;
        debug!(epoch = self.epoch, keys = self.record.len(), "Store loaded");
        self.epoch
    }

    /// Current record. Cheap; later mutations do not affect the returned value.
    pub fn snapshot(&self) -> Arc<ContentRecord> {
        Arc::clone(&self.record)
    }

    /// Load generation; bumped by every [`load`](Self::load).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Slot token of the element at `index` of the array under `key`.
    pub fn slot_at(&self, key: &str, index: usize) -> Option<SlotToken> {
        self.slots.get(key).and_then(|tokens| tokens.get(index)).copied()
    }

    /// Current index of the element identified by `token`.
    pub fn index_of(&self, key: &str, token: SlotToken) -> Option<usize> {
        self.slots.get(key)?.iter().position(|t| *t == token)
    }

    /// Slot tokens of the array under `key`, in element order.
    pub fn slots(&self, key: &str) -> &[SlotToken] {
        self.slots.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Apply one mutation to the value under `key`.
    ///
    /// Index-addressed mutations whose element is gone are skipped and
    /// logged. Array mutations on a non-array value, struct updates on a
    /// non-object element and group updates on a non-object value are errors.
    pub fn apply(&mut self, key: &str, mutation: Mutation) -> Result<MutationOutcome> {
        let op = mutation.name();
        let mut next = (*self.record).clone();

        match mutation {
            Mutation::Set(value) => {
                let array_len = value.as_array().map(Vec::len);
                next.insert(key, value);
                match array_len {
                    Some(len) => {
                        let tokens = self.mint(len);
                        self.slots.insert(key.to_string(), tokens);
                    }
                    None => {
                        self.slots.remove(key);
                    }
                }
            }
            Mutation::Append(item) => {
                let mut items = self.array_at(key)?;
                items.push(item);
                let token = self.mint_one();
                self.slots_mut(key, items.len() - 1).push(token);
                next.insert(key, Value::Array(items));
            }
            Mutation::RemoveAt(index) => {
                let mut items = self.array_at(key)?;
                if index >= items.len() {
                    return Ok(self.skip(key, op, out_of_bounds(index, items.len())));
                }
                items.remove(index);
                self.slots_mut(key, items.len() + 1).remove(index);
                next.insert(key, Value::Array(items));
            }
            Mutation::SetAt(index, value) => {
                let mut items = self.array_at(key)?;
                if index >= items.len() {
                    return Ok(self.skip(key, op, out_of_bounds(index, items.len())));
                }
                items[index] = value;
                next.insert(key, Value::Array(items));
            }
            Mutation::SetSlot(token, value) => {
                let mut items = self.array_at(key)?;
                let Some(index) = self.index_of(key, token) else {
                    return Ok(self.skip(key, op, format!("{} no longer exists", token)));
                };
                if index >= items.len() {
                    return Ok(self.skip(key, op, out_of_bounds(index, items.len())));
                }
                items[index] = value;
                next.insert(key, Value::Array(items));
            }
            Mutation::UpdateField {
                index,
                field,
                value,
            } => {
                let mut items = self.array_at(key)?;
                if index >= items.len() {
                    return Ok(self.skip(key, op, out_of_bounds(index, items.len())));
                }
                match &mut items[index] {
                    Value::Object(item) => {
                        item.insert(field, value);
                    }
                    other => {
                        return Err(Error::InvalidInput(format!(
                            "element {} of '{}' is not a struct ({})",
                            index, key, other
                        )))
                    }
                }
                next.insert(key, Value::Array(items));
            }
            Mutation::Toggle(id) => {
                let mut items = self.array_at(key)?;
                let len = items.len();
                match items.iter().position(|v| v.as_str() == Some(id.as_str())) {
                    Some(index) => {
                        items.remove(index);
                        self.slots_mut(key, len).remove(index);
                    }
                    None => {
                        items.push(Value::String(id));
                        let token = self.mint_one();
                        self.slots_mut(key, len).push(token);
                    }
                }
                next.insert(key, Value::Array(items));
            }
            Mutation::SetField { field, value } => {
                let mut group = match next.get(key) {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(map)) => map.clone(),
                    Some(other) => {
                        return Err(Error::InvalidInput(format!(
                            "'{}' holds {}, not a group",
                            key, other
                        )))
                    }
                };
                group.insert(field, value);
                next.insert(key, Value::Object(group));
            }
        }

        self.record = Arc::new(next);
        debug!(field_key = key, op, "Mutation applied");
        Ok(MutationOutcome::Applied(self.snapshot()))
    }

    fn skip(&self, key: &str, op: &str, reason: String) -> MutationOutcome {
        warn!(field_key = key, op, reason = %reason, "Mutation skipped");
        MutationOutcome::Skipped(reason)
    }

    /// Current elements of the array under `key`; absent or null is `[]`.
    fn array_at(&self, key: &str) -> Result<Vec<Value>> {
        match self.record.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(Error::InvalidInput(format!(
                "'{}' holds {}, not a list",
                key, other
            ))),
        }
    }

    /// Slot tokens for `key`, re-minted if they drifted from `len`.
    fn slots_mut(&mut self, key: &str, len: usize) -> &mut Vec<SlotToken> {
        let drifted = self.slots.get(key).map(Vec::len) != Some(len);
        if drifted {
            let tokens = self.mint(len);
            self.slots.insert(key.to_string(), tokens);
        }
        self.slots.entry(key.to_string()).or_default()
    }

    fn mint_one(&mut self) -> SlotToken {
        self.next_slot += 1;
        SlotToken(self.next_slot)
    }

    fn mint(&mut self, len: usize) -> Vec<SlotToken> {
        (0..len).map(|_| self.mint_one()).collect()
    }
}

fn out_of_bounds(index: usize, len: usize) -> String {
    format!("index {} out of bounds (len {})", index, len)
}
