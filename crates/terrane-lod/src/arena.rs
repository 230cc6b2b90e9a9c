//! Generational slot storage for quadtree nodes.
//!
//! Parent and child links are [`NodeId`]s rather than references. Removing a
//! node bumps its slot's epoch, so any id captured by an in-flight request
//! stops resolving the moment the node is disposed, even if the slot is
//! reused for a new node.

use std::fmt;

/// Stable handle to a node: slot index plus the slot's epoch at insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    epoch: u32,
}

impl NodeId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Pack into a `u64` correlation key.
    pub fn to_bits(self) -> u64 {
        (u64::from(self.epoch) << 32) | u64::from(self.index)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            epoch: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.epoch)
    }
}

struct Slot<T> {
    epoch: u32,
    value: Option<T>,
}

/// Slot arena handing out [`NodeId`]s.
pub struct NodeArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value built from its own id.
    pub fn insert_with(&mut self, build: impl FnOnce(NodeId) -> T) -> NodeId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    epoch: 0,
                    value: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = NodeId {
            index,
            epoch: slot.epoch,
        };
        slot.value = Some(build(id));
        self.len += 1;
        id
    }

    pub fn insert(&mut self, value: T) -> NodeId {
        self.insert_with(|_| value)
    }

    /// Remove the value for `id` and retire the id. Stale ids return `None`.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.epoch != id.epoch {
            return None;
        }
        let value = slot.value.take()?;
        slot.epoch = slot.epoch.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.epoch == id.epoch)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.epoch == id.epoch)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    NodeId {
                        index: index as u32,
                        epoch: slot.epoch,
                    },
                    value,
                )
            })
        })
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.iter().map(|(id, _)| id).collect()
    }
}
