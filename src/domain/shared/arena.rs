//! Fixed-capacity slot arena
//!
//! Both context pools are small, fixed-size and searched linearly. Handles
//! carry the slot generation so a handle kept past `remove` can never reach
//! whatever later reuses the slot.

use std::fmt;

/// Stable reference to an occupied arena slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: u32,
}

impl Handle {
    /// Zero-based slot position
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                value: None,
            })
            .collect();
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.value.is_none())
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.value.is_some())
    }

    /// Stores `value` in the lowest free slot, or gives it back if the pool is full
    pub fn insert(&mut self, value: T) -> std::result::Result<Handle, T> {
        let Some(index) = self.slots.iter().position(|s| s.value.is_none()) else {
            return Err(value);
        };
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        Ok(Handle {
            index,
            generation: slot.generation,
        })
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Empties the slot and invalidates every outstanding handle to it
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self
            .slots
            .get_mut(handle.index)
            .filter(|s| s.generation == handle.generation)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        Some(value)
    }

    /// First occupied slot matching `pred`, in slot order
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<Handle> {
        self.iter().find(|(_, v)| pred(v)).map(|(h, _)| h)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, s)| {
            s.value.as_ref().map(|v| {
                (
                    Handle {
                        index,
                        generation: s.generation,
                    },
                    v,
                )
            })
        })
    }

    pub(crate) fn handles(&self) -> Vec<Handle> {
        self.iter().map(|(h, _)| h).collect()
    }
}
