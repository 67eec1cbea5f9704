//! Generational Arena
//!
//! Slot map handing out `(index, generation)` handles. Removing an item bumps
//! the slot's generation, so handles to freed items stop resolving instead of
//! aliasing whatever reuses the slot.

/// Generational index for safe references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenIndex {
    pub index: u32,
    pub generation: u32,
}

/// Generational arena (slot map)
#[derive(Debug)]
pub struct GenArena<T> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> GenArena<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Insert item
    pub fn insert(&mut self, value: T) -> GenIndex {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            self.items[index as usize] = Some(value);
            GenIndex { index, generation: self.generations[index as usize] }
        } else {
            let index = self.items.len() as u32;
            self.items.push(Some(value));
            self.generations.push(0);
            GenIndex { index, generation: 0 }
        }
    }

    /// Get item
    pub fn get(&self, idx: GenIndex) -> Option<&T> {
        if *self.generations.get(idx.index as usize)? != idx.generation {
            return None;
        }
        self.items[idx.index as usize].as_ref()
    }

    /// Get item mutably
    pub fn get_mut(&mut self, idx: GenIndex) -> Option<&mut T> {
        if *self.generations.get(idx.index as usize)? != idx.generation {
            return None;
        }
        self.items[idx.index as usize].as_mut()
    }

    #[inline]
    pub fn contains(&self, idx: GenIndex) -> bool {
        self.get(idx).is_some()
    }

    /// Remove item
    pub fn remove(&mut self, idx: GenIndex) -> Option<T> {
        if *self.generations.get(idx.index as usize)? != idx.generation {
            return None;
        }
        let value = self.items[idx.index as usize].take()?;
        self.generations[idx.index as usize] = idx.generation.wrapping_add(1);
        self.free_list.push(idx.index);
        self.live -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.live
    }
}

impl<T> Default for GenArena<T> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_arena() {
        let mut arena = GenArena::new();
        let idx = arena.insert(42);

        assert_eq!(arena.get(idx), Some(&42));
        assert_eq!(arena.remove(idx), Some(42));
        assert_eq!(arena.get(idx), None);
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn test_stale_index_after_reuse() {
        let mut arena = GenArena::new();
        let old = arena.insert("old");
        arena.remove(old);
        let new = arena.insert("new");

        assert_eq!(old.index, new.index);
        assert_ne!(old.generation, new.generation);
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.remove(old), None);
        assert_eq!(arena.get(new), Some(&"new"));
        assert_eq!(arena.len(), 1);
    }
}
