/// Append-only arena scoped to a single unit of work.
///
/// Slots are handed out as plain indices. The arena is meant to be created
/// when the work starts and dropped (or drained) when it ends, so indices
/// never outlive the data they point at.
#[derive(Debug)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Arena {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn alloc(&mut self, v: T) -> usize {
        self.items.push(v);
        self.items.len() - 1
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.items.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.items.get_mut(idx)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates slots in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Consumes the arena, yielding slots in allocation order.
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::Arena;

    #[test]
    fn indices_follow_allocation_order() {
        let mut arena = Arena::new();
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        assert_eq!((a, b), (0, 1));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.into_vec(), vec!["a", "b"]);
    }

    #[test]
    fn get_mut_updates_slot() {
        let mut arena = Arena::with_capacity(2);
        let idx = arena.alloc(1);
        if let Some(v) = arena.get_mut(idx) {
            *v = 5;
        }
        assert_eq!(arena.get(idx), Some(&5));
        assert!(arena.get(7).is_none());
    }
}
