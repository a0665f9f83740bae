//! Dynamic array with explicit growth policy
//!
//! Capacity doubles on overflow, but a single resize never adds more than
//! [`MAX_GROWTH`] slots beyond the current capacity (unless one bulk append
//! needs more). N appends therefore cost O(N) element moves in total.

/// Capacity of the first allocation
pub const MIN_CAPACITY: usize = 4;
/// Largest increment of one resize
pub const MAX_GROWTH: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq)]
pub struct DynArray<T> {
    items: Vec<T>,
    capacity: usize,
    resizes: usize,
}

impl<T> Default for DynArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DynArray<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            capacity: 0,
            resizes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many times storage has been reallocated
    pub fn resizes(&self) -> usize {
        self.resizes
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    fn reserve(&mut self, additional: usize) {
        let needed = self.items.len() + additional;
        if needed <= self.capacity {
            return;
        }
        let step = self.capacity.max(MIN_CAPACITY).min(MAX_GROWTH);
        let grown = (self.capacity + step).max(needed);
        self.items.reserve_exact(grown - self.items.len());
        self.capacity = grown;
        self.resizes += 1;
    }

    pub fn push(&mut self, item: T) {
        self.reserve(1);
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Append every item with at most one resize
    pub fn extend<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let items = items.into_iter();
        self.reserve(items.len());
        self.items.extend(items);
    }

    /// Move the elements from `start` on by `delta` slots.
    ///
    /// A positive delta opens a gap of `delta` slots at `start`, filled from
    /// `fill`. A negative delta closes the `|delta|` slots just before
    /// `start` and returns their elements. Returns `None` when the range is
    /// out of bounds or `fill` runs short; the array is then unchanged.
    pub fn shift<I>(&mut self, start: usize, delta: isize, fill: I) -> Option<Vec<T>>
    where
        I: IntoIterator<Item = T>,
    {
        let len = self.items.len();
        if start > len {
            return None;
        }
        let amount = delta.unsigned_abs();
        if delta >= 0 {
            self.reserve(amount);
            self.items.extend(fill.into_iter().take(amount));
            if self.items.len() - len < amount {
                self.items.truncate(len);
                return None;
            }
            // moves right: the new tail slots rotate down to `start`
            self.items[start..].rotate_right(amount);
            Some(Vec::new())
        } else {
            if amount > start {
                return None;
            }
            // moves left: the closed slots rotate to the end and are split off
            self.items[start - amount..].rotate_left(amount);
            Some(self.items.split_off(len - amount))
        }
    }

    pub fn insert(&mut self, index: usize, item: T) -> bool {
        self.shift(index, 1, [item]).is_some()
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        self.shift(index + 1, -1, std::iter::empty())?.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_appends() {
        for n in [0usize, 1, 17, 1000] {
            let mut array = DynArray::new();
            let mut last_capacity = 0;
            for i in 0..n {
                array.push(i);
                assert!(array.capacity() >= last_capacity);
                assert!(array.len() <= array.capacity());
                last_capacity = array.capacity();
            }
            assert_eq!(array.len(), n);
            let bound = if n == 0 { 0 } else { (n as f64).log2().ceil() as usize + 1 };
            assert!(array.resizes() <= bound, "{} resizes for {}", array.resizes(), n);
        }
    }

    #[test]
    fn test_growth_is_capped() {
        let mut array: DynArray<u8> = DynArray::new();
        array.extend(vec![0; MAX_GROWTH * 2]);
        let before = array.capacity();
        array.push(1);
        assert_eq!(array.capacity(), before + MAX_GROWTH);
    }

    #[test]
    fn test_bulk_append_resizes_once() {
        let mut array = DynArray::new();
        array.extend(0..100);
        assert_eq!(array.resizes(), 1);
        assert_eq!(array.as_slice()[99], 99);
    }

    #[test]
    fn test_shift_both_directions() {
        let mut array = DynArray::new();
        array.extend([1, 2, 3, 4]);
        assert_eq!(array.shift(1, 2, [0, 0]), Some(vec![]));
        assert_eq!(array.as_slice(), &[1, 0, 0, 2, 3, 4]);
        assert_eq!(array.shift(3, -2, []), Some(vec![0, 0]));
        assert_eq!(array.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(array.shift(1, -2, []), None);
        assert_eq!(array.shift(9, 1, [0]), None);
        assert_eq!(array.shift(0, 2, [7]), None);
        assert_eq!(array.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut array = DynArray::new();
        array.extend(['a', 'c']);
        assert!(array.insert(1, 'b'));
        assert!(array.insert(3, 'd'));
        assert!(!array.insert(9, 'x'));
        assert_eq!(array.as_slice(), &['a', 'b', 'c', 'd']);
        assert_eq!(array.remove(0), Some('a'));
        assert_eq!(array.remove(7), None);
        assert_eq!(array.as_slice(), &['b', 'c', 'd']);
    }
}
