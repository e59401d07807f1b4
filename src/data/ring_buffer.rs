/// Fixed-capacity ordered buffer backed by a preallocated arena.
///
/// Entries are kept oldest-first. Pushing into a full buffer evicts the
/// oldest entry, which is how every rolling window in the crate honours
/// its lookback cap without growing.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    /// Physical index of the oldest entry
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be > 0");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    fn physical(&self, logical: usize) -> usize {
        (self.head + logical) % self.capacity()
    }

    /// Append at the newest end. Returns the evicted oldest entry when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.len < self.capacity() {
            let idx = self.physical(self.len);
            self.slots[idx] = Some(value);
            self.len += 1;
            None
        } else {
            let evicted = self.slots[self.head].replace(value);
            self.head = (self.head + 1) % self.capacity();
            evicted
        }
    }

    /// Entry by logical index, 0 being the oldest.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.slots[self.physical(index)].as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        let idx = self.physical(index);
        self.slots[idx].as_mut()
    }

    pub fn last(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn last_mut(&mut self) -> Option<&mut T> {
        match self.len.checked_sub(1) {
            Some(i) => self.get_mut(i),
            None => None,
        }
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }

    /// Move every entry out, oldest first, leaving the buffer empty.
    pub fn drain_ordered(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        for i in 0..self.len {
            let idx = self.physical(i);
            if let Some(value) = self.slots[idx].take() {
                out.push(value);
            }
        }
        self.head = 0;
        self.len = 0;
        out
    }

    /// Refill from an ordered sequence. Only the newest `capacity` items survive.
    pub fn replace_from<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.clear();
        for item in items {
            self.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut buf = RingBuffer::with_capacity(3);
        assert!(buf.is_empty());
        assert_eq!(buf.push(1), None);
        assert_eq!(buf.push(2), None);
        assert_eq!(buf.push(3), None);
        assert!(buf.is_full());
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_eviction_keeps_order() {
        let mut buf = RingBuffer::with_capacity(3);
        for v in 1..=3 {
            buf.push(v);
        }
        assert_eq!(buf.push(4), Some(1));
        assert_eq!(buf.push(5), Some(2));
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(buf.get(0), Some(&3));
        assert_eq!(buf.last(), Some(&5));
        assert_eq!(buf.get(3), None);
        assert_eq!(buf.iter().rev().next(), Some(&5));
    }

    #[test]
    fn test_last_mut_overwrites_newest() {
        let mut buf = RingBuffer::with_capacity(2);
        buf.push(10);
        buf.push(20);
        buf.push(30);
        if let Some(v) = buf.last_mut() {
            *v = 99;
        }
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![20, 99]);
    }

    #[test]
    fn test_drain_and_replace() {
        let mut buf = RingBuffer::with_capacity(3);
        for v in 1..=5 {
            buf.push(v);
        }
        let drained = buf.drain_ordered();
        assert_eq!(drained, vec![3, 4, 5]);
        assert!(buf.is_empty());

        buf.replace_from(vec![1, 2, 3, 4]);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(buf.capacity(), 3);
    }

    #[test]
    #[should_panic(expected = "ring buffer capacity must be > 0")]
    fn test_zero_capacity_panics() {
        let _ = RingBuffer::<u8>::with_capacity(0);
    }
}
