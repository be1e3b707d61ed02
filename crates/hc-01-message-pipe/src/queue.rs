//! Fixed-capacity ring buffer with a press-oldest-out overflow rule.

/// A non-thread-safe FIFO ring buffer of capacity `C ≥ 1`.
///
/// `offer`/`poll` give plain bounded-FIFO behavior; `press` always accepts,
/// evicting the oldest element when full. Callers wrap the queue in a mutex
/// if it is shared.
#[derive(Debug)]
pub struct PressableQueue<T> {
    slots: Vec<Option<T>>,
    offset: usize,
    len: usize,
}

impl<T> PressableQueue<T> {
    /// Create a queue holding up to `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "queue capacity must be at least 1");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            offset: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn size(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Append `element` if there is room; reject it otherwise.
    pub fn offer(&mut self, element: T) -> bool {
        if self.is_full() {
            return false;
        }
        let idx = (self.offset + self.len) % self.slots.len();
        self.slots[idx] = Some(element);
        self.len += 1;
        true
    }

    /// Append `element` unconditionally, evicting and returning the oldest
    /// element when the queue was full.
    pub fn press(&mut self, element: T) -> Option<T> {
        if !self.is_full() {
            self.offer(element);
            return None;
        }
        // The append slot (offset+len) mod C aliases the current head.
        let dropped = self.slots[self.offset].replace(element);
        self.offset = (self.offset + 1) % self.slots.len();
        dropped
    }

    /// Remove and return the oldest element.
    pub fn poll(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let element = self.slots[self.offset].take();
        self.offset = (self.offset + 1) % self.slots.len();
        self.len -= 1;
        element
    }

    /// The oldest element without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.offset].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_poll_fifo() {
        let mut q = PressableQueue::new(3);
        assert!(q.offer(1));
        assert!(q.offer(2));
        assert!(q.offer(3));
        assert!(!q.offer(4));
        assert_eq!(q.poll(), Some(1));
        assert_eq!(q.poll(), Some(2));
        assert!(q.offer(4));
        assert_eq!(q.poll(), Some(3));
        assert_eq!(q.poll(), Some(4));
        assert_eq!(q.poll(), None);
    }

    #[test]
    fn test_press_drops_oldest() {
        let mut q = PressableQueue::new(3);
        for i in 0..3 {
            assert_eq!(q.press(i), None);
        }
        assert!(q.is_full());
        assert_eq!(q.press(3), Some(0));
        assert_eq!(q.press(4), Some(1));
        assert_eq!(q.size(), 3);
        assert_eq!(q.poll(), Some(2));
        assert_eq!(q.poll(), Some(3));
        assert_eq!(q.poll(), Some(4));
        assert!(q.is_empty());
    }

    #[test]
    fn test_press_wraps_many_times() {
        let mut q = PressableQueue::new(4);
        let mut dropped = Vec::new();
        for i in 0..40 {
            if let Some(d) = q.press(i) {
                dropped.push(d);
            }
        }
        // first 4 accepted silently, every later press evicts in order
        assert_eq!(dropped, (0..36).collect::<Vec<_>>());
        let remaining: Vec<_> = std::iter::from_fn(|| q.poll()).collect();
        assert_eq!(remaining, vec![36, 37, 38, 39]);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut q = PressableQueue::new(2);
        assert_eq!(q.peek(), None);
        q.offer(7);
        assert_eq!(q.peek(), Some(&7));
        assert_eq!(q.size(), 1);
        assert_eq!(q.poll(), Some(7));
    }

    #[test]
    fn test_capacity_one() {
        let mut q = PressableQueue::new(1);
        assert_eq!(q.press(1), None);
        assert_eq!(q.press(2), Some(1));
        assert_eq!(q.poll(), Some(2));
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_panics() {
        let _ = PressableQueue::<u8>::new(0);
    }
}
