/// Fixed-capacity circular buffer
///
/// Pushing into a full buffer overwrites the oldest element in O(1).
/// Storage grows lazily up to `capacity`, so an effectively unbounded
/// buffer (`usize::MAX`) behaves like a plain `Vec`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    head: usize,
    capacity: usize,
    evicted: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            head: 0,
            capacity: capacity.max(1),
            evicted: 0,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    /// Number of elements dropped from the front so far
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    /// Push to the back, returning the evicted front element if full
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.buf.len() < self.capacity {
            self.buf.push(value);
            return None;
        }
        let old = std::mem::replace(&mut self.buf[self.head], value);
        self.head = (self.head + 1) % self.capacity;
        self.evicted += 1;
        Some(old)
    }

    fn physical(&self, index: usize) -> usize {
        (self.head + index) % self.buf.len()
    }

    /// Element at logical position (0 = oldest retained)
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.buf.len() {
            return None;
        }
        let i = self.physical(index);
        self.buf.get(i)
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.buf.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn last_mut(&mut self) -> Option<&mut T> {
        let len = self.buf.len();
        if len == 0 {
            return None;
        }
        let i = self.physical(len - 1);
        self.buf.get_mut(i)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (tail, front) = self.buf.split_at(self.head);
        front.iter().chain(tail.iter())
    }

    pub fn clear(&mut self) {
        self.evicted += self.buf.len();
        self.buf.clear();
        self.head = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
