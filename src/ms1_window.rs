/// Fixed-capacity circular buffer of the most recent top-level scans.
///
/// Slots hold positions into the run's scan sequence rather than the scans
/// themselves, so a slot stays valid for as long as that sequence is only
/// appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ms1Window {
    slots: Vec<Option<usize>>,
    cursor: usize,
    latest: Option<usize>,
}

impl Ms1Window {
    pub const DEFAULT_CAPACITY: usize = 12;

    /// Create an empty window. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            cursor: 0,
            latest: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Store `position` at the cursor, overwriting the oldest entry once full
    pub fn push(&mut self, position: usize) {
        self.slots[self.cursor] = Some(position);
        self.latest = Some(position);
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    pub fn slot(&self, index: usize) -> Option<usize> {
        self.slots.get(index).copied().flatten()
    }

    /// Filled slots, in slot order
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().filter_map(|s| *s)
    }

    /// Filled slots, oldest first
    pub fn chronological(&self) -> impl Iterator<Item = usize> + '_ {
        let (newer, older) = self.slots.split_at(self.cursor);
        older.iter().chain(newer).filter_map(|s| *s)
    }

    /// Position of the most recently pushed top-level scan
    pub fn latest(&self) -> Option<usize> {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.positions().count()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }

    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.cursor = 0;
        self.latest = None;
    }
}

impl Default for Ms1Window {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_without_wrap() {
        let mut window = Ms1Window::default();
        for i in 0..5 {
            window.push(i);
        }
        assert_eq!(window.len(), 5);
        assert_eq!(window.cursor(), 5);
        assert_eq!(window.latest(), Some(4));
        assert_eq!(window.slot(5), None);
        assert_eq!(window.chronological().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_wraparound() {
        let mut window = Ms1Window::new(12);
        let k = 5;
        for i in 0..12 + k {
            window.push(i);
        }
        assert_eq!(window.len(), 12);
        assert_eq!(window.cursor(), k);
        for slot in 0..12 {
            let arrival = window.slot(slot).unwrap();
            assert_eq!(arrival % 12, slot);
            assert!(arrival >= k);
        }
        assert_eq!(
            window.chronological().collect::<Vec<_>>(),
            (k..12 + k).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_reset() {
        let mut window = Ms1Window::new(3);
        for i in 0..4 {
            window.push(i);
        }
        window.reset();
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
        assert_eq!(window.cursor(), 0);
        assert_eq!(window.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity() {
        let mut window = Ms1Window::new(0);
        window.push(7);
        window.push(8);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.slot(0), Some(8));
    }
}
