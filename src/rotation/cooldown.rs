use std::collections::VecDeque;

/// Bounded FIFO history of recently replaced slot indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cooldown {
    period: usize,
    history: VecDeque<usize>,
}

impl Cooldown {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            history: VecDeque::with_capacity(period),
        }
    }

    /// Records a replaced slot, evicting the oldest beyond the period
    pub fn record(&mut self, slot: usize) {
        if self.period == 0 {
            return;
        }
        self.history.push_back(slot);
        while self.history.len() > self.period {
            self.history.pop_front();
        }
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.history.contains(&slot)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Slots from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.history.iter().copied()
    }
}
