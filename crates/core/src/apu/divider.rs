//! Clock divider: lets one tick in every `period` through.

/// Counts driver ticks and fires once per `period` ticks.
///
/// The counter is loaded explicitly, so a freshly armed divider can be made
/// to fire on its very first tick by loading `period - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Divider {
    period: u16,
    count: u16,
}

impl Divider {
    pub fn new(period: u16) -> Self {
        Self { period, count: 0 }
    }

    /// Sets a new period and preloads the counter.
    pub fn reload(&mut self, period: u16, count: u16) {
        self.period = period;
        self.count = count;
    }

    pub fn period(&self) -> u16 {
        self.period
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    /// Advances by one tick. Returns `true` (and resets the counter) when the
    /// period is reached.
    #[inline]
    pub fn tick(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        if self.count >= self.period {
            self.count = 0;
            true
        } else {
            false
        }
    }
}
