use crate::replica::ids::{LamportCounter, ServerId, NUM_SERVERS};
use std::fmt;

/// LamportMatrix records, for every (observer, origin) pair, the highest counter originated by
/// `origin` that `observer` is known to have received. Row `me` is our own view.
///
/// Cells only ever move forward. All writes go through `raise()`, which ignores smaller values.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct LamportMatrix {
    cells: [[LamportCounter; NUM_SERVERS]; NUM_SERVERS],
}

impl LamportMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: [[LamportCounter; NUM_SERVERS]; NUM_SERVERS]) -> Self {
        LamportMatrix { cells }
    }

    pub fn cells(&self) -> &[[LamportCounter; NUM_SERVERS]; NUM_SERVERS] {
        &self.cells
    }

    pub fn get(&self, observer: ServerId, origin: ServerId) -> LamportCounter {
        self.cells[observer.index()][origin.index()]
    }

    pub fn row(&self, observer: ServerId) -> &[LamportCounter; NUM_SERVERS] {
        &self.cells[observer.index()]
    }

    /// Set the cell to `value` iff it is larger than the current value.
    ///
    /// Return true if we mutated the cell.
    pub(crate) fn raise(&mut self, observer: ServerId, origin: ServerId, value: LamportCounter) -> bool {
        let cell = &mut self.cells[observer.index()][origin.index()];
        if value > *cell {
            *cell = value;
            true
        } else {
            false
        }
    }

    /// Cell-wise max of `observer`'s row with `row`. Return true if any cell moved.
    pub(crate) fn raise_row(&mut self, observer: ServerId, row: &[LamportCounter; NUM_SERVERS]) -> bool {
        let mut changed = false;
        for origin in ServerId::all() {
            changed |= self.raise(observer, origin, row[origin.index()]);
        }
        changed
    }

    pub(crate) fn rows_agree(&self, a: ServerId, b: ServerId) -> bool {
        self.cells[a.index()] == self.cells[b.index()]
    }
}

impl fmt::Debug for LamportMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<Vec<u32>> = self
            .cells
            .iter()
            .map(|row| row.iter().map(|c| c.as_u32()).collect())
            .collect();
        write!(f, "{:?}", rows)
    }
}

/// LamportClock is the counter a server stamps onto the events it originates. It witnesses every
/// counter it observes from peers, so a locally originated event always sorts after everything
/// this server had seen at the time.
#[derive(Debug, Default)]
pub(crate) struct LamportClock {
    latest: LamportCounter,
}

impl LamportClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn witness(&mut self, observed: LamportCounter) {
        if observed > self.latest {
            self.latest = observed;
        }
    }

    /// Advance the clock and return the counter for a new local event. None when a witnessed
    /// counter has already used up the counter space; the clock is left unchanged.
    pub(crate) fn tick(&mut self) -> Option<LamportCounter> {
        self.latest = self.latest.checked_next()?;
        Some(self.latest)
    }
}
