// Fixed-capacity per-tick sample store for a single entity.

use super::types::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    lowest: Tick,
    highest: Tick,
}

/// Circular buffer of per-tick samples, indexed by `tick % capacity`.
///
/// The valid ticks always form one contiguous span of at most `capacity`
/// ticks. Extending the span past its capacity evicts the oldest ticks.
#[derive(Debug, Clone)]
pub struct HistoricBuffer<T> {
    slots: Vec<Option<T>>,
    span: Option<Span>,
}

impl<T: Copy> HistoricBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "historic buffer capacity must be positive");
        Self {
            slots: vec![None; capacity],
            span: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_none()
    }

    pub fn lowest(&self) -> Option<Tick> {
        self.span.map(|s| s.lowest)
    }

    pub fn highest(&self) -> Option<Tick> {
        self.span.map(|s| s.highest)
    }

    pub fn covers(&self, tick: Tick) -> bool {
        self.span
            .is_some_and(|s| (s.lowest..=s.highest).contains(&tick))
    }

    pub fn get(&self, tick: Tick) -> Option<T> {
        if !self.covers(tick) {
            return None;
        }
        self.slots[self.slot(tick)]
    }

    /// Writes `value` at `tick`, replacing whatever the buffer held there.
    ///
    /// Writing directly above the span extends it (evicting the oldest tick
    /// once full); writing further above restarts the span at `tick`. A write
    /// directly below the span extends it downwards if there is room. Any
    /// other write below the span is a miss and returns false.
    pub fn set(&mut self, tick: Tick, value: T) -> bool {
        let capacity = self.capacity() as Tick;
        let span = match self.span {
            None => Span {
                lowest: tick,
                highest: tick,
            },
            Some(s) if (s.lowest..=s.highest).contains(&tick) => s,
            Some(s) if tick == s.highest + 1 => Span {
                lowest: s.lowest.max((tick + 1).saturating_sub(capacity)),
                highest: tick,
            },
            Some(s) if tick > s.highest => Span {
                lowest: tick,
                highest: tick,
            },
            Some(s) if tick + 1 == s.lowest && s.highest - tick < capacity => Span {
                lowest: tick,
                highest: s.highest,
            },
            Some(_) => return false,
        };

        let slot = self.slot(tick);
        self.slots[slot] = Some(value);
        self.span = Some(span);
        true
    }

    /// Fills in ticks that `other` holds and this buffer does not.
    ///
    /// Ticks inside this buffer's span are never touched. Only ticks that
    /// keep the span contiguous are taken: first downwards from the current
    /// lowest tick while capacity allows, then upwards from the highest.
    pub fn overwrite(&mut self, other: &HistoricBuffer<T>) {
        let Some(theirs) = other.span else {
            return;
        };
        let Some(ours) = self.span else {
            let start = theirs
                .highest
                .saturating_sub(self.capacity() as Tick - 1)
                .max(theirs.lowest);
            for tick in start..=theirs.highest {
                if let Some(value) = other.get(tick) {
                    self.set(tick, value);
                }
            }
            return;
        };

        let mut tick = ours.lowest;
        while tick > 0 {
            tick -= 1;
            let Some(value) = other.get(tick) else {
                break;
            };
            if !self.set(tick, value) {
                break;
            }
        }

        for tick in (ours.highest + 1)..=theirs.highest.max(ours.highest) {
            let Some(value) = other.get(tick) else {
                break;
            };
            self.set(tick, value);
        }
    }

    /// Drops every tick above `tick` from the span.
    pub fn discard_after(&mut self, tick: Tick) {
        let Some(span) = self.span else {
            return;
        };
        if tick >= span.highest {
            return;
        }
        if tick < span.lowest {
            self.clear();
            return;
        }
        for dropped in (tick + 1)..=span.highest {
            let slot = self.slot(dropped);
            self.slots[slot] = None;
        }
        self.span = Some(Span {
            lowest: span.lowest,
            highest: tick,
        });
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.span = None;
    }

    /// Iterates the valid span in ascending tick order.
    pub fn iter(&self) -> impl Iterator<Item = (Tick, T)> + '_ {
        self.span
            .into_iter()
            .flat_map(|s| s.lowest..=s.highest)
            .filter_map(move |tick| self.get(tick).map(|value| (tick, value)))
    }

    fn slot(&self, tick: Tick) -> usize {
        (tick % self.capacity() as Tick) as usize
    }
}
