use super::types::Tick;

/// Low-water mark of an entity's cached path.
///
/// Samples at ticks at or above the mark may be stale and are recomputed by
/// the owning state before they are trusted again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyPath {
    mark: Option<Tick>,
}

impl DirtyPath {
    /// Lowers the mark to `tick`. Returns true if the path was clean before.
    pub fn mark_dirty(&mut self, tick: Tick) -> bool {
        match self.mark {
            None => {
                self.mark = Some(tick);
                true
            }
            Some(mark) => {
                self.mark = Some(mark.min(tick));
                false
            }
        }
    }

    pub fn is_dirty(&self, tick: Tick) -> bool {
        self.mark.is_some_and(|mark| tick >= mark)
    }

    pub fn mark(&self) -> Option<Tick> {
        self.mark
    }

    pub fn clear(&mut self) {
        self.mark = None;
    }
}
