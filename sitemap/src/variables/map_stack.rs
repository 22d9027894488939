//! The stack of result maps visible to expressions.

use crate::components::MatchResult;

/// One result map and the name of the node that bound it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapFrame {
    /// Node name, used by `{#anchor:key}`.
    pub anchor: Option<String>,
    /// The bound values.
    pub values: MatchResult,
}

/// Result maps of the enclosing match, select and act nodes, innermost last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapStack {
    frames: Vec<MapFrame>,
}

impl MapStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a map.
    pub fn push(&mut self, anchor: Option<String>, values: MatchResult) {
        self.frames.push(MapFrame { anchor, values });
    }

    /// Pops the innermost map.
    pub fn pop(&mut self) -> Option<MapFrame> {
        self.frames.pop()
    }

    /// Returns the map `levels_up` levels above the innermost one.
    #[must_use]
    pub fn level(&self, levels_up: usize) -> Option<&MapFrame> {
        self.frames
            .len()
            .checked_sub(levels_up + 1)
            .and_then(|index| self.frames.get(index))
    }

    /// Returns the innermost map bound under `anchor`.
    #[must_use]
    pub fn anchored(&self, anchor: &str) -> Option<&MapFrame> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.anchor.as_deref() == Some(anchor))
    }

    /// Returns the number of maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if no map is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
