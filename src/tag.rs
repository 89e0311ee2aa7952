use std::fmt;

/// Hierarchical path label attached to every box for diagnostics.
///
/// Each level holds the sibling index at that nesting depth, so the third
/// child of the second top-level box renders as `1.2`. The label plays no
/// part in decoding or encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    levels: Vec<usize>,
}

impl Tag {
    /// Label for the first top-level box.
    pub fn root() -> Self {
        Self { levels: vec![0] }
    }

    /// Descend one level; the new level starts at sibling 0.
    pub fn push(&mut self) {
        self.levels.push(0);
    }

    /// Advance to the next sibling at the current depth.
    pub fn next(&mut self) {
        if let Some(last) = self.levels.last_mut() {
            *last += 1;
        }
    }

    /// Returns a copy of this label one level deeper.
    pub fn child(&self) -> Self {
        let mut t = self.clone();
        t.push();
        t
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn indent(&self) -> String {
        "  ".repeat(self.depth().saturating_sub(1))
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, idx) in self.levels.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{idx}")?;
        }
        Ok(())
    }
}
