//! Round-robin slot cursor.

/// Names the slot being recorded.
///
/// The cursor starts at slot 0. Each frame begins with [`advance`](Self::advance);
/// the first call keeps slot 0, every later call moves to `(position + 1) % N`.
///
/// ```text
/// frames_in_flight = 3
///
/// frame:  0  1  2  3  4  5  6
/// slot:   0  1  2  0  1  2  0
/// ```
///
/// So `advance` yields `(position + 1) % N` only from the second frame on;
/// the first frame is recorded into slot 0 without a move.
#[derive(Debug, Clone, Copy)]
pub struct PipelineCursor {
    position: usize,
    depth: usize,
    started: bool,
}

impl PipelineCursor {
    /// # Panics
    ///
    /// Panics if `depth` is 0.
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "frames_in_flight must be at least 1");
        Self {
            position: 0,
            depth,
            started: false,
        }
    }

    /// Move to the slot of the next frame and return it.
    pub fn advance(&mut self) -> usize {
        if self.started {
            self.position = (self.position + 1) % self.depth;
        }
        self.started = true;
        debug_assert!(self.position < self.depth);
        self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_starts_at_zero() {
        let mut cursor = PipelineCursor::new(3);
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.advance(), 0);
        assert_eq!(cursor.advance(), 1);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    fn test_visits_every_slot_once_per_cycle(#[case] depth: usize) {
        let mut cursor = PipelineCursor::new(depth);
        cursor.advance();

        for _ in 0..4 {
            let mut seen = vec![0usize; depth];
            for _ in 0..depth {
                let before = cursor.position();
                let slot = cursor.advance();
                assert_eq!(slot, (before + 1) % depth);
                seen[slot] += 1;
            }
            assert!(seen.iter().all(|&count| count == 1));
        }
    }

    #[test]
    #[should_panic(expected = "frames_in_flight must be at least 1")]
    fn test_zero_depth_panics() {
        PipelineCursor::new(0);
    }
}
