use std::fmt;

/// Lifecycle states of a streaming pipeline, in ascending order.
///
/// Transitions always move one step at a time; samples only flow in
/// `Playing`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl PipelineState {
    const ORDER: [PipelineState; 4] = [
        PipelineState::Null,
        PipelineState::Ready,
        PipelineState::Paused,
        PipelineState::Playing,
    ];

    /// The adjacent state on the way from `self` to `target`, or `self`
    /// when already there.
    pub fn step_toward(self, target: PipelineState) -> PipelineState {
        let here = self as usize;
        let there = target as usize;
        match here.cmp(&there) {
            std::cmp::Ordering::Less => Self::ORDER[here + 1],
            std::cmp::Ordering::Greater => Self::ORDER[here - 1],
            std::cmp::Ordering::Equal => self,
        }
    }

    /// Every intermediate state visited from `self` to `target`,
    /// excluding `self`.
    pub fn path_to(self, target: PipelineState) -> Vec<PipelineState> {
        let mut path = Vec::new();
        let mut current = self;
        while current != target {
            current = current.step_toward(target);
            path.push(current);
        }
        path
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Null => "NULL",
            PipelineState::Ready => "READY",
            PipelineState::Paused => "PAUSED",
            PipelineState::Playing => "PLAYING",
        };
        f.write_str(name)
    }
}
