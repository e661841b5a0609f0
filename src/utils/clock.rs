use tokio::time::Instant;

/// Source of "now" for the posture state machine.
///
/// Production code uses [`TokioClock`], which honours `tokio::time::pause`,
/// so tests can drive the whole pipeline with a paused runtime instead of
/// wall-clock sleeps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
