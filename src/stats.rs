use std::time::Instant;

/// Wall-clock stopwatch for one collision phase.
#[derive(Clone, Copy)]
pub(crate) struct PhaseTimer {
    start: Option<Instant>,
}

impl PhaseTimer {
    /// Starts timing only when `enabled`; a disabled timer always reads zero.
    pub(crate) fn start(enabled: bool) -> Self {
        Self {
            start: enabled.then(Instant::now),
        }
    }

    pub(crate) fn elapsed_ms(&self) -> f64 {
        self.start
            .map_or(0.0, |start| start.elapsed().as_secs_f64() * 1000.0)
    }
}

/// Counters and timings for the last `advance()` call.
///
/// Counters are always collected; timings stay at zero unless timing is
/// enabled on the world.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub microsteps: u32,
    /// Candidate pairs that reached the overlap test.
    pub pairs_checked: u32,
    /// Overlapping pairs that received a response.
    pub contacts: u32,
    /// Pairs dropped because their geometry or masses were degenerate.
    pub degenerate_pairs: u32,
    /// Walls hit by bodies (one per side per microstep).
    pub boundary_hits: u32,
    pub query_ms: f64,
    pub check_ms: f64,
    pub response_ms: f64,
}

impl FrameStats {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn collision_ms(&self) -> f64 {
        self.query_ms + self.check_ms + self.response_ms
    }

    /// Share of collision time spent in (query, check, resolve), in percent.
    pub fn perf_percentages(&self) -> (f64, f64, f64) {
        let total = self.collision_ms();
        if total <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        (
            100.0 * self.query_ms / total,
            100.0 * self.check_ms / total,
            100.0 * self.response_ms / total,
        )
    }
}
