use std::time::Duration;

/// The configuration of the synchronization engine
#[derive(Debug, Clone)]
pub struct Config {
    /// How far the observed position may stray from the target before a
    /// correction fires, in seconds. The comparison is strict.
    pub drift_threshold: f32,
    /// How long drift checks stay disarmed after a position jump, so the
    /// jump itself is not read as drift on the next check
    pub correction_guard: Duration,
    /// How many times room creation retries when a generated code collides
    pub create_retry_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Anything tighter fights ordinary buffering stalls
            drift_threshold: 2.0,
            // Enough for a seek to settle on most players
            correction_guard: Duration::from_millis(500),
            // With a 32^6 code space this should never be reached
            create_retry_limit: 5,
        }
    }
}
