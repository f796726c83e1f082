//! Frame clock pacing
//!
//! Keeps a device fed at its own frame rate. `wait()` sleeps until the next
//! deadline; a caller that is already late is not made to wait and the
//! schedule restarts from now instead of bursting to catch up.

use std::time::Duration;

use tokio::time::Instant;

/// Sleeps out the remainder of each frame period
#[derive(Debug)]
pub struct FramePacer {
    interval: Duration,
    next_deadline: Option<Instant>,
}

impl FramePacer {
    /// Pacer for `fps` frames per second (0 is treated as 30)
    pub fn new(fps: u32) -> Self {
        let fps = if fps == 0 { 30 } else { fps };
        Self {
            interval: Duration::from_secs(1) / fps,
            next_deadline: None,
        }
    }

    /// Frame period
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next frame slot
    pub async fn wait(&mut self) {
        let now = Instant::now();

        match self.next_deadline {
            Some(deadline) if deadline > now => {
                tokio::time::sleep_until(deadline).await;
                self.next_deadline = Some(deadline + self.interval);
            }
            _ => {
                self.next_deadline = Some(now + self.interval);
            }
        }
    }

    /// Forget the schedule
    pub fn reset(&mut self) {
        self.next_deadline = None;
    }
}
