// SPDX-License-Identifier: GPL-3.0-only

//! Suppression of redundant camera-parameter propagation

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct ThrottleState {
    last_camera_id: Option<String>,
    last_sent_at: Option<Instant>,
}

/// Drops repeated non-explicit parameter pushes for the same camera
///
/// Hosts tend to re-apply the same parameters several times while opening a
/// camera; only the first push inside the window reaches the renderer.
/// Explicit updates (the application actually set a size) always pass.
#[derive(Debug, Default)]
pub struct ParameterThrottle {
    state: Mutex<ThrottleState>,
}

impl ParameterThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether an update should reach the renderer, recording it if so
    pub fn should_send(
        &self,
        camera_id: &str,
        explicit: bool,
        window: Duration,
        now: Instant,
    ) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let recent = state.last_camera_id.as_deref() == Some(camera_id)
            && state
                .last_sent_at
                .is_some_and(|at| now.saturating_duration_since(at) < window);
        if !explicit && recent {
            return false;
        }
        state.last_camera_id = Some(camera_id.to_string());
        state.last_sent_at = Some(now);
        true
    }

    /// Forget the last camera so its next update passes
    pub fn reset(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ThrottleState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(250);

    #[test]
    fn test_repeated_update_dropped_inside_window() {
        let throttle = ParameterThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.should_send("0", false, WINDOW, t0));
        assert!(!throttle.should_send("0", false, WINDOW, t0 + Duration::from_millis(100)));
        assert!(throttle.should_send("0", false, WINDOW, t0 + Duration::from_millis(300)));
    }

    #[test]
    fn test_explicit_and_other_camera_pass() {
        let throttle = ParameterThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.should_send("0", false, WINDOW, t0));
        assert!(throttle.should_send("0", true, WINDOW, t0));
        assert!(throttle.should_send("1", false, WINDOW, t0));
    }

    #[test]
    fn test_reset_clears_window() {
        let throttle = ParameterThrottle::new();
        let t0 = Instant::now();
        throttle.should_send("0", false, WINDOW, t0);
        throttle.reset();
        assert!(throttle.should_send("0", false, WINDOW, t0));
    }
}
