//! Presence fade controller
//!
//! Maps the debounced presence signal onto a dedicated mix-bus gain. The
//! ramp is asymmetric on purpose: losing the subject fades out slowly so
//! the music never cuts off abruptly, while a returning subject fades back
//! in quickly for responsiveness. The target is converted to decibels and
//! ramped in the log domain by the mixer, with a floor instead of
//! negative infinity.
//!
//! This bus sits downstream of the mood-driven session: mood changes never
//! touch it, and presence changes never restart playback.

use std::sync::Arc;

use crate::audio::mixer::linear_to_db;
use crate::audio::AudioShared;

/// Linear gain while a subject is present.
pub const PRESENT_GAIN: f32 = 1.0;

/// Residual linear gain while absent; never fully silent.
pub const ABSENT_GAIN: f32 = 0.02;

/// Slow fade-out on presence loss, in seconds.
pub const FADE_OUT_SECS: f32 = 2.0;

/// Fast fade-in on presence regain, in seconds.
pub const FADE_IN_SECS: f32 = 0.5;

/// Target linear gain for a presence state.
pub fn target_gain(is_present: bool) -> f32 {
    if is_present {
        PRESENT_GAIN
    } else {
        ABSENT_GAIN
    }
}

/// Ramp duration for a transition into the given presence state.
pub fn ramp_secs(is_present: bool) -> f32 {
    if is_present {
        FADE_IN_SECS
    } else {
        FADE_OUT_SECS
    }
}

/// Drives the fade bus targets from presence transitions.
pub struct FadeController {
    shared: Arc<AudioShared>,
    is_present: bool,
}

impl FadeController {
    /// Starts in the present state with the bus fully open.
    pub fn new(shared: Arc<AudioShared>) -> Self {
        shared.fade_target_db.store(linear_to_db(PRESENT_GAIN));
        shared.fade_ramp_secs.store(FADE_IN_SECS);
        Self {
            shared,
            is_present: true,
        }
    }

    /// Handle a debounced presence transition.
    ///
    /// Toggling to the current state is silently ignored.
    pub fn on_presence_changed(&mut self, is_present: bool) {
        if self.is_present == is_present {
            return;
        }
        self.is_present = is_present;

        let target_db = linear_to_db(target_gain(is_present));
        let ramp = ramp_secs(is_present);
        self.shared.fade_target_db.store(target_db);
        self.shared.fade_ramp_secs.store(ramp);

        log::info!(
            "[Fade] Presence {} -> target {:.1} dB over {:.1}s",
            if is_present { "regained" } else { "lost" },
            target_db,
            ramp
        );
    }

    pub fn is_present(&self) -> bool {
        self.is_present
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_out_is_slower_than_fade_in() {
        assert!(
            ramp_secs(false) > ramp_secs(true),
            "losing presence must fade more slowly than regaining it"
        );
        assert_eq!(ramp_secs(false), 2.0);
        assert_eq!(ramp_secs(true), 0.5);
    }

    #[test]
    fn test_absent_target_is_residual_not_silent() {
        assert!(target_gain(false) > 0.0, "absent gain must never be zero");
        assert_eq!(target_gain(false), 0.02);
        assert_eq!(target_gain(true), 1.0);
    }

    #[test]
    fn test_presence_loss_sets_log_domain_target() {
        let shared = Arc::new(AudioShared::new(48000, 0.0));
        let mut fade = FadeController::new(Arc::clone(&shared));

        fade.on_presence_changed(false);
        // 0.02 linear is about -34 dB
        let target = shared.fade_target_db.load();
        assert!((target - (-33.98)).abs() < 0.1, "got {} dB", target);
        assert_eq!(shared.fade_ramp_secs.load(), FADE_OUT_SECS);

        fade.on_presence_changed(true);
        assert!(shared.fade_target_db.load().abs() < 0.01);
        assert_eq!(shared.fade_ramp_secs.load(), FADE_IN_SECS);
    }

    #[test]
    fn test_redundant_toggle_is_ignored() {
        let shared = Arc::new(AudioShared::new(48000, 0.0));
        let mut fade = FadeController::new(Arc::clone(&shared));

        // Force a sentinel and confirm a same-state toggle leaves it alone.
        fade.on_presence_changed(false);
        shared.fade_ramp_secs.store(99.0);
        fade.on_presence_changed(false);
        assert_eq!(
            shared.fade_ramp_secs.load(),
            99.0,
            "redundant presence toggles must not rewrite targets"
        );
    }

    #[test]
    fn test_starts_present_and_open() {
        let shared = Arc::new(AudioShared::new(48000, 0.0));
        let fade = FadeController::new(Arc::clone(&shared));
        assert!(fade.is_present());
        assert!(shared.fade_target_db.load().abs() < 0.01);
    }
}
