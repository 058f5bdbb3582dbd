// ============================================================
// Layer 5 — Noam Learning-Rate Schedule
// ============================================================
// Sec. 5.3 of the paper:
//
//   lr = multiplier · d_model^-0.5 · min(step^-0.5, step · warmup^-1.5)
//
// Linear warm-up for `warmup_steps` steps, then inverse
// square-root decay. `step` counts optimizer updates from 1.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoamScheduler {
    d_model:       usize,
    warmup_steps:  usize,
    lr_multiplier: f64,
    step:          usize,
}

impl NoamScheduler {
    pub fn new(d_model: usize, warmup_steps: usize, lr_multiplier: f64) -> Self {
        Self { d_model, warmup_steps, lr_multiplier, step: 0 }
    }

    /// Continue a schedule that already performed `step` updates.
    pub fn resume(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Advance by one update and return the rate to use for it.
    pub fn step(&mut self) -> f64 {
        self.step += 1;
        self.rate_at(self.step)
    }

    /// Rate of the most recent update (0 before the first one).
    pub fn current(&self) -> f64 {
        if self.step == 0 { 0.0 } else { self.rate_at(self.step) }
    }

    pub fn steps_taken(&self) -> usize {
        self.step
    }

    pub fn rate_at(&self, step: usize) -> f64 {
        let step  = step.max(1) as f64;
        let decay = step.powf(-0.5);
        let factor = if self.warmup_steps == 0 {
            decay
        } else {
            decay.min(step * (self.warmup_steps as f64).powf(-1.5))
        };
        self.lr_multiplier * (self.d_model as f64).powf(-0.5) * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_is_linear() {
        let s = NoamScheduler::new(512, 4000, 1.0);
        let r1 = s.rate_at(1);
        let r10 = s.rate_at(10);
        assert!((r10 / r1 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_peak_at_warmup_end() {
        let s = NoamScheduler::new(512, 4000, 1.0);
        let peak = s.rate_at(4000);
        assert!(s.rate_at(3999) < peak);
        assert!(s.rate_at(4001) < peak);
        let expected = 512f64.powf(-0.5) * 4000f64.powf(-0.5);
        assert!((peak - expected).abs() < 1e-12);
    }

    #[test]
    fn test_multiplier_scales_rate() {
        let base   = NoamScheduler::new(64, 10, 1.0).rate_at(7);
        let scaled = NoamScheduler::new(64, 10, 2.5).rate_at(7);
        assert!((scaled - 2.5 * base).abs() < 1e-12);
    }

    #[test]
    fn test_zero_warmup_is_inverse_sqrt() {
        let s = NoamScheduler::new(16, 0, 1.0);
        assert!((s.rate_at(4) - 0.25 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_step_and_resume_continue_schedule() {
        let mut fresh = NoamScheduler::new(32, 5, 1.0);
        assert_eq!(fresh.current(), 0.0);
        for _ in 0..3 {
            fresh.step();
        }
        let mut resumed = NoamScheduler::new(32, 5, 1.0).resume(3);
        assert_eq!(resumed.current(), fresh.current());
        assert_eq!(resumed.step(), fresh.step());
        assert_eq!(resumed.steps_taken(), 4);
    }
}
