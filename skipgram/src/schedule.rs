/// Linear learning-rate decay, recomputed in steps.
///
/// Every `interval` processed pairs the rate is reset to
/// `initial * (1 - processed / total)`, but never below
/// `initial * min_fraction`. Between steps the rate is constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRateSchedule {
    initial: f32,
    interval: u64,
    total: u64,
    min_fraction: f32,
}

impl LearningRateSchedule {
    pub fn new(initial: f32, interval: u64, total: u64, min_fraction: f32) -> Self {
        assert!(interval > 0, "decay interval must be positive");
        LearningRateSchedule {
            initial,
            interval,
            total,
            min_fraction,
        }
    }

    pub fn initial(&self) -> f32 {
        self.initial
    }

    /// Planned number of pairs.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// The lowest rate this schedule ever returns.
    pub fn floor(&self) -> f32 {
        self.initial * self.min_fraction
    }

    /// Rate in effect once `processed` pairs have been consumed.
    pub fn rate_at(&self, processed: u64) -> f32 {
        let stepped = processed / self.interval * self.interval;
        let progress = stepped as f64 / (self.total.max(1)) as f64;
        let rate = self.initial * (1.0 - progress as f32);
        rate.max(self.floor())
    }

    /// True when going from `before` to `after` pairs crosses a step.
    pub fn crosses_step(&self, before: u64, after: u64) -> bool {
        before / self.interval != after / self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_within_an_interval() {
        let s = LearningRateSchedule::new(0.025, 100, 1000, 0.01);
        assert_eq!(s.rate_at(0), 0.025);
        assert_eq!(s.rate_at(99), 0.025);
        assert!((s.rate_at(100) - 0.0225).abs() < 1e-7);
        assert_eq!(s.rate_at(150), s.rate_at(100));
        assert!(s.crosses_step(99, 100));
        assert!(!s.crosses_step(100, 199));
    }

    #[test]
    fn floor_holds_past_the_end() {
        let s = LearningRateSchedule::new(0.025, 10, 100, 0.01);
        for processed in (0..10_000).step_by(7) {
            assert!(s.rate_at(processed) >= s.floor());
        }
        assert_eq!(s.rate_at(5_000), s.floor());
    }
}
