//! Exponential-decay route dampener.
//!
//! A loose implementation of route dampening in the style of BGP
//! (RFC 2439). Deploying dampening inside a routing mesh is generally
//! inadvisable because of propagation effects; applied only at the edge,
//! on this node's own gateway role, it works well: a flapping uplink
//! accumulates penalty until the gateway role is suppressed, and sustained
//! stability decays the penalty until the role is reusable.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::ConfigError;

/// Dampener thresholds and decay parameters.
#[derive(Debug, Clone)]
pub struct DampenerConfig {
    /// Penalty units added on each flap.
    pub penalty: u32,
    /// Figure-of-merit at or above which the route is suppressed.
    pub suppress_limit: u32,
    /// Figure-of-merit at or below which a suppressed route is reusable.
    pub reuse_limit: u32,
    /// Half-life of the exponential decay.
    pub half_life: Duration,
    /// Hard cap on the figure-of-merit.
    pub max_suppress_limit: u32,
}

impl Default for DampenerConfig {
    fn default() -> Self {
        Self {
            penalty: 1000,
            suppress_limit: 2000,
            reuse_limit: 750,
            half_life: Duration::from_secs(60),
            max_suppress_limit: 20_000,
        }
    }
}

impl DampenerConfig {
    /// Check that the thresholds are logically consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.penalty == 0 {
            return Err(ConfigError::ZeroPenalty);
        }
        if self.half_life.is_zero() {
            return Err(ConfigError::ZeroHalfLife);
        }
        if self.reuse_limit >= self.suppress_limit {
            return Err(ConfigError::ReuseAboveSuppress {
                reuse: self.reuse_limit,
                suppress: self.suppress_limit,
            });
        }
        if self.suppress_limit > self.max_suppress_limit {
            return Err(ConfigError::SuppressAboveCap {
                suppress: self.suppress_limit,
                cap: self.max_suppress_limit,
            });
        }
        Ok(())
    }
}

/// A state transition reported by the dampener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DampenerEvent {
    /// The figure-of-merit crossed the suppress limit.
    Suppressed,
    /// The figure-of-merit decayed below the reuse limit.
    Reused,
}

/// Exponential-decay penalty accumulator for one monitored target.
///
/// The figure-of-merit decays continuously with the configured half-life;
/// it is recomputed on every observation, so there is no decay timer.
#[derive(Debug)]
pub struct RouteDampener {
    config: DampenerConfig,
    /// Figure-of-merit: the penalty accumulator.
    fom: f64,
    last_update: Instant,
    suppressed: bool,
}

impl RouteDampener {
    pub fn new(config: DampenerConfig, now: Instant) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            fom: 0.0,
            last_update: now,
            suppressed: false,
        })
    }

    /// Decay the figure-of-merit for the time elapsed since the last
    /// observation, capping at the configured maximum.
    fn decay(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_update);
        if !dt.is_zero() {
            let halves = dt.as_secs_f64() / self.config.half_life.as_secs_f64();
            self.fom *= 0.5f64.powf(halves);
        }
        self.fom = self.fom.min(f64::from(self.config.max_suppress_limit));
        self.last_update = now;
    }

    /// Record one flap of the monitored target.
    ///
    /// Returns [`DampenerEvent::Suppressed`] when this flap pushed the
    /// figure-of-merit over the suppress limit.
    pub fn flap(&mut self, now: Instant) -> Option<DampenerEvent> {
        self.decay(now);
        self.fom = (self.fom + f64::from(self.config.penalty))
            .min(f64::from(self.config.max_suppress_limit));
        debug!(fom = self.fom, "route dampener received flap");

        if !self.suppressed && self.fom >= f64::from(self.config.suppress_limit) {
            self.suppressed = true;
            info!(fom = self.fom, "route dampener suppressing route");
            return Some(DampenerEvent::Suppressed);
        }
        None
    }

    /// Periodic reuse check.
    ///
    /// Returns [`DampenerEvent::Reused`] when a suppressed target decayed
    /// to or below the reuse limit.
    pub fn reuse_check(&mut self, now: Instant) -> Option<DampenerEvent> {
        self.decay(now);
        if self.suppressed && self.fom <= f64::from(self.config.reuse_limit) {
            self.suppressed = false;
            info!(fom = self.fom, "route dampener releasing route");
            return Some(DampenerEvent::Reused);
        }
        None
    }

    /// Current figure-of-merit, decayed to `now`.
    pub fn figure_of_merit(&mut self, now: Instant) -> f64 {
        self.decay(now);
        self.fom
    }

    /// Whether the target is currently suppressed.
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DampenerConfig {
        DampenerConfig {
            penalty: 1000,
            suppress_limit: 2000,
            reuse_limit: 500,
            half_life: Duration::from_secs(300),
            max_suppress_limit: 20_000,
        }
    }

    #[test]
    fn validation_rejects_inconsistent_limits() {
        let mut bad = config();
        bad.reuse_limit = 2000;
        assert_eq!(
            bad.validate(),
            Err(ConfigError::ReuseAboveSuppress {
                reuse: 2000,
                suppress: 2000
            })
        );

        let mut bad = config();
        bad.suppress_limit = 30_000;
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::SuppressAboveCap { .. })
        ));

        let mut bad = config();
        bad.penalty = 0;
        assert_eq!(bad.validate(), Err(ConfigError::ZeroPenalty));

        let mut bad = config();
        bad.half_life = Duration::ZERO;
        assert_eq!(bad.validate(), Err(ConfigError::ZeroHalfLife));

        assert!(config().validate().is_ok());
        assert!(RouteDampener::new(bad, Instant::now()).is_err());
    }

    #[test]
    fn repeated_flaps_suppress_once() {
        let t0 = Instant::now();
        let mut rd = RouteDampener::new(config(), t0).unwrap();

        // Three flaps within one second; with a 300 s half-life the decay
        // between them is negligible.
        assert_eq!(rd.flap(t0), None);
        assert_eq!(rd.flap(t0 + Duration::from_millis(500)), None);
        assert_eq!(
            rd.flap(t0 + Duration::from_secs(1)),
            Some(DampenerEvent::Suppressed)
        );
        assert!(rd.is_suppressed());

        let fom = rd.figure_of_merit(t0 + Duration::from_secs(1));
        assert!((fom - 3000.0).abs() < 15.0, "fom ≈ 3000, got {fom}");

        // Further flaps while suppressed report no new transition.
        assert_eq!(rd.flap(t0 + Duration::from_secs(2)), None);
    }

    #[test]
    fn stability_decays_to_reuse() {
        let t0 = Instant::now();
        let mut rd = RouteDampener::new(config(), t0).unwrap();
        rd.flap(t0);
        rd.flap(t0);
        rd.flap(t0);
        assert!(rd.is_suppressed());

        // Not yet: after one half-life fom ≈ 1500.
        assert_eq!(rd.reuse_check(t0 + Duration::from_secs(300)), None);
        assert!(rd.is_suppressed());

        // After three half-lives (900 s) fom ≈ 375 ≤ 500.
        assert_eq!(
            rd.reuse_check(t0 + Duration::from_secs(900)),
            Some(DampenerEvent::Reused)
        );
        assert!(!rd.is_suppressed());
        let fom = rd.figure_of_merit(t0 + Duration::from_secs(900));
        assert!((fom - 375.0).abs() < 5.0, "fom ≈ 375, got {fom}");

        // Reuse fires only on the transition.
        assert_eq!(rd.reuse_check(t0 + Duration::from_secs(901)), None);
    }

    #[test]
    fn half_life_halves_within_one_percent() {
        let t0 = Instant::now();
        let mut rd = RouteDampener::new(config(), t0).unwrap();
        rd.flap(t0);

        let before = rd.figure_of_merit(t0);
        let after = rd.figure_of_merit(t0 + config().half_life);
        assert!(
            (after - before / 2.0).abs() <= before / 2.0 * 0.01,
            "expected {after} within 1% of {}",
            before / 2.0
        );
    }

    #[test]
    fn figure_of_merit_is_capped() {
        let t0 = Instant::now();
        let mut cfg = config();
        cfg.max_suppress_limit = 2500;
        let mut rd = RouteDampener::new(cfg, t0).unwrap();

        for _ in 0..10 {
            rd.flap(t0);
        }
        assert!((rd.figure_of_merit(t0) - 2500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn suppress_boundary_is_inclusive() {
        let t0 = Instant::now();
        let mut cfg = config();
        cfg.penalty = 2000; // one flap lands exactly on the limit
        let mut rd = RouteDampener::new(cfg, t0).unwrap();
        assert_eq!(rd.flap(t0), Some(DampenerEvent::Suppressed));
    }

    #[test]
    fn reuse_boundary_is_inclusive() {
        let t0 = Instant::now();
        let mut cfg = config();
        cfg.penalty = 2000;
        cfg.reuse_limit = 1000;
        let mut rd = RouteDampener::new(cfg, t0).unwrap();
        rd.flap(t0);

        // Exactly one half-life: 2000 → 1000 == reuse limit.
        assert_eq!(
            rd.reuse_check(t0 + Duration::from_secs(300)),
            Some(DampenerEvent::Reused)
        );
    }

    #[test]
    fn unsuppressed_dampener_never_reports_reuse() {
        let t0 = Instant::now();
        let mut rd = RouteDampener::new(config(), t0).unwrap();
        rd.flap(t0);
        assert_eq!(rd.reuse_check(t0 + Duration::from_secs(3600)), None);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// For a fixed flap schedule, a longer half-life never yields a
        /// smaller figure-of-merit at observation time.
        #[test]
        fn fom_monotone_in_half_life(
            flap_offsets in proptest::collection::vec(0..600u64, 1..16),
            half_life_a in 10..600u64,
            half_life_b in 10..600u64,
            probe in 600..1200u64,
        ) {
            let (short, long) = if half_life_a <= half_life_b {
                (half_life_a, half_life_b)
            } else {
                (half_life_b, half_life_a)
            };

            let t0 = Instant::now();
            let run = |half_life: u64| {
                let mut rd = RouteDampener::new(
                    DampenerConfig {
                        penalty: 1000,
                        suppress_limit: 2000,
                        reuse_limit: 500,
                        half_life: Duration::from_secs(half_life),
                        max_suppress_limit: 1_000_000,
                    },
                    t0,
                )
                .unwrap();
                let mut offsets = flap_offsets.clone();
                offsets.sort_unstable();
                for off in offsets {
                    rd.flap(t0 + Duration::from_secs(off));
                }
                rd.figure_of_merit(t0 + Duration::from_secs(probe))
            };

            let fom_short = run(short);
            let fom_long = run(long);
            prop_assert!(
                fom_short <= fom_long + 1e-6,
                "fom with half-life {short}s ({fom_short}) exceeded {long}s ({fom_long})"
            );
        }

        /// Decay never produces a negative figure-of-merit and never
        /// exceeds the cap.
        #[test]
        fn fom_stays_in_range(
            flaps in 1..64usize,
            probe in 0..100_000u64,
        ) {
            let t0 = Instant::now();
            let cfg = DampenerConfig::default();
            let cap = f64::from(cfg.max_suppress_limit);
            let mut rd = RouteDampener::new(cfg, t0).unwrap();
            for _ in 0..flaps {
                rd.flap(t0);
            }
            let fom = rd.figure_of_merit(t0 + Duration::from_secs(probe));
            prop_assert!(fom >= 0.0);
            prop_assert!(fom <= cap);
        }
    }
}
