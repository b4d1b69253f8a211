//! Envelope-to-gain curve engine
//!
//! Converts a loudness envelope into a per-sample gain stream for upward
//! compression: everything quieter than the working floor receives a fixed
//! boost, everything at or above the floor is driven to the ceiling and no
//! further, with a quadratic soft knee around the corner. The gain
//! trajectory is smoothed with one-pole attack/release filters so level
//! steps do not click.

use crest_core::units::{db_to_gain, gain_to_db};

/// Attack time of the gain smoother (boost falling on loud material)
const ATTACK_MS: f32 = 5.0;
/// Release time of the gain smoother (boost recovering on quiet material)
const RELEASE_MS: f32 = 2.0;

/// Batch gain computer for one channel
///
/// Configured once per channel with that channel's reference level
/// (`ceiling`), the dynamic range of the compressor and the knee width.
/// State carries across [`GainCurve::compute_gain`] calls; create a fresh
/// instance per channel and per pass.
pub struct GainCurve {
    ceiling_db: f32,
    floor_db: f32,
    boost_db: f32,
    knee_db: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain in dB, starts at unity
    state_db: f32,
}

impl GainCurve {
    /// Create a gain computer
    ///
    /// * `ceiling` - linear reference level the output envelope may not
    ///   exceed
    /// * `range_db` - dynamic range of the upward compressor; the working
    ///   floor sits `range_db + 3` dB below the ceiling
    /// * `knee_db` - width of the soft knee around the floor corner
    pub fn new(sample_rate: u32, ceiling: f32, range_db: f32, knee_db: f32) -> Self {
        let ceiling_db = gain_to_db(ceiling.max(0.0));
        let boost_db = range_db.abs() + 3.0;

        let sr = sample_rate.max(1) as f32;
        let attack_samples = ATTACK_MS * sr / 1000.0;
        let release_samples = RELEASE_MS * sr / 1000.0;

        Self {
            ceiling_db,
            floor_db: ceiling_db - boost_db,
            boost_db,
            knee_db: knee_db.abs(),
            attack_coeff: (-1.0 / attack_samples).exp(),
            release_coeff: (-1.0 / release_samples).exp(),
            state_db: 0.0,
        }
    }

    /// Static transfer curve: envelope level in dB to output level in dB
    #[inline]
    fn curve_db(&self, x_db: f32) -> f32 {
        let half = self.knee_db * 0.5;
        if x_db <= self.floor_db - half {
            // Below the floor: constant boost
            x_db + self.boost_db
        } else if x_db >= self.floor_db + half || self.knee_db <= 0.0 {
            // At or above the floor: pinned to the ceiling
            self.ceiling_db
        } else {
            // Soft knee: slope blends from 1 to 0 across the knee width
            let t = x_db - (self.floor_db - half);
            x_db + self.boost_db - (t * t) / (2.0 * self.knee_db)
        }
    }

    /// Convert an envelope stream into per-sample gain multipliers
    ///
    /// Writes `min(gain.len(), envelope.len())` values. The produced gain,
    /// multiplied with the envelope, never exceeds the ceiling once the
    /// smoother has settled.
    pub fn compute_gain(&mut self, gain: &mut [f32], envelope: &[f32]) {
        let count = gain.len().min(envelope.len());
        for i in 0..count {
            let x_db = gain_to_db(envelope[i].abs());
            let target_db = if x_db.is_finite() {
                self.curve_db(x_db) - x_db
            } else {
                // Silent envelope: the curve bottoms out at the full boost
                self.boost_db
            };

            let coeff = if target_db < self.state_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.state_db = coeff * self.state_db + (1.0 - coeff) * target_db;
            gain[i] = db_to_gain(self.state_db);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_gets_the_full_boost() {
        let mut curve = GainCurve::new(48_000, 0.5, 6.0, 3.0);
        let env = vec![0.0_f32; 4800];
        let mut gain = vec![0.0_f32; 4800];
        curve.compute_gain(&mut gain, &env);
        // Steady state after the release smoother settles: +9 dB
        let expected = db_to_gain(9.0);
        assert!((gain[4799] - expected).abs() < 1e-3);
    }

    #[test]
    fn envelope_at_ceiling_is_unity() {
        let mut curve = GainCurve::new(48_000, 0.5, 6.0, 0.0);
        let env = vec![0.5_f32; 4800];
        let mut gain = vec![0.0_f32; 4800];
        curve.compute_gain(&mut gain, &env);
        assert!((gain[4799] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn output_never_exceeds_ceiling() {
        let ceiling = 0.25_f32;
        let mut curve = GainCurve::new(48_000, ceiling, 6.0, 3.0);
        // Step the envelope through the operating range, holding each level
        // long enough for the smoother to settle
        let plateau = 4800;
        let levels = [0.01_f32, 0.05, 0.1, 0.25, 0.5, 0.9];
        let env: Vec<f32> = levels
            .iter()
            .flat_map(|&level| std::iter::repeat(level).take(plateau))
            .collect();
        let mut gain = vec![0.0_f32; env.len()];
        curve.compute_gain(&mut gain, &env);
        // In the settled tail of each plateau, envelope × gain stays capped
        for (l, _) in levels.iter().enumerate() {
            for i in (l * plateau + plateau - 1000)..(l + 1) * plateau {
                let out = env[i] * gain[i];
                assert!(
                    out <= ceiling * 1.01,
                    "out = {out} at i = {i}, ceiling = {ceiling}"
                );
            }
        }
    }

    #[test]
    fn quiet_levels_are_raised_not_lowered() {
        let mut curve = GainCurve::new(48_000, 1.0, 6.0, 3.0);
        let env = vec![0.01_f32; 4800];
        let mut gain = vec![0.0_f32; 4800];
        curve.compute_gain(&mut gain, &env);
        assert!(gain[4799] > 1.0);
    }

    #[test]
    fn knee_is_continuous_at_both_edges() {
        let curve = GainCurve::new(48_000, 1.0, 6.0, 4.0);
        let floor = curve.floor_db;
        let eps = 1e-3;
        let below = curve.curve_db(floor - 2.0 - eps);
        let enter = curve.curve_db(floor - 2.0 + eps);
        assert!((below - enter).abs() < 0.01);
        let exit = curve.curve_db(floor + 2.0 - eps);
        let above = curve.curve_db(floor + 2.0 + eps);
        assert!((exit - above).abs() < 0.01);
    }

    #[test]
    fn compute_gain_respects_shorter_destination() {
        let mut curve = GainCurve::new(48_000, 1.0, 6.0, 3.0);
        let env = vec![0.1_f32; 100];
        let mut gain = vec![0.0_f32; 10];
        curve.compute_gain(&mut gain, &env);
        assert!(gain.iter().all(|&g| g > 0.0));
    }
}
