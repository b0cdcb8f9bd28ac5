//! Retry backoff formula: `delay = min(base * 2^attempt, max) + uniform(0, base)`.

use crate::policy::RetryPolicy;
use rand::Rng;
use rand::rngs::StdRng;
use std::time::Duration;

/// Computes the delay before retrying `attempt` (0-indexed: the delay
/// before the *second* attempt is `calculate_delay(policy, 0, rng)`).
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, rng: &mut StdRng) -> Duration {
    let base_ms = policy.base_delay.as_millis() as u64;
    let max_ms = policy.max_delay.as_millis() as u64;

    let exp_ms = base_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX).max(1));
    let capped_ms = exp_ms.min(max_ms);

    let jitter_ms = if base_ms == 0 { 0 } else { rng.gen_range(0..=base_ms) };
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(5)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1000))
    }

    #[test]
    fn delay_grows_exponentially_before_cap() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = policy().with_base_delay(Duration::from_millis(0));
        // zero base delay removes jitter, isolating the exponential term
        assert_eq!(calculate_delay(&p, 0, &mut rng), Duration::from_millis(0));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = policy();
        // attempt 10 would be 100 * 2^10 = 102400ms, far past the 1000ms cap
        let d = calculate_delay(&p, 10, &mut rng);
        assert!(d <= Duration::from_millis(1000 + 100));
    }

    #[test]
    fn jitter_is_bounded_by_base_delay() {
        let p = policy();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let d = calculate_delay(&p, 0, &mut rng);
            // attempt 0: exp term == base (100ms), plus jitter in [0, base]
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn same_seed_is_deterministic() {
        let p = policy();
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        assert_eq!(calculate_delay(&p, 2, &mut rng_a), calculate_delay(&p, 2, &mut rng_b));
    }
}
