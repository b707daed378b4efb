//! Delayed replies for chat front ends that want to simulate typing time.
//!
//! The reply is computed synchronously when the method is called; only its
//! delivery is delayed. Enabled with the `async` feature.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::session::ElizaSession;

/// How long to wait before delivering a reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delay {
    /// Always wait this many seconds.
    Fixed(f64),
    /// Wait a uniformly drawn number of seconds in `[min, max)`.
    Range(f64, f64),
}

impl Default for Delay {
    fn default() -> Self {
        Delay::Range(1.0, 3.0)
    }
}

impl Delay {
    /// Resolve to a concrete duration. Negative or non-finite values mean no
    /// delay.
    pub fn duration(&self) -> Duration {
        let secs = match *self {
            Delay::Fixed(secs) => secs,
            Delay::Range(min, max) if max > min => rand::thread_rng().gen_range(min..max),
            Delay::Range(min, _) => min,
        };
        if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        }
    }
}

/// Resolve `value` after `delay`.
pub async fn deliver<T>(value: T, delay: Delay) -> T {
    sleep(delay.duration()).await;
    value
}

impl ElizaSession {
    /// [`transform`](Self::transform), delivered after `delay`.
    pub fn transform_delayed(
        &mut self,
        text: &str,
        delay: Delay,
    ) -> impl Future<Output = String> + Send + 'static {
        deliver(self.transform(text), delay)
    }

    /// [`get_initial`](Self::get_initial), delivered after `delay`.
    pub fn get_initial_delayed(
        &mut self,
        delay: Delay,
    ) -> impl Future<Output = String> + Send + 'static {
        deliver(self.get_initial(), delay)
    }

    /// [`get_final`](Self::get_final), delivered after `delay`.
    pub fn get_final_delayed(
        &mut self,
        delay: Delay,
    ) -> impl Future<Output = String> + Send + 'static {
        deliver(self.get_final(), delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_bounds() {
        assert_eq!(Delay::Fixed(0.5).duration(), Duration::from_millis(500));
        assert_eq!(Delay::Fixed(-1.0).duration(), Duration::ZERO);
        assert_eq!(Delay::Fixed(f64::NAN).duration(), Duration::ZERO);
        assert_eq!(Delay::Range(2.0, 2.0).duration(), Duration::from_secs(2));
        for _ in 0..50 {
            let d = Delay::default().duration();
            assert!(d >= Duration::from_secs(1) && d < Duration::from_secs(3));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_waits() {
        let start = tokio::time::Instant::now();
        let value = deliver("reply", Delay::Fixed(2.0)).await;
        assert_eq!(value, "reply");
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
