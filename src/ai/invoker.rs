use std::time::Duration;

use super::provider::Completion;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of calls, including the first. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Pause after the failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Outcome of a retried backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Completed(String),
    Exhausted { attempts: u32, last_error: String },
}

impl Invocation {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed(text) => Some(text),
            Self::Exhausted { .. } => None,
        }
    }
}

pub struct ResilientInvoker<C> {
    completion: C,
    policy: RetryPolicy,
}

impl<C: Completion> ResilientInvoker<C> {
    pub fn new(completion: C, policy: RetryPolicy) -> Self {
        Self { completion, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call the backend until it succeeds or the attempt budget is spent.
    /// Failures never escape; they end up in [`Invocation::Exhausted`].
    pub async fn invoke(&self, prompt: &str) -> Invocation {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            match self.completion.complete(prompt).await {
                Ok(text) => return Invocation::Completed(text),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "backend call failed"
                    );
                    last_error = e.to_string();
                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(self.policy.delay_for(attempt)).await;
                    }
                }
            }
        }

        Invocation::Exhausted {
            attempts: max_attempts,
            last_error,
        }
    }
}
