use crate::config::Config;
use crate::error::{ErrorKind, PipelineError, Result};
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
    /// Kinds that are caught and retried. Empty catches everything.
    pub retry_on: Vec<ErrorKind>,
    pub raise_on_exhaustion: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
            retry_on: Vec::new(),
            raise_on_exhaustion: false,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_retries: cfg.job.max_retries,
            delay: Duration::from_millis(cfg.job.retry_delay_ms),
            retry_on: cfg.job.retry_on.clone(),
            raise_on_exhaustion: cfg.job.raise_on_exhaustion,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn retry_only(mut self, kinds: &[ErrorKind]) -> Self {
        self.retry_on = kinds.to_vec();
        self
    }

    pub fn raise_on_exhaustion(mut self, raise: bool) -> Self {
        self.raise_on_exhaustion = raise;
        self
    }

    pub fn catches(&self, err: &PipelineError) -> bool {
        self.retry_on.is_empty() || self.retry_on.contains(&err.kind())
    }

    pub fn run<T, F>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut attempt = 0u32;
        loop {
            match f(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if !self.catches(&err) => return Err(err),
                Err(err) => {
                    error!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        kind = ?err.kind(),
                        "{operation} failed: {err}"
                    );
                    if attempt >= self.max_retries {
                        return Err(err);
                    }
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Like [`RetryPolicy::run`], but a caught error that survives every
    /// attempt yields `fallback` unless `raise_on_exhaustion` is set.
    pub fn run_or<T, F>(&self, operation: &str, fallback: T, f: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        match self.run(operation, f) {
            Ok(value) => Ok(value),
            Err(err) if self.catches(&err) && !self.raise_on_exhaustion => {
                warn!(operation, "retries exhausted, using fallback");
                Ok(fallback)
            }
            Err(err) => Err(err),
        }
    }
}
