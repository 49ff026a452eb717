// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exponential backoff for platform calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::PlatformError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl PlatformError {
	/// Transport failures, throttling and server-side errors are worth another try.
	pub fn is_retryable(&self) -> bool {
		match self {
			PlatformError::Http(err) => err.is_timeout() || err.is_connect(),
			PlatformError::Status { status, .. } => *status == 429 || *status >= 500,
			_ => false,
		}
	}
}

fn delay_for(cfg: &RetryConfig, attempt: u32) -> Duration {
	let exponential = cfg.base_delay.as_secs_f64() * cfg.backoff_factor.powi(attempt as i32);
	let capped = exponential.min(cfg.max_delay.as_secs_f64());

	let delay = if cfg.jitter {
		capped * (0.5 + fastrand::f64())
	} else {
		capped
	};

	Duration::from_secs_f64(delay)
}

pub async fn retry<F, Fut, T>(cfg: &RetryConfig, mut f: F) -> Result<T, PlatformError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, PlatformError>>,
{
	let mut attempt = 0;

	loop {
		match f().await {
			Ok(value) => return Ok(value),
			Err(err) => {
				attempt += 1;

				if !err.is_retryable() || attempt >= cfg.max_attempts {
					return Err(err);
				}

				let delay = delay_for(cfg, attempt - 1);
				warn!(
					error = %err,
					attempt,
					max_attempts = cfg.max_attempts,
					delay_ms = delay.as_millis() as u64,
					"retrying platform call"
				);
				tokio::time::sleep(delay).await;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	fn fast() -> RetryConfig {
		RetryConfig {
			max_attempts: 3,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(5),
			backoff_factor: 2.0,
			jitter: false,
		}
	}

	#[tokio::test]
	async fn client_errors_are_not_retried() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		let result: Result<(), _> = retry(&fast(), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(PlatformError::Status {
					status: 401,
					message: "unauthorized".into(),
				})
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn server_errors_stop_at_max_attempts() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		let result: Result<(), _> = retry(&fast(), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(PlatformError::Status {
					status: 503,
					message: "busy".into(),
				})
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn recovers_after_throttling() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		let result = retry(&fast(), || {
			let counter = Arc::clone(&counter);
			async move {
				if counter.fetch_add(1, Ordering::SeqCst) == 0 {
					Err(PlatformError::Status {
						status: 429,
						message: "slow down".into(),
					})
				} else {
					Ok("ok")
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), "ok");
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn delay_is_capped() {
		let cfg = fast();
		assert_eq!(delay_for(&cfg, 0), Duration::from_millis(1));
		assert_eq!(delay_for(&cfg, 10), Duration::from_millis(5));
	}
}
