use std::time::Duration;

use tokio::time::Instant;

use ollama_kit::{retry, Error, ErrorKind, Result, RetryPolicy};

/// Delays between consecutive attempts.
fn gaps(attempts: &[Instant]) -> Vec<Duration> {
    attempts.windows(2).map(|w| w[1] - w[0]).collect()
}

fn assert_close(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual <= expected + Duration::from_millis(5),
        "expected ~{expected:?}, got {actual:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_transient_failures() -> Result<()> {
    let mut attempts = Vec::new();
    let value = retry(&RetryPolicy::default(), || {
        attempts.push(Instant::now());
        let attempt = attempts.len();
        async move {
            if attempt < 3 {
                Err(Error::network("connection refused"))
            } else {
                Ok(attempt)
            }
        }
    })
    .await?;

    assert_eq!(value, 3);
    assert_eq!(attempts.len(), 3);
    let gaps = gaps(&attempts);
    assert_close(gaps[0], Duration::from_millis(500));
    assert_close(gaps[1], Duration::from_millis(1000));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_returns_last_error_when_attempts_run_out() {
    let mut attempts = Vec::new();
    let result: Result<()> = retry(&RetryPolicy::default(), || {
        attempts.push(Instant::now());
        let attempt = attempts.len();
        async move { Err(Error::http(503, format!("busy #{attempt}"))) }
    })
    .await;

    let err = result.unwrap_err();
    assert!(matches!(&err, Error::Http { status: 503, message, .. } if message == "busy #3"));
    assert_eq!(attempts.len(), 3);
    assert_close(attempts[2] - attempts[0], Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_errors_short_circuit() {
    let permanent = [
        Error::invalid_request("bad options"),
        Error::not_found("llama3.2", "model not found"),
        Error::serialization("garbled"),
        Error::unsupported("does not support tools"),
        Error::http(401, "unauthorized"),
    ];

    for error in permanent {
        let kind = error.kind();
        let mut error = Some(error);
        let mut calls = 0;
        let started = Instant::now();

        let result: Result<()> = retry(&RetryPolicy::default(), || {
            calls += 1;
            let error = error.take().unwrap_or_else(|| Error::unknown("called twice"));
            async move { Err(error) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), kind);
        assert_eq!(calls, 1, "{kind:?} was retried");
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_and_unknown_faults_are_retried() {
    for error in [Error::timeout("read timed out"), Error::unknown("???")] {
        let kind = error.kind();
        let mut error = Some(error);
        let mut calls = 0;

        let result = retry(&RetryPolicy::default(), || {
            calls += 1;
            let outcome = match error.take() {
                Some(error) => Err(error),
                None => Ok(calls),
            };
            async move { outcome }
        })
        .await;

        assert_eq!(result.unwrap(), 2, "{kind:?} was not retried");
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy() {
    let mut calls = 0;
    let result: Result<()> = retry(&RetryPolicy::none(), || {
        calls += 1;
        async { Err(Error::network("connection reset")) }
    })
    .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Network);
    assert_eq!(calls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_custom_backoff_schedule() -> Result<()> {
    let policy = RetryPolicy::default()
        .max_attempts(4)
        .initial_delay(Duration::from_millis(100))
        .backoff_factor(3.0);

    let mut attempts = Vec::new();
    retry(&policy, || {
        attempts.push(Instant::now());
        let attempt = attempts.len();
        async move {
            if attempt < 4 {
                Err(Error::timeout("read timed out"))
            } else {
                Ok(())
            }
        }
    })
    .await?;

    let gaps = gaps(&attempts);
    assert_eq!(gaps.len(), 3);
    assert_close(gaps[0], Duration::from_millis(100));
    assert_close(gaps[1], Duration::from_millis(300));
    assert_close(gaps[2], Duration::from_millis(900));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_zero_attempts_still_tries_once() -> Result<()> {
    let mut calls = 0;
    let value = retry(&RetryPolicy::default().max_attempts(0), || {
        calls += 1;
        async { Ok("ok") }
    })
    .await?;

    assert_eq!(value, "ok");
    assert_eq!(calls, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_overflowing_backoff_factor_saturates() -> Result<()> {
    for factor in [1e30, f64::INFINITY, f64::MAX] {
        let policy = RetryPolicy::default()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(500))
            .backoff_factor(factor);

        let mut attempts = Vec::new();
        let value = retry(&policy, || {
            attempts.push(Instant::now());
            let attempt = attempts.len();
            async move {
                if attempt < 2 {
                    Err(Error::network("connection refused"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await?;

        assert_eq!(value, 2, "factor {factor}");
        assert_close(gaps(&attempts)[0], Duration::from_millis(500));
    }
    Ok(())
}
