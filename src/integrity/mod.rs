//! Startup integrity verification.
//!
//! Every check runs exactly once, in the order supplied, whether or not an
//! earlier one failed. Failures are folded into a single error whose message
//! joins the individual messages with newlines.

use axum::BoxError;
use thiserror::Error;

/// A zero-argument self-test run before the service accepts traffic.
pub type IntegrityCheck = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

/// Box a closure as an [`IntegrityCheck`].
pub fn check<F, E>(f: F) -> IntegrityCheck
where
    F: FnOnce() -> Result<(), E> + Send + 'static,
    E: Into<BoxError>,
{
    Box::new(move || f().map_err(Into::into))
}

/// One or more integrity checks failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct IntegrityError {
    message: String,
}

impl IntegrityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The individual failure messages, in check order.
    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.message.split('\n')
    }
}

/// Run every check and aggregate the failures into an [`IntegrityError`].
pub fn verify<I>(checks: I) -> Result<(), IntegrityError>
where
    I: IntoIterator<Item = IntegrityCheck>,
{
    verify_with(checks, IntegrityError::new)
}

/// Run every check, building the aggregate error with `make_error`.
pub fn verify_with<I, E, F>(checks: I, make_error: F) -> Result<(), E>
where
    I: IntoIterator<Item = IntegrityCheck>,
    F: FnOnce(String) -> E,
{
    let failures: Vec<String> = checks
        .into_iter()
        .filter_map(|check| check().err())
        .map(|err| err.to_string())
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(make_error(failures.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn failing(message: &'static str) -> IntegrityCheck {
        check(move || Err::<(), _>(message))
    }

    fn passing() -> IntegrityCheck {
        check(|| Ok::<(), BoxError>(()))
    }

    #[test]
    fn no_checks_pass() {
        assert_eq!(verify(Vec::new()), Ok(()));
    }

    #[test]
    fn all_passing_checks_produce_no_error() {
        assert_eq!(verify(vec![passing(), passing()]), Ok(()));
    }

    #[test]
    fn failures_are_joined_in_call_order() {
        let err = verify(vec![
            failing("database url missing"),
            passing(),
            failing("jwt secret too short"),
        ])
        .unwrap_err();

        assert_eq!(err.to_string(), "database url missing\njwt secret too short");
        assert_eq!(
            err.failures().collect::<Vec<_>>(),
            vec!["database url missing", "jwt secret too short"]
        );
    }

    #[test]
    fn a_failure_does_not_stop_later_checks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = |fail: bool| {
            let calls = Arc::clone(&calls);
            check(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err::<(), _>("broken")
                } else {
                    Ok(())
                }
            })
        };

        let result = verify(vec![counted(true), counted(false), counted(true)]);

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn error_constructor_is_injected() {
        #[derive(Debug, PartialEq)]
        struct StartupAbort(String);

        let err = verify_with(vec![failing("cache unreachable")], StartupAbort).unwrap_err();
        assert_eq!(err, StartupAbort("cache unreachable".to_string()));
    }
}
