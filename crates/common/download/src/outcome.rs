use crate::error::FetchError;
use std::path::PathBuf;

/// A snapshot that has been completely downloaded and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub path: PathBuf,
    pub size: u64,
    pub looks_like_xml: bool,
}

/// What to do with a download that could not be completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Report the failure but let the run end as a no-op.
    #[default]
    Soft,
    /// Propagate the failure to the caller.
    Strict,
}

impl From<bool> for FailureMode {
    fn from(soft_fail: bool) -> Self {
        if soft_fail {
            FailureMode::Soft
        } else {
            FailureMode::Strict
        }
    }
}

/// Result of a single fetch invocation.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(SnapshotFile),
    SoftFailure(FetchError),
    HardFailure(FetchError),
}

impl FetchOutcome {
    /// Applies the soft-fail gate to the result of a download.
    ///
    /// Configuration errors are always hard failures, whatever the mode.
    pub fn classify(result: Result<SnapshotFile, FetchError>, mode: FailureMode) -> Self {
        match result {
            Ok(snapshot) => FetchOutcome::Success(snapshot),
            Err(err) if err.is_configuration_error() => FetchOutcome::HardFailure(err),
            Err(err) => match mode {
                FailureMode::Soft => FetchOutcome::SoftFailure(err),
                FailureMode::Strict => FetchOutcome::HardFailure(err),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// Only hard failures are returned as errors.
    pub fn into_result(self) -> Result<Option<SnapshotFile>, FetchError> {
        match self {
            FetchOutcome::Success(snapshot) => Ok(Some(snapshot)),
            FetchOutcome::SoftFailure(_) => Ok(None),
            FetchOutcome::HardFailure(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    fn snapshot() -> SnapshotFile {
        SnapshotFile {
            path: "data/upload_20240309_070501.xml".into(),
            size: 42,
            looks_like_xml: true,
        }
    }

    #[test_case(FailureMode::Soft)]
    #[test_case(FailureMode::Strict)]
    fn success_is_success_in_any_mode(mode: FailureMode) {
        let outcome = FetchOutcome::classify(Ok(snapshot()), mode);

        assert!(outcome.is_success());
        assert_eq!(outcome.into_result().unwrap(), Some(snapshot()));
    }

    #[test]
    fn soft_mode_swallows_runtime_errors() {
        let outcome = FetchOutcome::classify(Err(FetchError::EmptyPayload), FailureMode::Soft);

        assert_matches!(outcome, FetchOutcome::SoftFailure(FetchError::EmptyPayload));
        assert_matches!(outcome.into_result(), Ok(None));
    }

    #[test]
    fn strict_mode_propagates_runtime_errors() {
        let outcome = FetchOutcome::classify(Err(FetchError::EmptyPayload), FailureMode::Strict);

        assert_matches!(outcome.into_result(), Err(FetchError::EmptyPayload));
    }

    #[test_case(FailureMode::Soft)]
    #[test_case(FailureMode::Strict)]
    fn empty_payload_is_never_a_success(mode: FailureMode) {
        let outcome = FetchOutcome::classify(Err(FetchError::EmptyPayload), mode);

        assert!(!outcome.is_success());
        assert_matches!(outcome.into_result(), Ok(None) | Err(FetchError::EmptyPayload));
    }

    #[test_case(FailureMode::Soft)]
    #[test_case(FailureMode::Strict)]
    fn configuration_errors_are_always_hard(mode: FailureMode) {
        let err = FetchError::MissingCredential { field: "password" };
        let outcome = FetchOutcome::classify(Err(err), mode);

        assert_matches!(
            outcome,
            FetchOutcome::HardFailure(FetchError::MissingCredential { field: "password" })
        );
    }

    #[test]
    fn soft_fail_flag_maps_to_mode() {
        assert_eq!(FailureMode::from(true), FailureMode::Soft);
        assert_eq!(FailureMode::from(false), FailureMode::Strict);
        assert_eq!(FailureMode::default(), FailureMode::Soft);
    }
}
