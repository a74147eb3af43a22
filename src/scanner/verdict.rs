use crate::config::EmptyScanPolicy;
use crate::types::Verdict;

/// Combine per-file verdicts into one safety decision
///
/// Safe only if every verdict completed with zero malicious and zero
/// suspicious detections. With no verdicts at all (nothing to scan, or every
/// submission failed) `empty_policy` decides.
pub fn aggregate(verdicts: &[Verdict], empty_policy: EmptyScanPolicy) -> bool {
    if verdicts.is_empty() {
        return empty_policy == EmptyScanPolicy::Safe;
    }
    verdicts.iter().all(Verdict::is_clean)
}
