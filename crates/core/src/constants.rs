//! Constants used throughout the consultation core.

/// Values that stored payloads use to mean "no organisation".
pub const DEFAULT_NO_ORGANISATION_PLACEHOLDERS: &[&str] = &["无", "none", "null"];

/// Label given to fragments whose owner cannot be resolved.
pub const DEFAULT_UNKNOWN_ORGANISATION_LABEL: &str = "unknown organisation";

/// Upper bound on triples accepted in a single share.
pub const DEFAULT_MAX_TRIPLES_PER_SHARE: usize = 500;

/// Maximum characters in opinion, diagnosis and treatment text.
pub const MAX_OPINION_TEXT_CHARS: usize = 10_000;

/// Maximum characters in a request description.
pub const MAX_DESCRIPTION_CHARS: usize = 2_000;

/// Version assigned to a newly created request.
pub const INITIAL_REQUEST_VERSION: u64 = 1;
