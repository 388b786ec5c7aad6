//! CLI Exit Code Registry
//!
//! Single source of truth for `crunch` exit codes. Scripts rely on them.
//!
//! | Range   | Domain        | Description                               |
//! |---------|---------------|-------------------------------------------|
//! | 0       | Universal     | Success                                   |
//! | 1       | Universal     | General error (unspecified)               |
//! | 2       | Universal     | Usage error (bad args, missing verifier)  |
//! | 3       | Config        | Config file unreadable or invalid         |
//! | 10-19   | auth          | Authorization handshake                   |
//! | 20-29   | api           | Remote API failures                       |
//! | 30-39   | ledger        | VAT classification, attachments           |

use crunch_client::{CrunchError, TransportError};

// =============================================================================
// Universal (0-3)
// =============================================================================

pub const EXIT_SUCCESS: u8 = 0;

/// General error. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

pub const EXIT_USAGE: u8 = 2;

/// Config file unreadable, unparsable, or missing required options.
pub const EXIT_CONFIG: u8 = 3;

// =============================================================================
// Auth (10-19)
// =============================================================================

/// Request token refused (bad consumer key/secret, wrong auth endpoint).
pub const EXIT_AUTH_REQUEST: u8 = 10;

/// Verifier rejected or expired.
pub const EXIT_AUTH_VERIFY: u8 = 11;

/// No access token configured.
pub const EXIT_NOT_AUTH: u8 = 12;

// =============================================================================
// API (20-29)
// =============================================================================

/// Access token rejected (401/403).
pub const EXIT_API_AUTH: u8 = 20;

/// Request rejected (other 4xx).
pub const EXIT_API_VALIDATION: u8 = 21;

/// 5xx or network failure.
pub const EXIT_API_UPSTREAM: u8 = 22;

/// Response body was not what we expected.
pub const EXIT_API_DECODE: u8 = 23;

// =============================================================================
// Ledger (30-39)
// =============================================================================

/// Expense type in neither VAT table.
pub const EXIT_VAT_UNKNOWN: u8 = 30;

/// Receipt file unreadable.
pub const EXIT_ATTACHMENT: u8 = 31;

/// Map a client error to its exit code.
pub fn crunch_exit_code(err: &CrunchError) -> u8 {
    match err {
        CrunchError::AuthorizationRequest(_) => EXIT_AUTH_REQUEST,
        CrunchError::Verification(_) | CrunchError::NoPendingAuthorization => EXIT_AUTH_VERIFY,
        CrunchError::NotAuthenticated => EXIT_NOT_AUTH,
        CrunchError::UnknownVatClassification(_) => EXIT_VAT_UNKNOWN,
        CrunchError::InvalidQuantity(_) => EXIT_USAGE,
        CrunchError::Attachment(_) => EXIT_ATTACHMENT,
        CrunchError::Decode(_) => EXIT_API_DECODE,
        CrunchError::Config(_) => EXIT_CONFIG,
        CrunchError::SnapshotNotLoaded(_) => EXIT_ERROR,
        CrunchError::Transport(e) => transport_exit_code(e),
    }
}

pub fn transport_exit_code(err: &TransportError) -> u8 {
    match err {
        TransportError::Http { status: 401 | 403, .. } => EXIT_API_AUTH,
        TransportError::Http { status, .. } if *status < 500 => EXIT_API_VALIDATION,
        TransportError::Http { .. } | TransportError::Network(_) => EXIT_API_UPSTREAM,
        TransportError::Json(_) => EXIT_API_DECODE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        let http = |status| CrunchError::Transport(TransportError::Http { status, body: String::new() });
        assert_eq!(crunch_exit_code(&http(401)), EXIT_API_AUTH);
        assert_eq!(crunch_exit_code(&http(403)), EXIT_API_AUTH);
        assert_eq!(crunch_exit_code(&http(422)), EXIT_API_VALIDATION);
        assert_eq!(crunch_exit_code(&http(502)), EXIT_API_UPSTREAM);
    }

    #[test]
    fn test_auth_codes() {
        assert_eq!(crunch_exit_code(&CrunchError::NotAuthenticated), EXIT_NOT_AUTH);
        assert_eq!(crunch_exit_code(&CrunchError::Verification("x".into())), EXIT_AUTH_VERIFY);
        assert_eq!(
            crunch_exit_code(&CrunchError::UnknownVatClassification("X".into())),
            EXIT_VAT_UNKNOWN
        );
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_CONFIG,
            EXIT_AUTH_REQUEST,
            EXIT_AUTH_VERIFY,
            EXIT_NOT_AUTH,
            EXIT_API_AUTH,
            EXIT_API_VALIDATION,
            EXIT_API_UPSTREAM,
            EXIT_API_DECODE,
            EXIT_VAT_UNKNOWN,
            EXIT_ATTACHMENT,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
