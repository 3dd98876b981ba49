//! Bearer-token authentication (spec §1, §6: OTP/SMS auth is an external
//! collaborator, out of scope — this is only the named interface the
//! session bus calls at handshake and on each event).

use uuid::Uuid;

pub trait AuthProvider: Send + Sync {
    /// Validates a bearer token, returning the authenticated user id.
    fn validate(&self, token: &str) -> Option<Uuid>;
}

/// Test/dev implementation: the token IS the user id. A real deployment
/// swaps this for a collaborator that checks a session store issued by
/// the OTP/SMS auth service.
pub struct OpaqueTokenAuth;

impl AuthProvider for OpaqueTokenAuth {
    fn validate(&self, token: &str) -> Option<Uuid> {
        Uuid::parse_str(token).ok()
    }
}
