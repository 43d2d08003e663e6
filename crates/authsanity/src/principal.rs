//! Reserved principals.

/// Every request carries this principal, authenticated or not.
pub const EVERYONE: &str = "system.Everyone";

/// Carried by every request that resolved to a real user.
pub const AUTHENTICATED: &str = "system.Authenticated";

/// Returns `None` when `principal` is one of the reserved sentinels, else the
/// principal unchanged.
pub fn sanitize(principal: &str) -> Option<&str> {
    match principal {
        EVERYONE | AUTHENTICATED => None,
        p => Some(p),
    }
}
