//! Random tickets.

use authsanity_api::Ticket;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

/// Bytes of OS randomness behind every ticket.
pub const TICKET_BYTES: usize = 32;

/// A fresh ticket: 32 bytes from the OS RNG, unpadded base64url.
pub fn new_ticket() -> Ticket {
    let mut buf = [0u8; TICKET_BYTES];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_are_url_safe_and_unique() {
        let a = new_ticket();
        let b = new_ticket();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}
