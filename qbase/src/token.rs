use rand::Rng;

pub const RESET_TOKEN_SIZE: usize = 16;

/// A stateless reset token, bound to one connection ID when that ID is issued.
///
/// Its only use is recognizing a stateless reset: a datagram whose trailing
/// [`RESET_TOKEN_SIZE`] bytes equal the token.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResetToken([u8; RESET_TOKEN_SIZE]);

impl ResetToken {
    pub fn new(bytes: [u8; RESET_TOKEN_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn random_gen() -> Self {
        let mut bytes = [0; RESET_TOKEN_SIZE];
        rand::rng().fill(&mut bytes);
        Self(bytes)
    }

    /// The token a datagram would carry if it was a stateless reset,
    /// `None` if the datagram is too short to carry one.
    pub fn from_datagram_tail(datagram: &[u8]) -> Option<Self> {
        let start = datagram.len().checked_sub(RESET_TOKEN_SIZE)?;
        let tail = datagram[start..].try_into().ok()?;
        Some(Self(tail))
    }
}

impl From<[u8; RESET_TOKEN_SIZE]> for ResetToken {
    fn from(bytes: [u8; RESET_TOKEN_SIZE]) -> Self {
        Self(bytes)
    }
}

impl std::ops::Deref for ResetToken {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_from_datagram_tail() {
        let token = ResetToken::new([7; RESET_TOKEN_SIZE]);
        let mut datagram = vec![0x40, 1, 2, 3];
        datagram.extend_from_slice(&token);
        assert_eq!(ResetToken::from_datagram_tail(&datagram), Some(token));
        assert_eq!(ResetToken::from_datagram_tail(&[0; 15]), None);
    }
}
