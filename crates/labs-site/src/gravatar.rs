//! Gravatar avatar URLs.
//!
//! Gravatar identifies an avatar by the MD5 hex digest of the owner's
//! email address, trimmed and lower-cased.

use md5::{Digest, Md5};

use crate::error::SiteError;

/// Avatar edge length in pixels when none is requested.
pub const DEFAULT_SIZE: u32 = 400;

const AVATAR_BASE: &str = "http://www.gravatar.com/avatar/";

/// A normalized email address and its avatar hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gravatar {
    email: String,
    hash: String,
}

impl Gravatar {
    /// Normalize an email address and compute its avatar hash.
    pub fn new(email: &str) -> Result<Self, SiteError> {
        let email = normalize(email);
        validate(&email)?;

        let hash = hex::encode(Md5::digest(email.as_bytes()));

        Ok(Self { email, hash })
    }

    /// The trimmed, lower-cased address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Lower-case hex MD5 digest of the normalized address.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Avatar URL at the given size.
    pub fn url(&self, size: u32) -> Result<String, SiteError> {
        if size == 0 {
            return Err(SiteError::InvalidArgument(
                "avatar size must be a positive integer".to_string(),
            ));
        }

        Ok(format!("{}{}?s={}", AVATAR_BASE, self.hash, size))
    }
}

/// Build the avatar URL for `email` at `size` pixels.
pub fn gravatar_url(email: &str, size: u32) -> Result<String, SiteError> {
    Gravatar::new(email)?.url(size)
}

/// Build the avatar URL for `email` at [`DEFAULT_SIZE`].
pub fn gravatar_url_default(email: &str) -> Result<String, SiteError> {
    gravatar_url(email, DEFAULT_SIZE)
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate(email: &str) -> Result<(), SiteError> {
    if email.is_empty() {
        return Err(SiteError::InvalidArgument(
            "email address is empty".to_string(),
        ));
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(SiteError::InvalidArgument(format!(
            "'{}' is not an email address",
            email
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hashes_known_address() {
        // Reference value from the Gravatar documentation.
        let gravatar = Gravatar::new("MyEmailAddress@example.com ").unwrap();

        assert_eq!(gravatar.hash(), "0bc83cb571cd1c50ba6f3e8a78ef1346");
        assert_eq!(
            gravatar.url(80).unwrap(),
            "http://www.gravatar.com/avatar/0bc83cb571cd1c50ba6f3e8a78ef1346?s=80"
        );
    }

    #[test]
    fn ignores_case_and_surrounding_whitespace() {
        assert_eq!(
            gravatar_url(" User@Example.com \n", 200).unwrap(),
            gravatar_url("user@example.com", 200).unwrap()
        );
        assert_eq!(
            gravatar_url_default("USER@EXAMPLE.COM").unwrap(),
            gravatar_url_default("\tuser@example.com").unwrap()
        );
    }

    #[test]
    fn embeds_size_parameter() {
        for size in [1, 48, 400, 2048] {
            let url = gravatar_url("user@example.com", size).unwrap();
            assert!(url.ends_with(&format!("?s={}", size)), "{}", url);
        }
    }

    #[test]
    fn defaults_to_400_pixels() {
        let url = gravatar_url_default("user@example.com").unwrap();
        assert!(url.ends_with("?s=400"));
    }

    #[test]
    fn rejects_malformed_input() {
        for email in ["", "   \n", "no-at-sign", "@example.com", "user@"] {
            assert!(
                matches!(Gravatar::new(email), Err(SiteError::InvalidArgument(_))),
                "accepted {:?}",
                email
            );
        }
    }

    #[test]
    fn rejects_zero_size() {
        let result = gravatar_url("user@example.com", 0);
        assert!(matches!(result, Err(SiteError::InvalidArgument(_))));
    }
}
