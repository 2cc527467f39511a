use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::Display;

/// A short token identifying one stored URL mapping.
///
/// Generated slugs are fixed-length alphabetic strings, but slugs coming from
/// callers are only checked for blankness: an unknown slug is a lookup miss,
/// not a validation error.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Creates a new `Slug`, rejecting blank input.
    pub fn new(slug: impl Into<String>) -> Result<Self, CoreError> {
        let slug = slug.into();
        if slug.trim().is_empty() {
            return Err(CoreError::EmptySlug);
        }
        Ok(Self(slug))
    }

    /// Creates a `Slug` without validation.
    ///
    /// Use this only for slugs produced by trusted internal sources
    /// (the generator, or rows read back from storage).
    pub fn new_unchecked(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Returns the slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Slug {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        assert!(Slug::new("abcdEFGH").is_ok());
        assert!(Slug::new("x").is_ok());
    }

    #[test]
    fn blank_slugs_are_rejected() {
        assert_eq!(Slug::new(""), Err(CoreError::EmptySlug));
        assert_eq!(Slug::new("   "), Err(CoreError::EmptySlug));
    }

    #[test]
    fn unchecked_slug_may_be_blank() {
        assert!(Slug::new_unchecked("").is_blank());
    }

    #[test]
    fn display() {
        let slug = Slug::new("my-slug").unwrap();
        assert_eq!(slug.to_string(), "my-slug");
    }

    #[test]
    fn serializes_as_plain_string() {
        let slug = Slug::new("abc").unwrap();
        assert_eq!(serde_json::to_string(&slug).unwrap(), "\"abc\"");
    }
}
