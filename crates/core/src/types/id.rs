//! Newtype IDs for Chec entity references.
//!
//! Chec identifies resources with prefixed strings (`prod_…`, `cart_…`,
//! `item_…`). These IDs are interpolated into request paths, so every ID
//! built from untrusted input goes through [`define_id!`]'s `parse`, which
//! only accepts the expected prefix followed by ASCII alphanumerics and `_`.

/// Errors that can occur when parsing an entity ID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("{kind} cannot be empty")]
    Empty {
        /// Name of the ID type.
        kind: &'static str,
    },
    /// The input string is too long.
    #[error("{kind} must be at most {max} characters")]
    TooLong {
        /// Name of the ID type.
        kind: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not start with the expected prefix.
    #[error("{kind} must start with '{prefix}'")]
    MissingPrefix {
        /// Name of the ID type.
        kind: &'static str,
        /// Expected prefix.
        prefix: &'static str,
    },
    /// The input contains a character outside `[A-Za-z0-9_]`.
    #[error("{kind} contains invalid character {found:?}")]
    InvalidCharacter {
        /// Name of the ID type.
        kind: &'static str,
        /// The offending character.
        found: char,
    },
}

/// Maximum length accepted for any Chec ID.
pub const MAX_ID_LENGTH: usize = 64;

/// Macro to define a prefixed string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `parse()` validation, `as_str()`, `Display`, `FromStr`, `AsRef<str>`
///
/// # Example
///
/// ```rust
/// # use seedling_core::define_id;
/// define_id!(OrderId, "ord_");
///
/// assert!(OrderId::parse("ord_7ZAMo1Mp0G5NJ4").is_ok());
/// assert!(OrderId::parse("prod_7ZAMo1Mp0G5NJ4").is_err());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix Chec uses for this entity.
            pub const PREFIX: &'static str = $prefix;

            /// Parse an ID from untrusted input.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is empty, too long, lacks the
            /// expected prefix, or contains characters outside `[A-Za-z0-9_]`.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::id::IdError> {
                let kind = stringify!($name);
                if s.is_empty() {
                    return Err($crate::types::id::IdError::Empty { kind });
                }
                if s.len() > $crate::types::id::MAX_ID_LENGTH {
                    return Err($crate::types::id::IdError::TooLong {
                        kind,
                        max: $crate::types::id::MAX_ID_LENGTH,
                    });
                }
                if !s.starts_with(Self::PREFIX) || s.len() == Self::PREFIX.len() {
                    return Err($crate::types::id::IdError::MissingPrefix {
                        kind,
                        prefix: Self::PREFIX,
                    });
                }
                if let Some(found) = s
                    .chars()
                    .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
                {
                    return Err($crate::types::id::IdError::InvalidCharacter { kind, found });
                }
                Ok(Self(s.to_owned()))
            }

            /// Returns the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the ID and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(ProductId, "prod_");
define_id!(CartId, "cart_");
define_id!(LineItemId, "item_");
