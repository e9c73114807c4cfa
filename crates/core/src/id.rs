// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prefixed random identifiers.
//!
//! Every durable entity carries a `{prefix}{nanoid}` id: a 4-character type
//! tag (`wld-`, `pln-`, `stp-`) followed by a 19-character random suffix.
//! Ids are small enough to stay inline in a [`smol_str::SmolStr`], so
//! cloning one never allocates.

/// Length of the random suffix appended to the type prefix.
pub const ID_SUFFIX_LEN: usize = 19;

/// Returns a string slice truncated to at most `n` bytes.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

/// Define a newtype id backed by [`smol_str::SmolStr`] with a type prefix.
///
/// Generates `generate()` for random ids, `from_string()` for parsing,
/// `as_str()`, `suffix()`, `short()`, `Display`, `From` conversions, and
/// str comparisons. `SmolStr` hashes like `str`, so the generated
/// `Borrow<str>` impl is sound for map lookups.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the id type.
///     pub struct PlanId("pln-");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(smol_str::SmolStr);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new random id with the type prefix.
            pub fn generate() -> Self {
                Self(smol_str::format_smolstr!(
                    "{}{}",
                    Self::PREFIX,
                    nanoid::nanoid!({ $crate::id::ID_SUFFIX_LEN })
                ))
            }

            /// Create an id from an existing string (parsing, deserialization).
            pub fn from_string(id: impl AsRef<str>) -> Self {
                Self(smol_str::SmolStr::new(id.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// The id without its type prefix.
            pub fn suffix(&self) -> &str {
                self.0.strip_prefix(Self::PREFIX).unwrap_or(self.0.as_str())
            }

            /// Suffix truncated to at most `n` bytes, for log lines.
            pub fn short(&self, n: usize) -> &str {
                $crate::id::short(self.suffix(), n)
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::generate()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.0.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0.as_str() == *other
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
