//! Trait plumbing for values whose identity is their canonical text form.
//!
//! `Version`, `FqName` and `FqInstance` all serialize as the string they
//! render to and deserialize through their parse-or-fail entry point, so the
//! wire form can never hold a value the grammar rejects.

/// `Serialize` via `Display`, `Deserialize` via `FromStr`.
macro_rules! string_serde {
    ($name:ident) => {
        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                text.parse().map_err(::serde::de::Error::custom)
            }
        }
    };
}

/// Equality, ordering and hashing defined on the canonical string, plus
/// [`string_serde!`]. Two values are equal exactly when they print the same.
macro_rules! canonical_string {
    ($name:ident) => {
        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.to_string() == other.to_string()
            }
        }

        impl Eq for $name {}

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<::std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> ::std::cmp::Ordering {
                self.to_string().cmp(&other.to_string())
            }
        }

        impl ::std::hash::Hash for $name {
            fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                self.to_string().hash(state);
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.to_string() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.to_string() == *other
            }
        }

        $crate::types::string_serde!($name);
    };
}

pub(crate) use canonical_string;
pub(crate) use string_serde;
