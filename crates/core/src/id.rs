// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compact, typed entity identifiers.

/// Every generated id is a 4-character type prefix followed by a 16-character
/// nanoid body, for a fixed 20-byte length.
pub const ID_LEN: usize = 20;

/// Fixed-capacity inline id buffer. Always exactly [`ID_LEN`] ASCII bytes,
/// `Copy`, and never heap-allocates.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IdBuf([u8; ID_LEN]);

impl IdBuf {
    pub fn new(s: &str) -> Self {
        debug_assert_eq!(s.len(), ID_LEN, "id must be exactly {ID_LEN} bytes: {s:?}");
        let mut buf = [b'-'; ID_LEN];
        let n = s.len().min(ID_LEN);
        buf[..n].copy_from_slice(&s.as_bytes()[..n]);
        Self(buf)
    }

    pub fn as_str(&self) -> &str {
        // Invariant: only ever constructed from &str, so this is valid UTF-8.
        std::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl std::hash::Hash for IdBuf {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl std::borrow::Borrow<str> for IdBuf {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Debug for IdBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for IdBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl serde::Serialize for IdBuf {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for IdBuf {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.len() != ID_LEN {
            return Err(serde::de::Error::custom(format!(
                "id must be exactly {ID_LEN} bytes, got {}: {:?}",
                s.len(),
                s
            )));
        }
        Ok(IdBuf::new(&s))
    }
}

/// Define a newtype identifier backed by [`IdBuf`] with a fixed 4-character
/// type prefix (e.g. `"scj-"` for scan jobs, `"fnd-"` for findings).
///
/// Generates `new()`, `from_string()`, `as_str()`, `Display`, `From<&str>`,
/// `From<String>`, `PartialEq<str>`, `Borrow<str>`, and `Deref<Target = str>`.
///
/// ```ignore
/// ctrlscan_core::define_id! {
///     pub struct ScanJobId("scj-");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $crate::id::IdBuf);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh, randomly-suffixed id with this type's prefix.
            pub fn new() -> Self {
                let body = nanoid::nanoid!(($crate::id::ID_LEN - Self::PREFIX.len()));
                Self($crate::id::IdBuf::new(&format!("{}{}", Self::PREFIX, body)))
            }

            /// Parse an id from an existing string (row decoding, wire protocol).
            pub fn from_string(id: impl AsRef<str>) -> Self {
                Self($crate::id::IdBuf::new(id.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.as_str())
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

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0.as_str() == other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                self.0.as_str()
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
