use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide interner shared by strand and layer ids.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Mint `prefix_N`, skipping any name that was already interned
/// (for example ids read back from a project file).
fn fresh_spur(prefix: &str) -> Spur {
    loop {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let candidate = format!("{prefix}_{n}");
        if INTERNER.get(&candidate).is_none() {
            return INTERNER.get_or_intern(candidate);
        }
    }
}

macro_rules! interned_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Spur);

        impl $name {
            /// Intern `s`, returning the existing id if it is already known.
            pub fn intern(s: &str) -> Self {
                Self(INTERNER.get_or_intern(s))
            }

            pub fn as_str(&self) -> &'static str {
                INTERNER.resolve(&self.0)
            }

            /// A never-before-seen id with the default prefix.
            pub fn fresh() -> Self {
                Self(fresh_spur($prefix))
            }

            pub fn with_prefix(prefix: &str) -> Self {
                Self(fresh_spur(prefix))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok(Self::intern(&s))
            }
        }
    };
}

interned_id!(
    /// Identifier of a strand, unique across the canvas.
    StrandId,
    "strand"
);

interned_id!(
    /// Identifier of a layer or group layer.
    LayerId,
    "layer"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = StrandId::intern("strand_a");
        let b = StrandId::intern("strand_a");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "strand_a");
    }

    #[test]
    fn fresh_ids_are_unique() {
        let a = StrandId::fresh();
        let b = StrandId::fresh();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("strand_"));
    }

    #[test]
    fn fresh_skips_names_already_loaded() {
        let n = COUNTER.load(Ordering::Relaxed);
        let taken = LayerId::intern(&format!("layer_{n}"));
        let minted = LayerId::fresh();
        assert_ne!(taken, minted);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = LayerId::intern("layer-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"layer-1\"");
        let back: LayerId = serde_json::from_str("\"layer-1\"").unwrap();
        assert_eq!(back, id);
    }
}
