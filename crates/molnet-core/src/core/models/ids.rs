use serde::Serialize;
use std::fmt;

macro_rules! new_integer_id {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub usize);

            impl $name {
                /// Returns the identifier that follows this one.
                pub fn next(self) -> Self {
                    Self(self.0 + 1)
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<usize> for $name {
                fn from(value: usize) -> Self {
                    Self(value)
                }
            }
        )*
    };
}

new_integer_id! {
    /// Unique, immutable identifier of a cluster, assigned in creation order.
    ClusterId;
    /// Sequential identifier of a molecular family within one network.
    FamilyId;
}
