//! 强类型标识符：物种、迁移、令牌与匹配。
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::index_vec::Idx;

macro_rules! define_id {
    ($name:ident, $raw:ty, $prefix:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub $raw);

        impl $name {
            pub const fn new(raw: $raw) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> $raw {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }

        impl Idx for $name {
            fn index(self) -> usize {
                self.0 as usize
            }

            fn from_usize(idx: usize) -> Self {
                Self(idx as $raw)
            }
        }
    };
}

define_id!(SpeciesId, u32, "s");
define_id!(TransitionId, u32, "t");
// 令牌与匹配标识在整个运行中单调分配，从不复用
define_id!(TokenId, u64, "#");
define_id!(MatchId, u64, "m");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_format_with_prefix() {
        assert_eq!(format!("{:?}", SpeciesId::new(3)), "s3");
        assert_eq!(format!("{}", TokenId::new(42)), "#42");
        assert_eq!(MatchId::from_usize(7).raw(), 7);
    }

    #[test]
    fn token_ids_order_by_mint_order() {
        assert!(TokenId::new(1) < TokenId::new(2));
    }
}
