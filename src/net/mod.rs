//! # 反应网定义（Species/Transition Net）
//!
//! 设物种集合 `S`，迁移集合 `T`。每个迁移 `t ∈ T` 带有输入多重集
//! `Pre(t) ∈ ℕ^{S}` 与输出多重集 `Post(t) ∈ ℕ^{S}`，按物种名引用。
//! 本模块只描述静态结构；令牌个体、匹配与时钟见 [`crate::sim`]。
//!
//! ## 示例
//!
//! ```rust
//! use RustSPN::net::*;
//!
//! let net = Net::labeled(["S", "I", "R"])
//!     .unwrap()
//!     .with_transition("recover", Multiset::new().with("I", 1), Multiset::new().with("R", 1))
//!     .unwrap();
//!
//! assert!(net.validate().is_ok());
//! let marking = net.marking_from(&Multiset::new().with("I", 2)).unwrap();
//! assert_eq!(marking.tokens(net.species_id("I").unwrap()), 2);
//! ```

pub mod core;
pub mod ids;
pub mod index_vec;
pub mod io;
pub mod structure;

pub use core::{DiagnosticReport, Net, NetError, SpeciesNaming};
pub use ids::{MatchId, SpeciesId, TokenId, TransitionId};
pub use index_vec::{Idx, IndexVec};
pub use structure::{Marking, Multiset, Species, Transition, Weight};
