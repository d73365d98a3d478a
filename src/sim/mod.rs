//! # 连续时间随机仿真
//!
//! 把 [`crate::net`] 描述的反应网编译为重写规则，在个体令牌状态上增量维护
//! 每条规则的匹配集合，并为每个匹配维护一个发生时钟。事件循环每次取最早的
//! 时钟发生，再只根据被消耗与新产生的令牌调和匹配与时钟，而不是全量重扫。
//!
//! 组成：
//! - [`rule`]：迁移 → 规则（按物种展开的前后槽位）
//! - [`state`]：令牌池与状态增量
//! - [`matching`]：匹配索引及其增量维护
//! - [`clock`]：按 `(时间, 启用序号)` 排序的时钟库
//! - [`driver`]：事件循环与停止条件
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use RustSPN::net::{Multiset, Net};
//! use RustSPN::sim::{Distributions, Fixed, HaltReason, RunConfig, Simulation};
//!
//! let net = Net::labeled(["I", "R"])
//!     .unwrap()
//!     .with_transition("recover", Multiset::new().with("I", 1), Multiset::new().with("R", 1))
//!     .unwrap();
//! let mut distributions = Distributions::new();
//! distributions.insert("recover".into(), Arc::new(Fixed { delay: 1.0 }));
//!
//! let mut sim = Simulation::new(
//!     &net,
//!     &distributions,
//!     &Multiset::new().with("I", 3),
//!     &RunConfig::default(),
//! )
//! .unwrap();
//! assert_eq!(sim.run().unwrap(), HaltReason::Deadlock);
//! assert_eq!(sim.count("R"), Some(3));
//! assert_eq!(sim.now(), 1.0);
//! ```

pub mod clock;
pub mod context;
pub mod distribution;
pub mod driver;
pub mod error;
pub mod matching;
pub mod rule;
pub mod state;
pub mod trace;

pub use clock::{Clock, ClockBank, ClockKey};
pub use context::SimulationContext;
pub use distribution::{
    ClockContext, DistributionSpec, Distributions, Exponential, FiringDistribution, Fixed,
    Uniform, Weibull, from_fn,
};
pub use driver::{CancelToken, Firings, HaltReason, RunConfig, Simulation, StopCondition};
pub use error::SimError;
pub use matching::{Binding, MatchDelta, MatchIndex};
pub use rule::{Rule, compile, compile_net};
pub use state::{State, StateDelta};
pub use trace::{FiringRecord, Trajectory};
