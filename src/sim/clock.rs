//! 时钟库：每个已启用的 (规则, 匹配) 持有一个绝对发生时间。
//!
//! 队列按 `(发生时间, 启用序号)` 排序，同一时间的时钟按启用先后裁决，
//! 保证固定种子下结果可复现。
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::net::ids::{MatchId, TransitionId};
use crate::net::index_vec::IndexVec;
use crate::sim::context::SimulationContext;
use crate::sim::distribution::{ClockContext, Distributions, FiringDistribution};
use crate::sim::error::SimError;
use crate::sim::rule::Rule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClockKey {
    pub transition: TransitionId,
    pub matching: MatchId,
}

impl ClockKey {
    pub fn new(transition: TransitionId, matching: MatchId) -> Self {
        Self {
            transition,
            matching,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    pub fire_at: f64,
    pub enabled_at: f64,
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FireTime(f64);

impl Eq for FireTime {}

impl PartialOrd for FireTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FireTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone)]
pub struct ClockBank {
    distributions: IndexVec<TransitionId, Arc<dyn FiringDistribution>>,
    names: IndexVec<TransitionId, String>,
    live: HashMap<ClockKey, Clock>,
    queue: BTreeSet<(FireTime, u64, ClockKey)>,
    next_seq: u64,
    /// 每个迁移曾启用过的最大匹配标识加一
    watermark: IndexVec<TransitionId, u64>,
}

impl ClockBank {
    /// 为每条规则解析分布，缺失即报错
    pub fn new(
        rules: &IndexVec<TransitionId, Rule>,
        distributions: &Distributions,
    ) -> Result<Self, SimError> {
        let resolved = rules
            .iter()
            .map(|rule| {
                distributions
                    .get(&rule.name)
                    .cloned()
                    .ok_or_else(|| SimError::MissingDistribution(rule.name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for name in distributions.keys() {
            if !rules.iter().any(|rule| &rule.name == name) {
                log::warn!("distribution `{}` matches no transition and is ignored", name);
            }
        }
        Ok(Self {
            distributions: IndexVec::from(resolved),
            names: rules.iter().map(|rule| rule.name.clone()).collect(),
            live: HashMap::new(),
            queue: BTreeSet::new(),
            next_seq: 0,
            watermark: IndexVec::from_elem(0, rules.len()),
        })
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn get(&self, key: ClockKey) -> Option<&Clock> {
        self.live.get(&key)
    }

    pub fn is_enabled(&self, key: ClockKey) -> bool {
        self.live.contains_key(&key)
    }

    /// 按发生时间、再按启用顺序列出时钟
    pub fn iter(&self) -> impl Iterator<Item = (ClockKey, f64)> + '_ {
        self.queue.iter().map(|(time, _, key)| (*key, time.0))
    }

    /// 为 `key` 采样发生时间并入队，恰好抽取一个随机数。
    ///
    /// 对已有时钟的键再次启用属于不变式破坏：调用方漏停了过期匹配。
    pub fn enable(
        &mut self,
        key: ClockKey,
        ctx: &mut SimulationContext,
    ) -> Result<Clock, SimError> {
        if self.live.contains_key(&key) {
            return Err(SimError::invariant(format!(
                "clock for `{}` match {} is already enabled",
                self.name(key),
                key.matching
            )));
        }
        let clock = self.sample(key, ctx.now(), ctx)?;
        let mark = &mut self.watermark[key.transition];
        *mark = (*mark).max(key.matching.raw() + 1);
        self.schedule(key, clock);
        log::trace!(
            "enable `{}` {} at {} -> fires {}",
            self.name(key),
            key.matching,
            clock.enabled_at,
            clock.fire_at
        );
        Ok(clock)
    }

    /// 移除 `key` 的时钟。
    ///
    /// 从未启用过的键返回 `Ok(false)`；时钟已被移除的键再次停用属于不变式破坏。
    pub fn disable(&mut self, key: ClockKey) -> Result<bool, SimError> {
        match self.live.remove(&key) {
            Some(clock) => {
                self.queue.remove(&(FireTime(clock.fire_at), clock.seq, key));
                log::trace!("disable `{}` {}", self.name(key), key.matching);
                Ok(true)
            }
            None if self
                .watermark
                .get(key.transition)
                .is_none_or(|mark| key.matching.raw() >= *mark) =>
            {
                Ok(false)
            }
            None => Err(SimError::invariant(format!(
                "clock for `{}` match {} was already disabled",
                self.name(key),
                key.matching
            ))),
        }
    }

    /// 匹配发生后未被消耗时原地重新采样；同一键始终只有一个时钟，
    /// 启用时刻沿用首次启用的时间。
    pub fn rearm(
        &mut self,
        key: ClockKey,
        ctx: &mut SimulationContext,
    ) -> Result<Clock, SimError> {
        let Some(old) = self.live.remove(&key) else {
            return Err(SimError::invariant(format!(
                "cannot re-arm `{}` match {}: no live clock",
                self.name(key),
                key.matching
            )));
        };
        self.queue.remove(&(FireTime(old.fire_at), old.seq, key));
        let clock = self.sample(key, old.enabled_at, ctx)?;
        self.schedule(key, clock);
        Ok(clock)
    }

    /// 发生时间最小的时钟，同时间取最早启用者
    pub fn peek_min(&self) -> Option<(ClockKey, f64)> {
        self.queue.first().map(|(time, _, key)| (*key, time.0))
    }

    fn name(&self, key: ClockKey) -> &str {
        self.names
            .get(key.transition)
            .map_or("<unknown>", String::as_str)
    }

    fn sample(
        &mut self,
        key: ClockKey,
        enabled_at: f64,
        ctx: &mut SimulationContext,
    ) -> Result<Clock, SimError> {
        let distribution = self.distributions.get(key.transition).ok_or_else(|| {
            SimError::invariant(format!("transition {} has no clock slot", key.transition))
        })?;
        let u = ctx.uniform();
        let clock = ClockContext {
            now: ctx.now(),
            enabled_at,
        };
        let delay = distribution.delay(u, &clock);
        if delay.is_nan() || delay < 0.0 {
            return Err(SimError::InvalidDelay {
                transition: self.name(key).to_string(),
                delay,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        Ok(Clock {
            fire_at: clock.now + delay,
            enabled_at: clock.enabled_at,
            seq,
        })
    }

    fn schedule(&mut self, key: ClockKey, clock: Clock) {
        self.queue.insert((FireTime(clock.fire_at), clock.seq, key));
        self.live.insert(key, clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::core::Net;
    use crate::net::structure::Multiset;
    use crate::sim::distribution::{Exponential, Fixed, from_fn};
    use crate::sim::rule;

    fn rules() -> IndexVec<TransitionId, Rule> {
        let net = Net::labeled(["A"])
            .unwrap()
            .with_transition("slow", Multiset::new().with("A", 1), Multiset::new())
            .unwrap()
            .with_transition("fast", Multiset::new().with("A", 1), Multiset::new())
            .unwrap();
        rule::compile_net(&net).unwrap()
    }

    fn bank() -> ClockBank {
        let mut distributions = Distributions::new();
        distributions.insert("slow".into(), Arc::new(Fixed { delay: 5.0 }));
        distributions.insert("fast".into(), Arc::new(Fixed { delay: 1.0 }));
        ClockBank::new(&rules(), &distributions).unwrap()
    }

    const SLOW: TransitionId = TransitionId::new(0);
    const FAST: TransitionId = TransitionId::new(1);

    #[test]
    fn missing_distribution_is_reported_by_name() {
        let mut distributions = Distributions::new();
        distributions.insert("slow".into(), Arc::new(Exponential { rate: 1.0 }));
        assert_eq!(
            ClockBank::new(&rules(), &distributions).unwrap_err(),
            SimError::MissingDistribution("fast".into())
        );
    }

    #[test]
    fn peek_min_picks_earliest_fire_time() {
        let mut bank = bank();
        let mut ctx = SimulationContext::new(1);
        bank.enable(ClockKey::new(SLOW, MatchId::new(0)), &mut ctx).unwrap();
        bank.enable(ClockKey::new(FAST, MatchId::new(0)), &mut ctx).unwrap();

        assert_eq!(bank.peek_min(), Some((ClockKey::new(FAST, MatchId::new(0)), 1.0)));
        assert_eq!(ctx.draws(), 2);
    }

    #[test]
    fn ties_break_by_enable_order() {
        let mut bank = bank();
        let mut ctx = SimulationContext::new(1);
        for m in [3, 1, 2] {
            bank.enable(ClockKey::new(SLOW, MatchId::new(m)), &mut ctx).unwrap();
        }
        let order: Vec<MatchId> = bank.iter().map(|(key, _)| key.matching).collect();
        assert_eq!(order, vec![MatchId::new(3), MatchId::new(1), MatchId::new(2)]);
    }

    #[test]
    fn double_enable_is_an_invariant_violation() {
        let mut bank = bank();
        let mut ctx = SimulationContext::new(1);
        let key = ClockKey::new(SLOW, MatchId::new(0));
        bank.enable(key, &mut ctx).unwrap();
        assert!(matches!(
            bank.enable(key, &mut ctx),
            Err(SimError::InvariantViolation(_))
        ));
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn disable_never_enabled_is_a_no_op_but_double_disable_fails() {
        let mut bank = bank();
        let mut ctx = SimulationContext::new(1);
        let key = ClockKey::new(SLOW, MatchId::new(0));

        assert_eq!(bank.disable(ClockKey::new(SLOW, MatchId::new(9))), Ok(false));
        bank.enable(key, &mut ctx).unwrap();
        assert_eq!(bank.disable(key), Ok(true));
        assert!(bank.is_empty());
        assert!(bank.peek_min().is_none());
        assert!(matches!(
            bank.disable(key),
            Err(SimError::InvariantViolation(_))
        ));
    }

    #[test]
    fn rearm_keeps_one_clock_per_key() {
        let mut bank = bank();
        let mut ctx = SimulationContext::new(1);
        let key = ClockKey::new(FAST, MatchId::new(0));
        bank.enable(key, &mut ctx).unwrap();
        ctx.advance_to(1.0).unwrap();

        let clock = bank.rearm(key, &mut ctx).unwrap();

        assert_eq!(clock.fire_at, 2.0);
        assert_eq!(clock.enabled_at, 0.0);
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.iter().count(), 1);
        assert!(bank.rearm(ClockKey::new(SLOW, MatchId::new(0)), &mut ctx).is_err());
    }

    #[test]
    fn rearm_exposes_time_since_first_enable() {
        let mut distributions = Distributions::new();
        // 已启用越久，下一次延迟越短
        distributions.insert("slow".into(), from_fn(|_, clock| 4.0 - clock.elapsed()));
        distributions.insert("fast".into(), Arc::new(Fixed { delay: 1.0 }));
        let mut bank = ClockBank::new(&rules(), &distributions).unwrap();
        let mut ctx = SimulationContext::new(1);
        let key = ClockKey::new(SLOW, MatchId::new(0));

        assert_eq!(bank.enable(key, &mut ctx).unwrap().fire_at, 4.0);
        ctx.advance_to(3.0).unwrap();
        let clock = bank.rearm(key, &mut ctx).unwrap();

        assert_eq!(clock.enabled_at, 0.0);
        assert_eq!(clock.fire_at, 4.0);

        bank.disable(key).unwrap();
        let fresh = bank.enable(ClockKey::new(SLOW, MatchId::new(1)), &mut ctx).unwrap();
        assert_eq!(fresh.enabled_at, 3.0);
        assert_eq!(fresh.fire_at, 7.0);
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut distributions = Distributions::new();
        distributions.insert("slow".into(), from_fn(|_, _| -1.0));
        distributions.insert("fast".into(), Arc::new(Fixed { delay: 1.0 }));
        let mut bank = ClockBank::new(&rules(), &distributions).unwrap();
        let mut ctx = SimulationContext::new(1);
        assert_eq!(
            bank.enable(ClockKey::new(SLOW, MatchId::new(0)), &mut ctx),
            Err(SimError::InvalidDelay {
                transition: "slow".into(),
                delay: -1.0
            })
        );
        assert!(bank.is_empty());
    }
}
