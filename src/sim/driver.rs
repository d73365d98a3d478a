//! 事件循环：取全局最早的时钟，应用其重写，再用各规则的匹配增量调和时钟库。
//!
//! 状态机只有 Running 与 Halted 两态。每次发生在外部看来是原子的：
//! 令牌更新与匹配/时钟调和之间不存在可观察的中间状态。
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::net::core::Net;
use crate::net::ids::{SpeciesId, TransitionId};
use crate::net::index_vec::IndexVec;
use crate::net::structure::{Marking, Multiset, Weight};
use crate::sim::clock::{ClockBank, ClockKey};
use crate::sim::context::SimulationContext;
use crate::sim::distribution::Distributions;
use crate::sim::error::SimError;
use crate::sim::matching::MatchIndex;
use crate::sim::rule::{self, Rule};
use crate::sim::state::State;
use crate::sim::trace::{FiringRecord, Trajectory};

/// 每次发生前检查的界限，`None` 表示不设限
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StopCondition {
    pub max_events: Option<u64>,
    pub max_time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    pub seed: u64,
    pub stop: StopCondition,
    pub record_trajectory: bool,
}

/// 协作式取消，仅在两次发生之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HaltReason {
    /// 没有启用的时钟，或全部时钟都在无穷远处
    Deadlock,
    MaxEvents,
    /// 下一个时钟超出时间上界
    MaxTime,
    Cancelled,
    /// 运行因不变式被破坏而中止
    Aborted,
}

pub struct Simulation {
    species: IndexVec<SpeciesId, String>,
    rules: IndexVec<TransitionId, Rule>,
    indices: IndexVec<TransitionId, MatchIndex>,
    clocks: ClockBank,
    state: State,
    ctx: SimulationContext,
    stop: StopCondition,
    cancel: CancelToken,
    fired: u64,
    halted: Option<HaltReason>,
    trajectory: Option<Trajectory>,
}

impl Simulation {
    /// 编译 `net`，为每条规则在 `initial` 上建立匹配索引，并为每个匹配启用时钟。
    pub fn new(
        net: &Net,
        distributions: &Distributions,
        initial: &Multiset,
        config: &RunConfig,
    ) -> Result<Self, SimError> {
        net.validate()?;
        let rules = rule::compile_net(net)?;
        let mut clocks = ClockBank::new(&rules, distributions)?;
        let state = State::from_marking(&net.marking_from(initial)?);
        let mut ctx = SimulationContext::new(config.seed);
        net.log_diagnostics();

        let indices: IndexVec<TransitionId, MatchIndex> = rules
            .iter()
            .map(|rule| MatchIndex::initialize(rule, &state))
            .collect();
        for (transition, index) in indices.iter_enumerated() {
            for matching in index.ids() {
                clocks.enable(ClockKey::new(transition, matching), &mut ctx)?;
            }
        }

        let species: IndexVec<SpeciesId, String> = net
            .species()
            .map(|s| net.species_name(s).into_owned())
            .collect();
        let trajectory = config.record_trajectory.then(|| {
            let mut trajectory = Trajectory::new(species.iter().cloned().collect());
            trajectory.record(0.0, state.marking());
            trajectory
        });

        log::info!(
            "simulation ready: {} rules, {} enabled clocks, seed {}",
            rules.len(),
            clocks.len(),
            config.seed
        );
        Ok(Self {
            species,
            rules,
            indices,
            clocks,
            state,
            ctx,
            stop: config.stop,
            cancel: CancelToken::new(),
            fired: 0,
            halted: None,
            trajectory,
        })
    }

    /// 替换取消令牌，例如与其他运行共享
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn now(&self) -> f64 {
        self.ctx.now()
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halted
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn clocks(&self) -> &ClockBank {
        &self.clocks
    }

    pub fn rules(&self) -> &IndexVec<TransitionId, Rule> {
        &self.rules
    }

    pub fn marking(&self) -> Marking {
        self.state.marking()
    }

    /// 按声明顺序给出各物种的令牌数
    pub fn counts(&self) -> IndexMap<String, Weight> {
        self.species
            .iter_enumerated()
            .map(|(id, name)| (name.clone(), self.state.count(id)))
            .collect()
    }

    pub fn count(&self, species: &str) -> Option<Weight> {
        self.species
            .iter_enumerated()
            .find(|(_, name)| name.as_str() == species)
            .map(|(id, _)| self.state.count(id))
    }

    pub fn transition_id(&self, name: &str) -> Option<TransitionId> {
        self.rules
            .iter_enumerated()
            .find(|(_, rule)| rule.name == name)
            .map(|(id, _)| id)
    }

    pub fn matches(&self, transition: TransitionId) -> Option<&MatchIndex> {
        self.indices.get(transition)
    }

    /// 已启用时钟 `(迁移名, 键, 发生时间)`，最早的在前
    pub fn enabled_clocks(&self) -> Vec<(&str, ClockKey, f64)> {
        self.clocks
            .iter()
            .map(|(key, time)| (self.rules[key.transition].name.as_str(), key, time))
            .collect()
    }

    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_ref()
    }

    /// 将维护的匹配集合与全量重扫比较，并检查每个存活匹配恰有一个时钟。
    pub fn check_consistency(&self) -> Result<(), SimError> {
        let mut matches = 0;
        for (transition, index) in self.indices.iter_enumerated() {
            if !index.is_consistent_with(&self.state) {
                return Err(SimError::invariant(format!(
                    "match index of `{}` diverged from a full rescan",
                    index.rule().name
                )));
            }
            for matching in index.ids() {
                if !self.clocks.is_enabled(ClockKey::new(transition, matching)) {
                    return Err(SimError::invariant(format!(
                        "`{}` match {} has no clock",
                        index.rule().name,
                        matching
                    )));
                }
            }
            matches += index.len();
        }
        if matches != self.clocks.len() {
            return Err(SimError::invariant(format!(
                "{} clocks enabled for {} live matches",
                self.clocks.len(),
                matches
            )));
        }
        Ok(())
    }

    /// 惰性产生发生记录，直到停止
    pub fn firings(&mut self) -> Firings<'_> {
        Firings { sim: self }
    }

    /// 运行至停止并返回原因
    pub fn run(&mut self) -> Result<HaltReason, SimError> {
        for record in self.firings() {
            record?;
        }
        self.halted
            .ok_or_else(|| SimError::invariant("firing loop ended without a halt reason"))
    }

    /// 至多执行一次发生，`Ok(None)` 表示已停止。
    ///
    /// 出错即中止运行，之后的调用都返回 `Ok(None)`。
    pub fn step(&mut self) -> Result<Option<FiringRecord>, SimError> {
        if self.halted.is_some() {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            self.halt(HaltReason::Cancelled);
            return Ok(None);
        }
        if self.stop.max_events.is_some_and(|max| self.fired >= max) {
            self.halt(HaltReason::MaxEvents);
            return Ok(None);
        }
        self.fire_next().inspect_err(|err| {
            log::error!("aborting simulation at t={}: {}", self.ctx.now(), err);
            self.halted = Some(HaltReason::Aborted);
        })
    }

    fn fire_next(&mut self) -> Result<Option<FiringRecord>, SimError> {
        let Some((key, time)) = self.clocks.peek_min() else {
            self.halt(HaltReason::Deadlock);
            return Ok(None);
        };
        if time.is_infinite() {
            self.halt(HaltReason::Deadlock);
            return Ok(None);
        }
        if self.stop.max_time.is_some_and(|max| time > max) {
            self.halt(HaltReason::MaxTime);
            return Ok(None);
        }

        let binding = self.indices[key.transition]
            .get(key.matching)
            .cloned()
            .ok_or_else(|| {
                SimError::invariant(format!(
                    "clock for `{}` refers to dead match {}",
                    self.rules[key.transition].name, key.matching
                ))
            })?;

        self.ctx.advance_to(time)?;
        let delta = self.state.apply(&self.rules[key.transition], &binding)?;

        for transition in self.rules.indices() {
            let changes = self.indices[transition].apply_state_delta(&self.state, &delta);
            for matching in changes.invalidated {
                if !self.clocks.disable(ClockKey::new(transition, matching))? {
                    return Err(SimError::invariant(format!(
                        "invalidated `{}` match {} never had a clock",
                        self.rules[transition].name, matching
                    )));
                }
            }
            for matching in changes.created {
                self.clocks
                    .enable(ClockKey::new(transition, matching), &mut self.ctx)?;
            }
        }

        // 只有不绑定令牌的匹配能在自身发生后存活
        if self.clocks.is_enabled(key) {
            self.clocks.rearm(key, &mut self.ctx)?;
        }

        self.fired += 1;
        if let Some(trajectory) = self.trajectory.as_mut() {
            trajectory.record(time, self.state.marking());
        }

        let record = FiringRecord {
            time,
            transition: key.transition,
            name: self.rules[key.transition].name.clone(),
            binding: binding.to_vec(),
        };
        log::debug!(
            "t={:.6} fire `{}` on {:?} ({} clocks enabled)",
            record.time,
            record.name,
            record.binding,
            self.clocks.len()
        );
        Ok(Some(record))
    }

    fn halt(&mut self, reason: HaltReason) {
        self.halted = Some(reason);
        log::info!(
            "halted ({:?}) after {} firings at t={}",
            reason,
            self.fired,
            self.ctx.now()
        );
    }
}

/// [`Simulation::firings`] 产生的不可重启的发生序列
pub struct Firings<'a> {
    sim: &'a mut Simulation,
}

impl Iterator for Firings<'_> {
    type Item = Result<FiringRecord, SimError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.sim.step().transpose()
    }
}
