//! 增量匹配索引：维护某条规则前模式在当前状态中的全部出现。
//!
//! 匹配记录存放在以 [`MatchId`] 为键的竞技场中，另有令牌到匹配的反向索引，
//! 因此令牌被销毁时只需触及引用它的匹配；新令牌只与已有令牌组合出新匹配。
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use itertools::Itertools;
use smallvec::SmallVec;

use crate::net::ids::{MatchId, SpeciesId, TokenId};
use crate::sim::rule::Rule;
use crate::sim::state::{State, StateDelta};

/// 逐槽绑定到前模式的令牌。
///
/// 同一物种组内令牌有序，因此每个匹配只有一种规范绑定。
pub type Binding = SmallVec<[TokenId; 4]>;

/// 一次状态变化后需要启用与停用的匹配
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchDelta {
    pub created: Vec<MatchId>,
    pub invalidated: Vec<MatchId>,
}

impl MatchDelta {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.invalidated.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MatchIndex {
    rule: Rule,
    arena: BTreeMap<MatchId, Binding>,
    by_binding: HashMap<Binding, MatchId>,
    by_token: HashMap<TokenId, BTreeSet<MatchId>>,
    next_id: u64,
}

fn combinations(tokens: &[TokenId], k: usize) -> Vec<Vec<TokenId>> {
    tokens.iter().copied().combinations(k).collect()
}

/// 各组选择的笛卡尔积；没有组时得到一个空绑定
fn product(groups: Vec<Vec<Vec<TokenId>>>) -> Vec<Binding> {
    groups.into_iter().fold(vec![Binding::new()], |prefixes, choices| {
        prefixes
            .iter()
            .flat_map(|prefix| {
                choices.iter().map(move |choice| {
                    let mut binding = prefix.clone();
                    binding.extend_from_slice(choice);
                    binding
                })
            })
            .collect()
    })
}

/// 从头计算 `rule` 在 `state` 上的全部绑定
pub fn scan(rule: &Rule, state: &State) -> Vec<Binding> {
    let groups = rule
        .requirements
        .iter()
        .map(|(species, k)| {
            let pool: Vec<TokenId> = state.pool(*species).iter().copied().collect();
            combinations(&pool, *k)
        })
        .collect();
    product(groups)
}

impl MatchIndex {
    /// 全量扫描 `state` 建立索引
    pub fn initialize(rule: &Rule, state: &State) -> Self {
        let mut index = Self {
            rule: rule.clone(),
            arena: BTreeMap::new(),
            by_binding: HashMap::new(),
            by_token: HashMap::new(),
            next_id: 0,
        };
        for binding in scan(rule, state) {
            index.insert(binding);
        }
        index
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get(&self, id: MatchId) -> Option<&Binding> {
        self.arena.get(&id)
    }

    pub fn contains(&self, id: MatchId) -> bool {
        self.arena.contains_key(&id)
    }

    /// 按创建顺序列出存活匹配
    pub fn iter(&self) -> impl Iterator<Item = (MatchId, &Binding)> {
        self.arena.iter().map(|(id, binding)| (*id, binding))
    }

    pub fn ids(&self) -> impl Iterator<Item = MatchId> + '_ {
        self.arena.keys().copied()
    }

    pub fn bindings(&self) -> BTreeSet<Binding> {
        self.arena.values().cloned().collect()
    }

    /// 维护的匹配是否等于对 `state` 的重新扫描
    pub fn is_consistent_with(&self, state: &State) -> bool {
        let rescanned: BTreeSet<Binding> = scan(&self.rule, state).into_iter().collect();
        rescanned == self.bindings()
    }

    /// 把一次发生的令牌变化并入索引，`state` 须已反映该变化。
    ///
    /// 失效匹配恰为绑定了被移除令牌的匹配；新匹配至少使用一个
    /// 本规则所需物种的新令牌。
    pub fn apply_state_delta(&mut self, state: &State, delta: &StateDelta) -> MatchDelta {
        let mut changes = MatchDelta::default();

        for (_, token) in &delta.removed {
            let Some(ids) = self.by_token.remove(token) else {
                continue;
            };
            for id in ids {
                if self.remove(id).is_some() {
                    changes.invalidated.push(id);
                }
            }
        }

        for binding in self.new_bindings(state, delta) {
            if let Some(id) = self.insert(binding) {
                changes.created.push(id);
            }
        }

        if !changes.is_empty() {
            log::trace!(
                "`{}`: +{} / -{} matches ({} live)",
                self.rule.name,
                changes.created.len(),
                changes.invalidated.len(),
                self.arena.len()
            );
        }
        changes
    }

    /// 半朴素展开：以第一个含新令牌的需求组为枢轴，之前的组只取旧令牌，
    /// 之后的组任取，每个新绑定只产生一次。
    fn new_bindings(&self, state: &State, delta: &StateDelta) -> Vec<Binding> {
        let added_of = |species: SpeciesId| -> BTreeSet<TokenId> {
            delta
                .added
                .iter()
                .filter(|(s, token)| *s == species && state.contains(species, *token))
                .map(|(_, token)| *token)
                .collect()
        };
        let added: Vec<BTreeSet<TokenId>> = self
            .rule
            .requirements
            .iter()
            .map(|(species, _)| added_of(*species))
            .collect();

        let mut bindings = Vec::new();
        for pivot in 0..self.rule.requirements.len() {
            if added[pivot].is_empty() {
                continue;
            }
            let groups = self
                .rule
                .requirements
                .iter()
                .enumerate()
                .map(|(g, (s, k))| {
                    let (fresh, old) = split_pool(state, *s, &added[g]);
                    match g.cmp(&pivot) {
                        Ordering::Less => combinations(&old, *k),
                        Ordering::Equal => with_fresh(&fresh, &old, *k),
                        Ordering::Greater => {
                            let pool: Vec<TokenId> = state.pool(*s).iter().copied().collect();
                            combinations(&pool, *k)
                        }
                    }
                })
                .collect();
            bindings.extend(product(groups));
        }
        bindings
    }

    fn insert(&mut self, binding: Binding) -> Option<MatchId> {
        if self.by_binding.contains_key(&binding) {
            return None;
        }
        let id = MatchId::new(self.next_id);
        self.next_id += 1;
        for token in &binding {
            self.by_token.entry(*token).or_default().insert(id);
        }
        self.by_binding.insert(binding.clone(), id);
        self.arena.insert(id, binding);
        Some(id)
    }

    fn remove(&mut self, id: MatchId) -> Option<Binding> {
        let binding = self.arena.remove(&id)?;
        self.by_binding.remove(&binding);
        for token in &binding {
            if let Some(ids) = self.by_token.get_mut(token) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_token.remove(token);
                }
            }
        }
        Some(binding)
    }
}

fn split_pool(
    state: &State,
    species: SpeciesId,
    fresh: &BTreeSet<TokenId>,
) -> (Vec<TokenId>, Vec<TokenId>) {
    state
        .pool(species)
        .iter()
        .copied()
        .partition(|token| fresh.contains(token))
}

/// `k`-subsets of `fresh ∪ old` containing at least one fresh token, sorted.
fn with_fresh(fresh: &[TokenId], old: &[TokenId], k: usize) -> Vec<Vec<TokenId>> {
    let mut choices = Vec::new();
    for j in 1..=k.min(fresh.len()) {
        if k - j > old.len() {
            continue;
        }
        for new_part in fresh.iter().copied().combinations(j) {
            for old_part in old.iter().copied().combinations(k - j) {
                let mut choice: Vec<TokenId> = new_part.iter().chain(&old_part).copied().collect();
                choice.sort_unstable();
                choices.push(choice);
            }
        }
    }
    choices
}
