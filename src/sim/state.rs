//! 运行时状态：每个物种持有一组可区分身份、但属性相同的令牌。
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::net::ids::{SpeciesId, TokenId};
use crate::net::index_vec::IndexVec;
use crate::net::structure::{Marking, Weight};
use crate::sim::error::SimError;
use crate::sim::rule::Rule;

/// 一次发生销毁与创建的令牌
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    pub removed: Vec<(SpeciesId, TokenId)>,
    pub added: Vec<(SpeciesId, TokenId)>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// 按物种划分的令牌池，池内按令牌标识（即创建先后）排序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pools: IndexVec<SpeciesId, BTreeSet<TokenId>>,
    next_token: u64,
}

impl State {
    /// 标识中的每个单位对应一个新令牌
    pub fn from_marking(marking: &Marking) -> Self {
        let mut state = Self {
            pools: IndexVec::from_elem(BTreeSet::new(), marking.len()),
            next_token: 0,
        };
        for (species, count) in marking.iter() {
            for _ in 0..*count {
                state.mint(species);
            }
        }
        state
    }

    pub fn species_len(&self) -> usize {
        self.pools.len()
    }

    pub fn pool(&self, species: SpeciesId) -> &BTreeSet<TokenId> {
        &self.pools[species]
    }

    pub fn count(&self, species: SpeciesId) -> Weight {
        self.pools[species].len() as Weight
    }

    pub fn contains(&self, species: SpeciesId, token: TokenId) -> bool {
        self.pools[species].contains(&token)
    }

    pub fn marking(&self) -> Marking {
        Marking::new(self.pools.iter().map(|pool| pool.len() as Weight).collect())
    }

    fn mint(&mut self, species: SpeciesId) -> TokenId {
        let token = TokenId::new(self.next_token);
        self.next_token += 1;
        self.pools[species].insert(token);
        token
    }

    /// 在 `binding` 上应用 `rule`，`binding` 须与 `rule.before` 逐槽对应。
    ///
    /// 所有绑定令牌都被销毁，每个输出槽得到新令牌，即便物种同时出现在两侧。
    /// 出错时状态保持不变。
    pub fn apply(&mut self, rule: &Rule, binding: &[TokenId]) -> Result<StateDelta, SimError> {
        if binding.len() != rule.before.len() {
            return Err(SimError::invariant(format!(
                "binding of {} tokens does not fit `{}` with {} input slots",
                binding.len(),
                rule.name,
                rule.before.len()
            )));
        }
        for (species, token) in rule.before.iter().zip(binding) {
            if !self.contains(*species, *token) {
                return Err(SimError::invariant(format!(
                    "`{}` bound token {} which is not present in {}",
                    rule.name, token, species
                )));
            }
        }
        let mut seen = binding.to_vec();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != binding.len() {
            return Err(SimError::invariant(format!(
                "`{}` bound the same token twice",
                rule.name
            )));
        }

        let mut delta = StateDelta::default();
        for (species, token) in rule.before.iter().zip(binding) {
            self.pools[*species].remove(token);
            delta.removed.push((*species, *token));
        }
        for species in rule.after.iter() {
            let token = self.mint(*species);
            delta.added.push((*species, token));
        }
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::core::Net;
    use crate::net::ids::TransitionId;
    use crate::net::structure::Multiset;
    use crate::sim::rule;

    fn setup() -> (Net, State) {
        let net = Net::labeled(["A", "B"])
            .unwrap()
            .with_transition(
                "swap",
                Multiset::new().with("A", 1),
                Multiset::new().with("A", 1).with("B", 1),
            )
            .unwrap();
        let marking = net.marking_from(&Multiset::new().with("A", 2)).unwrap();
        (net, State::from_marking(&marking))
    }

    #[test]
    fn tokens_are_minted_in_order() {
        let (_, state) = setup();
        let a = SpeciesId::new(0);
        assert_eq!(
            state.pool(a).iter().copied().collect::<Vec<_>>(),
            vec![TokenId::new(0), TokenId::new(1)]
        );
        assert_eq!(state.marking().tokens(a), 2);
    }

    #[test]
    fn apply_destroys_and_recreates_shared_species() {
        let (net, mut state) = setup();
        let rule = rule::compile(&net, net.transition_id("swap").unwrap()).unwrap();
        let a = SpeciesId::new(0);
        let b = SpeciesId::new(1);

        let delta = state.apply(&rule, &[TokenId::new(0)]).unwrap();

        assert_eq!(delta.removed, vec![(a, TokenId::new(0))]);
        assert_eq!(delta.added, vec![(a, TokenId::new(2)), (b, TokenId::new(3))]);
        assert!(!state.contains(a, TokenId::new(0)));
        assert_eq!(state.count(a), 2);
        assert_eq!(state.count(b), 1);
    }

    #[test]
    fn apply_rejects_stale_binding_without_mutating() {
        let (net, mut state) = setup();
        let rule = rule::compile(&net, TransitionId::new(0)).unwrap();
        let before = state.clone();

        let err = state.apply(&rule, &[TokenId::new(99)]).unwrap_err();
        assert!(matches!(err, SimError::InvariantViolation(_)));
        assert_eq!(state, before);

        assert!(state.apply(&rule, &[]).is_err());
    }
}
