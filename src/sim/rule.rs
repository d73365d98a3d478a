//! 规则编译：把迁移翻译为“先销毁、再创建”的重写规则。
//!
//! 前模式每个输入元素占一个令牌槽，后模式每个输出元素占一个新令牌槽，
//! 两者之间不共享任何令牌，即便同一物种同时出现在两侧。
use smallvec::SmallVec;

use crate::net::core::{Net, NetError};
use crate::net::ids::{SpeciesId, TransitionId};
use crate::net::index_vec::IndexVec;
use crate::net::structure::Multiset;
use crate::sim::error::SimError;

pub type Slots = SmallVec<[SpeciesId; 4]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub transition: TransitionId,
    pub name: String,
    /// 输入需求 `(物种, 重数)`，每个物种一项
    pub requirements: SmallVec<[(SpeciesId, usize); 4]>,
    /// 前模式：每个被消耗令牌一个槽，分组与 `requirements` 一致
    pub before: Slots,
    /// 后模式：每个新令牌一个槽
    pub after: Slots,
}

impl Rule {
    pub fn is_always_enabled(&self) -> bool {
        self.before.is_empty()
    }

    pub fn multiplicity(&self, species: SpeciesId) -> usize {
        self.requirements
            .iter()
            .find(|(s, _)| *s == species)
            .map_or(0, |(_, k)| *k)
    }
}

/// 把名称解析为物种，同一物种只成一组
fn resolve(
    net: &Net,
    transition: &str,
    multiset: &Multiset,
) -> Result<SmallVec<[(SpeciesId, usize); 4]>, NetError> {
    let mut groups: SmallVec<[(SpeciesId, usize); 4]> = SmallVec::new();
    for (name, count) in multiset.iter() {
        let species = net
            .species_id(name)
            .ok_or_else(|| NetError::UnknownSpecies {
                transition: transition.to_string(),
                species: name.to_string(),
            })?;
        match groups.iter_mut().find(|(s, _)| *s == species) {
            Some((_, k)) => *k += count as usize,
            None => groups.push((species, count as usize)),
        }
    }
    Ok(groups)
}

fn flatten(groups: &[(SpeciesId, usize)]) -> Slots {
    groups
        .iter()
        .flat_map(|(species, count)| std::iter::repeat_n(*species, *count))
        .collect()
}

/// 编译单个迁移；引用未声明物种时失败
pub fn compile(net: &Net, id: TransitionId) -> Result<Rule, SimError> {
    let transition = net
        .transition(id)
        .ok_or_else(|| SimError::invariant(format!("transition {id} is out of bounds")))?;
    let requirements = resolve(net, &transition.name, &transition.input)?;
    let produced = resolve(net, &transition.name, &transition.output)?;
    Ok(Rule {
        transition: id,
        name: transition.name.clone(),
        before: flatten(&requirements),
        after: flatten(&produced),
        requirements,
    })
}

/// 编译 `net` 的全部迁移，每个迁移标识一条规则
pub fn compile_net(net: &Net) -> Result<IndexVec<TransitionId, Rule>, SimError> {
    if net.species_len() == 0 {
        return Err(NetError::NoSpecies.into());
    }
    net.transitions
        .indices()
        .map(|id| compile(net, id))
        .collect::<Result<Vec<_>, _>>()
        .map(IndexVec::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalysis() -> Net {
        Net::labeled(["E", "S", "P"])
            .unwrap()
            .with_transition(
                "bind",
                Multiset::new().with("E", 1).with("S", 2),
                Multiset::new().with("E", 1).with("P", 1),
            )
            .unwrap()
            .with_transition("feed", Multiset::new(), Multiset::new().with("S", 1))
            .unwrap()
    }

    #[test]
    fn slots_follow_multiplicities() {
        let net = catalysis();
        let rule = compile(&net, TransitionId::new(0)).unwrap();
        let (e, s, p) = (SpeciesId::new(0), SpeciesId::new(1), SpeciesId::new(2));
        assert_eq!(rule.before.as_slice(), &[e, s, s]);
        assert_eq!(rule.after.as_slice(), &[e, p]);
        assert_eq!(rule.multiplicity(s), 2);
        assert_eq!(rule.multiplicity(p), 0);
    }

    #[test]
    fn empty_input_compiles_to_always_enabled_rule() {
        let rules = compile_net(&catalysis()).unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules[TransitionId::new(1)].is_always_enabled());
        assert!(!rules[TransitionId::new(0)].is_always_enabled());
    }

    #[test]
    fn undeclared_species_is_malformed() {
        let net = Net::labeled(["A"])
            .unwrap()
            .with_transition("leak", Multiset::new().with("A", 1), Multiset::new().with("Z", 1))
            .unwrap();
        assert_eq!(
            compile_net(&net).unwrap_err(),
            SimError::MalformedNet(NetError::UnknownSpecies {
                transition: "leak".into(),
                species: "Z".into(),
            })
        );
    }

    #[test]
    fn net_without_species_is_malformed() {
        assert_eq!(
            compile_net(&Net::indexed(0)).unwrap_err(),
            SimError::MalformedNet(NetError::NoSpecies)
        );
    }
}
