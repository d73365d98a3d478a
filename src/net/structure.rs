//! 反应网静态结构元素：物种、多重集、迁移与标识。
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::net::ids::SpeciesId;
use crate::net::index_vec::IndexVec;

pub type Weight = u64;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Species {
    pub name: String,
}

impl Species {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// 以物种名为键的多重集，保持声明顺序。
///
/// 不存储零重数，因此 `{A: 0}` 与 `{}` 相等。
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Multiset(IndexMap<String, Weight>);

impl Multiset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, species: impl Into<String>, count: Weight) -> Self {
        self.add(species, count);
        self
    }

    pub fn add(&mut self, species: impl Into<String>, count: Weight) {
        if count == 0 {
            return;
        }
        *self.0.entry(species.into()).or_insert(0) += count;
    }

    pub fn count(&self, species: &str) -> Weight {
        self.0.get(species).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Weight)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

impl<S: Into<String>> FromIterator<(S, Weight)> for Multiset {
    fn from_iter<It: IntoIterator<Item = (S, Weight)>>(iter: It) -> Self {
        let mut multiset = Multiset::new();
        for (species, count) in iter {
            multiset.add(species, count);
        }
        multiset
    }
}

impl fmt::Debug for Multiset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// 迁移：消耗 `input` 多重集，产生 `output` 多重集。创建后不可变。
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transition {
    pub name: String,
    pub input: Multiset,
    pub output: Multiset,
}

impl Transition {
    pub fn new(name: impl Into<String>, input: Multiset, output: Multiset) -> Self {
        Self {
            name: name.into(),
            input,
            output,
        }
    }

    /// 无输入需求：任何状态下恰有一个匹配。
    pub fn is_always_enabled(&self) -> bool {
        self.input.is_empty()
    }

    pub fn mentions(&self, species: &str) -> bool {
        self.input.count(species) > 0 || self.output.count(species) > 0
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?} -> {:?}", self.name, self.input, self.output)
    }
}

/// 各物种的令牌数
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Marking(pub IndexVec<SpeciesId, Weight>);

impl Marking {
    pub fn new(initial: IndexVec<SpeciesId, Weight>) -> Self {
        Self(initial)
    }

    pub fn zeros(species: usize) -> Self {
        Self(IndexVec::from_elem(0, species))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpeciesId, &Weight)> {
        self.0.iter_enumerated()
    }

    pub fn tokens(&self, species: SpeciesId) -> Weight {
        self.0[species]
    }

    pub fn tokens_mut(&mut self, species: SpeciesId) -> &mut Weight {
        &mut self.0[species]
    }

    pub fn total(&self) -> Weight {
        self.0.iter().sum()
    }
}

impl Hash for Marking {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in self.0.iter() {
            value.hash(state);
        }
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (species, tokens) in self.iter() {
            map.entry(&species, tokens);
        }
        map.finish()
    }
}
