//! 反应网定义：物种命名方式、迁移集合与连通性诊断。
use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::ids::{SpeciesId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Marking, Multiset, Species, Transition};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("net declares no species")]
    NoSpecies,
    #[error("species `{0}` is declared more than once")]
    DuplicateSpecies(String),
    #[error("transition `{0}` is declared more than once")]
    DuplicateTransition(String),
    #[error("transition `{transition}` references undeclared species `{species}`")]
    UnknownSpecies { transition: String, species: String },
    #[error("initial state references undeclared species `{0}`")]
    UnknownInitialSpecies(String),
}

/// 物种命名方式，建网时确定。
///
/// 带标签的网使用显式名称；索引网以十进制下标命名物种（`"0"`、`"1"`……），
/// 只接受规范写法，`"00"`、`"+0"` 等别名不会解析。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeciesNaming {
    Labeled(IndexVec<SpeciesId, Species>),
    Indexed(usize),
}

impl SpeciesNaming {
    pub fn len(&self) -> usize {
        match self {
            SpeciesNaming::Labeled(species) => species.len(),
            SpeciesNaming::Indexed(count) => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn species_name(&self, id: SpeciesId) -> Cow<'_, str> {
        match self {
            SpeciesNaming::Labeled(species) => Cow::Borrowed(species[id].name.as_str()),
            SpeciesNaming::Indexed(_) => Cow::Owned(id.index().to_string()),
        }
    }

    pub fn species_id(&self, name: &str) -> Option<SpeciesId> {
        match self {
            SpeciesNaming::Labeled(species) => species
                .iter_enumerated()
                .find(|(_, s)| s.name == name)
                .map(|(id, _)| id),
            SpeciesNaming::Indexed(count) => name
                .parse::<usize>()
                .ok()
                .filter(|idx| idx < count && idx.to_string() == name)
                .map(SpeciesId::from_usize),
        }
    }
}

impl fmt::Debug for SpeciesNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeciesNaming::Labeled(species) => f
                .debug_list()
                .entries(species.iter().map(|s| &s.name))
                .finish(),
            SpeciesNaming::Indexed(count) => write!(f, "Indexed({count})"),
        }
    }
}

/// 连通性诊断报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    /// 未被任何迁移引用的物种
    pub idle_species: Vec<String>,
    /// 输入物种无任何生产者的迁移（仅依赖初始令牌）
    pub starved_transitions: Vec<String>,
    pub total_species: usize,
    pub total_transitions: usize,
}

impl DiagnosticReport {
    pub fn has_issues(&self) -> bool {
        !self.idle_species.is_empty() || !self.starved_transitions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Net {
    pub naming: SpeciesNaming,
    pub transitions: IndexVec<TransitionId, Transition>,
}

impl Net {
    /// 按给定名称依次声明物种
    pub fn labeled<I, S>(names: I) -> Result<Self, NetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut species: IndexVec<SpeciesId, Species> = IndexVec::new();
        for name in names {
            let name = name.into();
            if species.iter().any(|s| s.name == name) {
                return Err(NetError::DuplicateSpecies(name));
            }
            species.push(Species::new(name));
        }
        Ok(Self {
            naming: SpeciesNaming::Labeled(species),
            transitions: IndexVec::new(),
        })
    }

    /// `count` 个以下标命名的匿名物种
    pub fn indexed(count: usize) -> Self {
        Self {
            naming: SpeciesNaming::Indexed(count),
            transitions: IndexVec::new(),
        }
    }

    pub fn add_transition(&mut self, transition: Transition) -> Result<TransitionId, NetError> {
        if self.transition_id(&transition.name).is_some() {
            return Err(NetError::DuplicateTransition(transition.name));
        }
        Ok(self.transitions.push(transition))
    }

    /// [`Net::add_transition`] 的构建器形式
    pub fn with_transition(
        mut self,
        name: impl Into<String>,
        input: Multiset,
        output: Multiset,
    ) -> Result<Self, NetError> {
        self.add_transition(Transition::new(name, input, output))?;
        Ok(self)
    }

    pub fn species_len(&self) -> usize {
        self.naming.len()
    }

    pub fn species(&self) -> impl Iterator<Item = SpeciesId> {
        (0..self.species_len()).map(SpeciesId::from_usize)
    }

    pub fn species_name(&self, id: SpeciesId) -> Cow<'_, str> {
        self.naming.species_name(id)
    }

    pub fn species_id(&self, name: &str) -> Option<SpeciesId> {
        self.naming.species_id(name)
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(id)
    }

    pub fn transition_id(&self, name: &str) -> Option<TransitionId> {
        self.transitions
            .iter_enumerated()
            .find(|(_, t)| t.name == name)
            .map(|(id, _)| id)
    }

    /// 检查网至少声明一个物种，且迁移只引用已声明的物种
    pub fn validate(&self) -> Result<(), NetError> {
        if self.naming.is_empty() {
            return Err(NetError::NoSpecies);
        }
        for transition in self.transitions.iter() {
            for (species, _) in transition.input.iter().chain(transition.output.iter()) {
                if self.species_id(species).is_none() {
                    return Err(NetError::UnknownSpecies {
                        transition: transition.name.clone(),
                        species: species.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// 把按名称给出的计数解析为标识；未提及的物种为零
    pub fn marking_from(&self, counts: &Multiset) -> Result<Marking, NetError> {
        let mut marking = Marking::zeros(self.species_len());
        for (name, count) in counts.iter() {
            let species = self
                .species_id(name)
                .ok_or_else(|| NetError::UnknownInitialSpecies(name.to_string()))?;
            *marking.tokens_mut(species) += count;
        }
        Ok(marking)
    }

    pub fn diagnose(&self) -> DiagnosticReport {
        let names: Vec<String> = self
            .species()
            .map(|s| self.species_name(s).into_owned())
            .collect();

        let idle_species = names
            .iter()
            .filter(|name| !self.transitions.iter().any(|t| t.mentions(name)))
            .cloned()
            .collect();

        let starved_transitions = self
            .transitions
            .iter()
            .filter(|t| {
                t.input.iter().any(|(species, _)| {
                    !self
                        .transitions
                        .iter()
                        .any(|producer| producer.output.count(species) > 0)
                })
            })
            .map(|t| t.name.clone())
            .collect();

        DiagnosticReport {
            idle_species,
            starved_transitions,
            total_species: names.len(),
            total_transitions: self.transitions_len(),
        }
    }

    pub fn log_diagnostics(&self) {
        let report = self.diagnose();
        if !report.has_issues() {
            log::info!(
                "net check passed: {} species, {} transitions",
                report.total_species,
                report.total_transitions
            );
            return;
        }
        for species in &report.idle_species {
            log::warn!("species `{}` is not used by any transition", species);
        }
        for transition in &report.starved_transitions {
            log::warn!(
                "transition `{}` consumes a species nothing produces; it can only fire on initial tokens",
                transition
            );
        }
    }
}
