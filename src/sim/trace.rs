//! 发生记录与轨迹。
use serde::{Deserialize, Serialize};

use crate::net::ids::{TokenId, TransitionId};
use crate::net::structure::{Marking, Weight};

/// 一次发生：时间、迁移与被消耗的令牌
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiringRecord {
    pub time: f64,
    pub transition: TransitionId,
    pub name: String,
    pub binding: Vec<TokenId>,
}

/// 每次发生后的令牌数，首项为初始标识
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub species: Vec<String>,
    pub points: Vec<(f64, Marking)>,
}

impl Trajectory {
    pub fn new(species: Vec<String>) -> Self {
        Self {
            species,
            points: Vec::new(),
        }
    }

    pub fn record(&mut self, time: f64, marking: Marking) {
        self.points.push((time, marking));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `species` 随时间的计数；未记录该物种时为 `None`
    pub fn series(&self, species: &str) -> Option<Vec<(f64, Weight)>> {
        let column = self.species.iter().position(|s| s == species)?;
        Some(
            self.points
                .iter()
                .map(|(time, marking)| (*time, marking.0.as_slice()[column]))
                .collect(),
        )
    }
}
