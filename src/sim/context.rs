//! 仿真上下文：显式传递的随机源与仿真时钟，不存在模块级可变状态。
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sim::error::SimError;

#[derive(Debug, Clone)]
pub struct SimulationContext {
    rng: StdRng,
    now: f64,
    draws: u64,
}

impl SimulationContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            now: 0.0,
            draws: 0,
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// 已抽取的均匀随机数个数
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// 抽取一个 `[0, 1)` 上的随机数
    pub(crate) fn uniform(&mut self) -> f64 {
        self.draws += 1;
        self.rng.random::<f64>()
    }

    /// 把时钟推进到 `time`，时间不可倒流
    pub(crate) fn advance_to(&mut self, time: f64) -> Result<(), SimError> {
        if time < self.now || time.is_nan() {
            return Err(SimError::invariant(format!(
                "simulation time would move backwards from {} to {}",
                self.now, time
            )));
        }
        self.now = time;
        Ok(())
    }
}
