//! 发生时间分布：以逆变换采样把一个均匀变量映射为延迟。
//!
//! 时钟每次启用恰好抽取一个 `u ∈ [0, 1)`，分布本身不接触随机源，
//! 因此固定种子下的运行可以完全复现。
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 时钟（重新）启用时分布可依赖的信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockContext {
    /// 当前仿真时间
    pub now: f64,
    /// 该匹配的时钟首次启用的时间
    pub enabled_at: f64,
}

impl ClockContext {
    pub fn elapsed(&self) -> f64 {
        self.now - self.enabled_at
    }
}

/// 发生时间分布，以逆变换采样。
///
/// `delay` 把 `u ∈ [0, 1)` 映射为相对 `clock.now` 的非负延迟；
/// `f64::INFINITY` 表示该时钟永不发生。
pub trait FiringDistribution: fmt::Debug + Send + Sync {
    fn delay(&self, u: f64, clock: &ClockContext) -> f64;
}

/// 按迁移名索引的分布
pub type Distributions = IndexMap<String, Arc<dyn FiringDistribution>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exponential {
    pub rate: f64,
}

impl FiringDistribution for Exponential {
    fn delay(&self, u: f64, _clock: &ClockContext) -> f64 {
        if self.rate <= 0.0 {
            return f64::INFINITY;
        }
        -(1.0 - u).ln() / self.rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weibull {
    pub shape: f64,
    pub scale: f64,
}

impl FiringDistribution for Weibull {
    fn delay(&self, u: f64, _clock: &ClockContext) -> f64 {
        self.scale * (-(1.0 - u).ln()).powf(1.0 / self.shape)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform {
    pub low: f64,
    pub high: f64,
}

impl FiringDistribution for Uniform {
    fn delay(&self, u: f64, _clock: &ClockContext) -> f64 {
        self.low + u * (self.high - self.low)
    }
}

/// 确定延迟；随机数照常抽取但不使用
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fixed {
    pub delay: f64,
}

impl FiringDistribution for Fixed {
    fn delay(&self, _u: f64, _clock: &ClockContext) -> f64 {
        self.delay
    }
}

pub struct FromFn<F>(F);

impl<F> fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FromFn(..)")
    }
}

impl<F> FiringDistribution for FromFn<F>
where
    F: Fn(f64, &ClockContext) -> f64 + Send + Sync,
{
    fn delay(&self, u: f64, clock: &ClockContext) -> f64 {
        (self.0)(u, clock)
    }
}

/// 包装调用方提供的函数，例如随时间变化的风险率
pub fn from_fn<F>(f: F) -> Arc<dyn FiringDistribution>
where
    F: Fn(f64, &ClockContext) -> f64 + Send + Sync + 'static,
{
    Arc::new(FromFn(f))
}

/// 内置分布的可序列化描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistributionSpec {
    Exponential { rate: f64 },
    Weibull { shape: f64, scale: f64 },
    Uniform { low: f64, high: f64 },
    Fixed { delay: f64 },
}

impl DistributionSpec {
    /// 校验参数并构造分布
    pub fn build(&self) -> Result<Arc<dyn FiringDistribution>, String> {
        let finite_non_negative = |name: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(format!("{name} must be finite and non-negative, got {value}"))
            }
        };
        Ok(match *self {
            DistributionSpec::Exponential { rate } => {
                finite_non_negative("rate", rate)?;
                Arc::new(Exponential { rate })
            }
            DistributionSpec::Weibull { shape, scale } => {
                finite_non_negative("scale", scale)?;
                if !(shape.is_finite() && shape > 0.0) {
                    return Err(format!("shape must be finite and positive, got {shape}"));
                }
                Arc::new(Weibull { shape, scale })
            }
            DistributionSpec::Uniform { low, high } => {
                finite_non_negative("low", low)?;
                finite_non_negative("high", high)?;
                if high < low {
                    return Err(format!("uniform bounds are inverted: [{low}, {high}]"));
                }
                Arc::new(Uniform { low, high })
            }
            DistributionSpec::Fixed { delay } => {
                finite_non_negative("delay", delay)?;
                Arc::new(Fixed { delay })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT_ZERO: ClockContext = ClockContext {
        now: 0.0,
        enabled_at: 0.0,
    };

    #[test]
    fn exponential_inverse_cdf() {
        let exp = Exponential { rate: 2.0 };
        assert_eq!(exp.delay(0.0, &AT_ZERO), 0.0);
        let median = exp.delay(0.5, &AT_ZERO);
        assert!((median - std::f64::consts::LN_2 / 2.0).abs() < 1e-12);
        assert_eq!(Exponential { rate: 0.0 }.delay(0.5, &AT_ZERO), f64::INFINITY);
    }

    #[test]
    fn weibull_with_shape_one_is_exponential() {
        let weibull = Weibull {
            shape: 1.0,
            scale: 0.5,
        };
        let exp = Exponential { rate: 2.0 };
        for u in [0.1, 0.5, 0.9] {
            assert!((weibull.delay(u, &AT_ZERO) - exp.delay(u, &AT_ZERO)).abs() < 1e-12);
        }
    }

    #[test]
    fn uniform_and_fixed() {
        let uniform = Uniform {
            low: 1.0,
            high: 3.0,
        };
        assert_eq!(uniform.delay(0.5, &AT_ZERO), 2.0);
        assert_eq!(Fixed { delay: 4.0 }.delay(0.99, &AT_ZERO), 4.0);
    }

    #[test]
    fn closures_see_clock_context() {
        let ramp = from_fn(|_, clock| 1.0 + clock.now);
        let clock = ClockContext {
            now: 2.0,
            enabled_at: 1.5,
        };
        assert_eq!(ramp.delay(0.3, &clock), 3.0);
        assert_eq!(clock.elapsed(), 0.5);
    }

    #[test]
    fn spec_parses_from_toml_and_validates() {
        let spec: DistributionSpec = toml::from_str("kind = \"exponential\"\nrate = 0.25").unwrap();
        assert_eq!(spec, DistributionSpec::Exponential { rate: 0.25 });
        assert!(spec.build().is_ok());

        assert!(DistributionSpec::Weibull { shape: 0.0, scale: 1.0 }.build().is_err());
        assert!(DistributionSpec::Uniform { low: 2.0, high: 1.0 }.build().is_err());
        assert!(DistributionSpec::Fixed { delay: f64::NAN }.build().is_err());
    }
}
