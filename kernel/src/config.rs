//! Scheduler configuration
//!
//! Compile-time defaults plus a reader for the kernel's `key = value`
//! configuration file. Only the keys below are understood; anything else is
//! logged and skipped.
//!
//! | key                          | field              |
//! |------------------------------|--------------------|
//! | `scheduler.policy`           | `policy`           |
//! | `scheduler.agingTime`        | `aging_interval`   |
//! | `scheduler.minPriorityValue` | `priority_min`     |
//! | `scheduler.maxPriorityValue` | `priority_max`     |
//! | `scheduler.defaultPriority`  | `priority_default` |
//! | `scheduler.priorityDonation` | `priority_donation`|
//! | `scheduler.bandLimits`       | `band_limits`      |
//! | `Kernel.numThreads`          | `capacity_hint`    |

use crate::scheduler::core::error::{SchedulerError, SchedulerResult};
use crate::scheduler::Priority;
use crate::time::Ticks;
use core::fmt;
use core::str::FromStr;

/// Most urgent priority
pub const PRIORITY_MIN: Priority = 1;

/// Least urgent priority
pub const PRIORITY_MAX: Priority = 40;

/// Priority given to a thread on first access
pub const PRIORITY_DEFAULT: Priority = 1;

/// Aging interval in ticks (0 = aging disabled)
pub const DEFAULT_AGING_INTERVAL: Ticks = 0;

/// Upper (inclusive) priority of the first two multi-level bands
pub const DEFAULT_BAND_LIMITS: [Priority; 2] = [10, 20];

/// Expected thread population, used to pre-size queues
pub const DEFAULT_CAPACITY_HINT: usize = 16;

/// Wait queue policy, selected once per scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueuePolicyKind {
    /// Ordered by effective priority, FIFO among equals, no aging
    Strict,
    /// Strict ordering re-ranked by wait time on every dequeue
    Aging,
    /// Three FIFO bands with aging-driven migration
    MultiLevel,
}

impl QueuePolicyKind {
    /// Does this policy adjust priorities over time?
    pub fn ages(&self) -> bool {
        matches!(self, Self::Aging | Self::MultiLevel)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Aging => "aging",
            Self::MultiLevel => "multilevel",
        }
    }
}

impl Default for QueuePolicyKind {
    fn default() -> Self {
        Self::Strict
    }
}

impl fmt::Display for QueuePolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueuePolicyKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("strict") || s.eq_ignore_ascii_case("static") {
            Ok(Self::Strict)
        } else if s.eq_ignore_ascii_case("aging") || s.eq_ignore_ascii_case("dynamic") {
            Ok(Self::Aging)
        } else if s.eq_ignore_ascii_case("multilevel") || s.eq_ignore_ascii_case("mlfq") {
            Ok(Self::MultiLevel)
        } else {
            Err(SchedulerError::InvalidConfig {
                reason: "unknown scheduler.policy",
            })
        }
    }
}

/// Scheduler parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Wait queue policy
    pub policy: QueuePolicyKind,

    /// Most urgent allowed priority
    pub priority_min: Priority,

    /// Least urgent allowed priority
    pub priority_max: Priority,

    /// Priority assigned on first access
    pub priority_default: Priority,

    /// Ticks per aging step (0 disables aging)
    pub aging_interval: Ticks,

    /// Donate priority through locks
    pub priority_donation: bool,

    /// Inclusive upper priorities of bands 0 and 1; band 2 takes the rest
    pub band_limits: [Priority; 2],

    /// Expected thread population
    pub capacity_hint: usize,
}

impl SchedulerConfig {
    /// Defaults: strict policy, 1..=40, donation on, aging off
    pub const fn new() -> Self {
        Self {
            policy: QueuePolicyKind::Strict,
            priority_min: PRIORITY_MIN,
            priority_max: PRIORITY_MAX,
            priority_default: PRIORITY_DEFAULT,
            aging_interval: DEFAULT_AGING_INTERVAL,
            priority_donation: true,
            band_limits: DEFAULT_BAND_LIMITS,
            capacity_hint: DEFAULT_CAPACITY_HINT,
        }
    }

    pub const fn with_policy(mut self, policy: QueuePolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub const fn with_priority_range(mut self, min: Priority, max: Priority) -> Self {
        self.priority_min = min;
        self.priority_max = max;
        self
    }

    pub const fn with_default_priority(mut self, priority: Priority) -> Self {
        self.priority_default = priority;
        self
    }

    pub const fn with_aging_interval(mut self, interval: Ticks) -> Self {
        self.aging_interval = interval;
        self
    }

    pub const fn with_donation(mut self, enabled: bool) -> Self {
        self.priority_donation = enabled;
        self
    }

    pub const fn with_band_limits(mut self, limits: [Priority; 2]) -> Self {
        self.band_limits = limits;
        self
    }

    /// Is `priority` inside `[priority_min, priority_max]`?
    #[inline]
    pub fn in_range(&self, priority: Priority) -> bool {
        priority >= self.priority_min && priority <= self.priority_max
    }

    /// Clamp `priority` into `[priority_min, priority_max]`
    #[inline]
    pub fn clamp(&self, priority: Priority) -> Priority {
        priority.clamp(self.priority_min, self.priority_max)
    }

    /// Check internal consistency
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.priority_min > self.priority_max {
            return Err(SchedulerError::InvalidConfig {
                reason: "priority_min exceeds priority_max",
            });
        }
        if !self.in_range(self.priority_default) {
            return Err(SchedulerError::InvalidConfig {
                reason: "priority_default outside priority range",
            });
        }
        if self.band_limits[0] >= self.band_limits[1] {
            return Err(SchedulerError::InvalidConfig {
                reason: "band limits must be strictly increasing",
            });
        }
        Ok(())
    }

    /// Read a `key = value` config text on top of the defaults
    pub fn parse(text: &str) -> SchedulerResult<Self> {
        let mut config = Self::new();

        for raw in text.lines() {
            let line = match raw.split_once('#') {
                Some((before, _)) => before,
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or(SchedulerError::InvalidConfig {
                reason: "expected `key = value`",
            })?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "scheduler.policy" => config.policy = value.parse()?,
                "scheduler.agingTime" => config.aging_interval = parse_number(value)?,
                "scheduler.minPriorityValue" => config.priority_min = parse_number(value)?,
                "scheduler.maxPriorityValue" => config.priority_max = parse_number(value)?,
                "scheduler.defaultPriority" => config.priority_default = parse_number(value)?,
                "scheduler.priorityDonation" => config.priority_donation = parse_bool(value)?,
                "scheduler.bandLimits" => config.band_limits = parse_bands(value)?,
                "Kernel.numThreads" => config.capacity_hint = parse_number(value)?,
                _ => log::warn!("config: ignoring unknown key `{}`", key),
            }
        }

        config.validate()?;
        log::debug!(
            "config: policy={} range={}..={} aging={} donation={}",
            config.policy,
            config.priority_min,
            config.priority_max,
            config.aging_interval,
            config.priority_donation
        );
        Ok(config)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number<T: FromStr>(value: &str) -> SchedulerResult<T> {
    value.parse().map_err(|_| SchedulerError::InvalidConfig {
        reason: "expected a number",
    })
}

fn parse_bool(value: &str) -> SchedulerResult<bool> {
    match value {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SchedulerError::InvalidConfig {
            reason: "expected a boolean",
        }),
    }
}

fn parse_bands(value: &str) -> SchedulerResult<[Priority; 2]> {
    let (low, high) = value.split_once(',').ok_or(SchedulerError::InvalidConfig {
        reason: "scheduler.bandLimits expects `low,high`",
    })?;
    Ok([parse_number(low.trim())?, parse_number(high.trim())?])
}
