//! Agent configuration as reported over `CONFIG_RESPONSE`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::time::Duration;

/// Memory controller used when none is configured.
pub const DEFAULT_MEMORY_CONTROLLER: &str = "basic";

/// Tick used when none is configured.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Errors raised while building an [`AgentConfiguration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A memory item without at least `kind:name`.
    InvalidMemoryItem(String),
    /// A tick that is not a duration string.
    InvalidTick(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMemoryItem(item) => {
                write!(f, "bad value in memory item \"{item}\": unknown number of parts")
            }
            Self::InvalidTick(tick) => write!(f, "invalid tick duration \"{tick}\""),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration of one simulated agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfiguration {
    /// Agent name.
    pub name: String,
    /// Memory controller identifier.
    #[serde(
        rename = "memorycontroller",
        default = "default_memory_controller",
        deserialize_with = "memory_controller_or_default"
    )]
    pub memory_controller: String,
    /// Initial memory: kind -> variable name -> initial values.
    #[serde(default)]
    pub memory: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// Behaviour rule identifiers.
    #[serde(default)]
    pub rules: Vec<String>,
    /// Peer endpoint addresses.
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Evaluation period, integer nanoseconds on the wire.
    #[serde(default = "default_tick", with = "tick")]
    pub tick: Duration,
}

impl AgentConfiguration {
    /// Create a configuration with the default controller and tick.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            memory_controller: default_memory_controller(),
            memory: BTreeMap::new(),
            rules: Vec::new(),
            endpoints: Vec::new(),
            tick: DEFAULT_TICK,
        }
    }

    /// Parse a `kind:name[:values]` item and add it to the initial memory.
    ///
    /// Values stay as written after the second colon, split on commas. A
    /// missing value part declares the variable without initial values.
    pub fn add_memory_item(&mut self, item: &str) -> Result<(), ConfigError> {
        let mut parts = item.splitn(3, ':');
        let (Some(kind), Some(name)) = (parts.next(), parts.next()) else {
            return Err(ConfigError::InvalidMemoryItem(item.to_owned()));
        };
        let values = match parts.next() {
            Some(values) if !values.is_empty() => values.split(',').map(str::to_owned).collect(),
            _ => Vec::new(),
        };
        self.memory
            .entry(kind.to_owned())
            .or_default()
            .insert(name.to_owned(), values);
        Ok(())
    }

    /// Set the memory controller; empty input keeps the current one.
    pub fn set_memory_controller(&mut self, controller: &str) {
        if !controller.is_empty() {
            self.memory_controller = controller.to_owned();
        }
    }

    /// Set the tick from a duration string; empty input keeps the current one.
    pub fn set_tick(&mut self, tick: &str) -> Result<(), ConfigError> {
        if tick.is_empty() {
            return Ok(());
        }
        self.tick = parse_tick(tick).ok_or_else(|| ConfigError::InvalidTick(tick.to_owned()))?;
        Ok(())
    }

    /// Flatten the initial memory into `kind:name:v1,v2` strings.
    pub fn memory_items(&self) -> Vec<String> {
        self.memory
            .iter()
            .flat_map(|(kind, vars)| {
                vars.iter()
                    .map(move |(name, values)| format!("{kind}:{name}:{}", values.join(",")))
            })
            .collect()
    }
}

fn default_memory_controller() -> String {
    DEFAULT_MEMORY_CONTROLLER.to_owned()
}

fn default_tick() -> Duration {
    DEFAULT_TICK
}

fn memory_controller_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let controller = String::deserialize(deserializer)?;
    if controller.is_empty() {
        Ok(default_memory_controller())
    } else {
        Ok(controller)
    }
}

/// Tick as integer nanoseconds; zero means unset.
mod tick {
    use super::*;

    pub fn serialize<S: Serializer>(tick: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(tick.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match u64::deserialize(deserializer)? {
            0 => Ok(DEFAULT_TICK),
            nanos => Ok(Duration::from_nanos(nanos)),
        }
    }
}

/// Parse a duration string such as `"500ms"`, `"1.5s"` or `"1h2m3s"`.
///
/// Accepted units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare
/// `"0"` is zero. Returns `None` on anything else.
pub fn parse_tick(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input == "0" {
        return Some(Duration::ZERO);
    }
    if input.is_empty() {
        return None;
    }

    let mut total: u128 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            _ => return None,
        };

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if !whole.is_empty() {
            let value = whole.parse::<u128>().ok()?.checked_mul(scale)?;
            total = total.checked_add(value)?;
        }
        if !frac.is_empty() {
            if !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let digits = &frac[..frac.len().min(18)];
            let value: u128 = digits.parse().ok()?;
            let value = value.checked_mul(scale)? / 10u128.pow(digits.len() as u32);
            total = total.checked_add(value)?;
        }
        rest = tail;
    }

    u64::try_from(total).ok().map(Duration::from_nanos)
}

/// Render a duration the way agents print their tick (`"1s"`, `"1m30s"`).
pub fn format_tick(tick: Duration) -> String {
    let nanos = tick.as_nanos();
    if nanos == 0 {
        return "0s".to_owned();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 1_000));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos, 1_000_000));
    }

    let total_secs = tick.as_secs();
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = decimal(nanos % 60_000_000_000, 1_000_000_000);

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(out, "{seconds}s");
    out
}

/// `value / unit` with the remainder as trimmed decimal digits.
fn decimal(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let rem = value % unit;
    if rem == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{rem:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
