use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{DEGRADE_SUFFIX, ITERATIONS_SUFFIX, OFFSET_SUFFIX};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("unknown option '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for option '{key}'")]
    InvalidValue { key: String, value: String },
    #[error("option '{key}' expects {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// A stored option value. Integer options reject fractional input.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i64),
    Float(f64),
}

impl OptionValue {
    pub fn as_f64(self) -> f64 {
        match self {
            OptionValue::Int(v) => v as f64,
            OptionValue::Float(v) => v,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Float(v) => write!(f, "{v}"),
        }
    }
}

pub type SubscriptionId = u64;

type Observer = (SubscriptionId, String, Rc<dyn Fn()>);

/// Option store shared between the blur pipelines and whoever edits the
/// tunables.
///
/// Every change to a value notifies the observers subscribed to that key.
/// Single-threaded: share it as `Rc<BlurConfig>`.
#[derive(Default)]
pub struct BlurConfig {
    values: RefCell<BTreeMap<String, OptionValue>>,
    observers: RefCell<Vec<Observer>>,
    next_id: Cell<SubscriptionId>,
}

impl BlurConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key` with `default` unless it already exists.
    pub fn register(&self, key: &str, default: OptionValue) {
        self.values
            .borrow_mut()
            .entry(key.to_string())
            .or_insert(default);
    }

    pub fn get(&self, key: &str) -> Option<OptionValue> {
        self.values.borrow().get(key).copied()
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            OptionValue::Int(v) => Some(v),
            OptionValue::Float(v) => Some(v.round() as i64),
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).map(OptionValue::as_f64)
    }

    pub fn set_int(&self, key: &str, value: i64) -> Result<(), ConfigError> {
        match self.get(key) {
            None => Err(ConfigError::UnknownKey(key.to_string())),
            Some(OptionValue::Int(_)) => self.store(key, OptionValue::Int(value)),
            Some(OptionValue::Float(_)) => self.store(key, OptionValue::Float(value as f64)),
        }
    }

    pub fn set_float(&self, key: &str, value: f64) -> Result<(), ConfigError> {
        match self.get(key) {
            None => Err(ConfigError::UnknownKey(key.to_string())),
            Some(OptionValue::Int(_)) => Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: "an integer",
            }),
            Some(OptionValue::Float(_)) => self.store(key, OptionValue::Float(value)),
        }
    }

    /// Parses `value` according to the type `key` was registered with.
    pub fn apply_str(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let trimmed = value.trim();
        match self.get(key) {
            None => Err(ConfigError::UnknownKey(key.to_string())),
            Some(OptionValue::Int(_)) => {
                let parsed = trimmed.parse::<i64>().map_err(|_| invalid())?;
                self.store(key, OptionValue::Int(parsed))
            }
            Some(OptionValue::Float(_)) => {
                let parsed = trimmed.parse::<f64>().map_err(|_| invalid())?;
                if !parsed.is_finite() {
                    return Err(invalid());
                }
                self.store(key, OptionValue::Float(parsed))
            }
        }
    }

    /// Calls `callback` after every change to `key`.
    pub fn subscribe(&self, key: &str, callback: Rc<dyn Fn()>) -> SubscriptionId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.observers
            .borrow_mut()
            .push((id, key.to_string(), callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.observers.borrow_mut().retain(|(sid, _, _)| *sid != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// Snapshot of every registered option, in key order.
    pub fn entries(&self) -> Vec<(String, OptionValue)> {
        self.values
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    fn store(&self, key: &str, value: OptionValue) -> Result<(), ConfigError> {
        let previous = self.values.borrow_mut().insert(key.to_string(), value);
        if previous == Some(value) {
            return Ok(());
        }
        log::debug!("Option {key} = {value}");

        // Callbacks may read or subscribe, so none of the cells stay borrowed.
        let callbacks: Vec<Rc<dyn Fn()>> = self
            .observers
            .borrow()
            .iter()
            .filter(|(_, k, _)| k == key)
            .map(|(_, _, cb)| Rc::clone(cb))
            .collect();
        for callback in callbacks {
            callback();
        }
        Ok(())
    }
}

impl fmt::Debug for BlurConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlurConfig")
            .field("values", &self.values.borrow())
            .field("observers", &self.observers.borrow().len())
            .finish()
    }
}

/// `<algorithm>_<suffix>`, e.g. `kawase_offset`.
pub fn option_key(algorithm: &str, suffix: &str) -> String {
    format!("{algorithm}_{suffix}")
}

/// The three option keys of one algorithm.
pub fn option_keys(algorithm: &str) -> [String; 3] {
    [
        option_key(algorithm, OFFSET_SUFFIX),
        option_key(algorithm, DEGRADE_SUFFIX),
        option_key(algorithm, ITERATIONS_SUFFIX),
    ]
}

/// Tunables of one algorithm, read once per frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlurParameters {
    /// Sample spacing in pixels of the downsampled image.
    pub offset: f64,
    /// Downsample factor, at least 1.
    pub degrade: u32,
    /// Number of blur iterations; 0 disables blurring for all but bokeh.
    pub iterations: u32,
}

impl BlurParameters {
    pub const fn new(offset: f64, degrade: u32, iterations: u32) -> Self {
        Self {
            offset,
            degrade,
            iterations,
        }
    }

    /// Registers the option keys of `algorithm` with these values as defaults.
    pub fn register_defaults(&self, config: &BlurConfig, algorithm: &str) {
        let [offset, degrade, iterations] = option_keys(algorithm);
        config.register(&offset, OptionValue::Float(self.offset));
        config.register(&degrade, OptionValue::Int(self.degrade as i64));
        config.register(&iterations, OptionValue::Int(self.iterations as i64));
    }

    /// Reads the current values for `algorithm`, falling back to `defaults`
    /// for missing keys. Out-of-range values are clamped with a warning.
    pub fn snapshot(config: &BlurConfig, algorithm: &str, defaults: &BlurParameters) -> Self {
        let [offset_key, degrade_key, iterations_key] = option_keys(algorithm);

        let offset = config.get_float(&offset_key).unwrap_or(defaults.offset);
        let offset = if offset.is_finite() && offset >= 0.0 {
            offset
        } else {
            log::warn!("{offset_key} = {offset} is out of range, using 0");
            0.0
        };

        let degrade = config.get_int(&degrade_key).unwrap_or(defaults.degrade as i64);
        let degrade = if degrade >= 1 {
            degrade.min(u32::MAX as i64) as u32
        } else {
            log::warn!("{degrade_key} = {degrade} is out of range, using 1");
            1
        };

        let iterations = config
            .get_int(&iterations_key)
            .unwrap_or(defaults.iterations as i64);
        let iterations = if iterations >= 0 {
            iterations.min(u32::MAX as i64) as u32
        } else {
            log::warn!("{iterations_key} = {iterations} is out of range, using 0");
            0
        };

        Self::new(offset, degrade, iterations)
    }

    /// How far the blur reaches, in target pixels.
    pub fn blur_radius(&self) -> i32 {
        (self.offset * self.degrade as f64 * self.iterations as f64) as i32
    }
}
