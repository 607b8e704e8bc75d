// Instrument subscriptions loaded from an INI file, one section per instrument id:
//
//   [binance_btcusdt]
//   exchange = Binance
//   instmt_name = BTCUSDT
//   instmt_code = btcusdt
//   enabled = 1
//   depth = 10          ; optional, defaults to 5
//   poll_interval = 2   ; optional, defaults to 5
//   anything_else = ... ; kept in `params`

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::engine::depth::DEFAULT_DEPTH;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

const KEY_EXCHANGE: &str = "exchange";
const KEY_INSTMT_NAME: &str = "instmt_name";
const KEY_INSTMT_CODE: &str = "instmt_code";
const KEY_ENABLED: &str = "enabled";
const KEY_DEPTH: &str = "depth";
const KEY_POLL_INTERVAL: &str = "poll_interval";

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Failed to load subscriptions: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to read subscription file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Instrument section not found: {0}")]
    NotFound(String),

    #[error("Instrument {instmt_id}: missing required key '{key}'")]
    MissingKey { instmt_id: String, key: &'static str },

    #[error("Instrument {instmt_id}: invalid value '{value}' for '{key}'")]
    InvalidValue {
        instmt_id: String,
        key: &'static str,
        value: String,
    },
}

pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// Everything the collector needs to know about one subscribed instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub instmt_id: String,
    pub exchange_name: String,
    pub instmt_name: String,
    pub instmt_code: String,
    pub depth: usize,
    pub poll_interval_secs: u64,
    /// Exchange-specific keys not interpreted here.
    pub params: BTreeMap<String, String>,
}

pub struct SubscriptionManager {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl SubscriptionManager {
    /// Section names keep the case written in the file; option keys are lowercased.
    #[instrument]
    pub fn from_file(path: &Path) -> SubscriptionResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings = config::Config::builder()
            .add_source(config::File::from_str(&text, config::FileFormat::Ini))
            .build()?;
        let raw: BTreeMap<String, BTreeMap<String, String>> = settings.try_deserialize()?;

        // config may fold section names to lowercase; restore them from the headers
        let names = section_names(&text);
        let sections: BTreeMap<String, BTreeMap<String, String>> = raw
            .into_iter()
            .map(|(key, section)| {
                let name = names.get(&key.to_lowercase()).cloned().unwrap_or(key);
                let section = section.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
                (name, section)
            })
            .collect();
        info!(sections = sections.len(), "Loaded subscription file");
        Ok(Self::from_sections(sections))
    }

    pub fn from_sections(sections: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self { sections }
    }

    /// All section ids, enabled or not, in sorted order.
    pub fn instmt_ids(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }

    /// `Ok(None)` when the instrument exists but is disabled.
    pub fn instrument(&self, instmt_id: &str) -> SubscriptionResult<Option<Instrument>> {
        let section = self
            .sections
            .get(instmt_id)
            .ok_or_else(|| SubscriptionError::NotFound(instmt_id.to_string()))?;

        let required = |key: &'static str| -> SubscriptionResult<String> {
            match section.get(key) {
                Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
                _ => Err(SubscriptionError::MissingKey { instmt_id: instmt_id.to_string(), key }),
            }
        };

        let exchange_name = required(KEY_EXCHANGE)?;
        let instmt_name = required(KEY_INSTMT_NAME)?;
        let instmt_code = required(KEY_INSTMT_CODE)?;
        let enabled_raw = required(KEY_ENABLED)?;
        let enabled: i64 = enabled_raw.parse().map_err(|_| SubscriptionError::InvalidValue {
            instmt_id: instmt_id.to_string(),
            key: KEY_ENABLED,
            value: enabled_raw.clone(),
        })?;

        let depth = optional_number(section, instmt_id, KEY_DEPTH, DEFAULT_DEPTH);
        if depth == 0 {
            return Err(SubscriptionError::InvalidValue {
                instmt_id: instmt_id.to_string(),
                key: KEY_DEPTH,
                value: depth.to_string(),
            });
        }
        let poll_interval_secs =
            optional_number(section, instmt_id, KEY_POLL_INTERVAL, DEFAULT_POLL_INTERVAL_SECS);

        let params = section
            .iter()
            .filter(|(k, _)| {
                ![KEY_EXCHANGE, KEY_INSTMT_NAME, KEY_INSTMT_CODE, KEY_ENABLED, KEY_DEPTH, KEY_POLL_INTERVAL]
                    .contains(&k.as_str())
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if enabled != 1 {
            debug!(instmt_id, enabled, "Skipping disabled instrument");
            return Ok(None);
        }

        Ok(Some(Instrument {
            instmt_id: instmt_id.to_string(),
            exchange_name,
            instmt_name,
            instmt_code,
            depth,
            poll_interval_secs,
            params,
        }))
    }

    /// Every enabled instrument.
    pub fn subscriptions(&self) -> SubscriptionResult<Vec<Instrument>> {
        let mut instruments = Vec::new();
        for id in self.sections.keys() {
            if let Some(instrument) = self.instrument(id)? {
                instruments.push(instrument);
            }
        }
        Ok(instruments)
    }
}

/// Maps each lowercased `[section]` header to its spelling in `text`.
fn section_names(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let name = line.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
            Some((name.to_lowercase(), name.to_string()))
        })
        .collect()
}

/// Absent or unparseable values fall back to `default`.
fn optional_number<T>(section: &BTreeMap<String, String>, instmt_id: &str, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Debug,
{
    match section.get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(instmt_id, key, value = %raw, ?default, "Unparseable value, using default");
            default
        }),
    }
}
