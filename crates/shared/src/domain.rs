use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Storage key holding the JSON array of every registered record id.
pub const INDEX_KEY: &str = "site_keys";
/// Prefix of the per-record storage key, `site_{id}`.
pub const RECORD_KEY_PREFIX: &str = "site_";

pub const DEFAULT_CONDITION: u8 = 80;
pub const AT_RISK_THRESHOLD: u8 = 50;

const RECORD_ID_SUFFIX_LEN: usize = 7;

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_newtype!(RecordId);
string_newtype!(WalletAddress);

impl RecordId {
    /// `{unix_millis}-{random suffix}`. Collisions are unlikely, not impossible.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}",
            now.timestamp_millis(),
            &suffix[..RECORD_ID_SUFFIX_LEN]
        ))
    }

    pub fn storage_key(&self) -> String {
        format!("{RECORD_KEY_PREFIX}{}", self.0)
    }

    /// Inverse of [`RecordId::storage_key`]. The index key is not a record key.
    pub fn from_storage_key(key: &str) -> Option<Self> {
        if key == INDEX_KEY {
            return None;
        }
        key.strip_prefix(RECORD_KEY_PREFIX)
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_string()))
    }
}

impl WalletAddress {
    /// `0x` followed by the hex of the last 20 bytes of `sha256(public_key)`.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        Self(format!("0x{}", hex::encode(&digest[digest.len() - 20..])))
    }

    pub fn matches(&self, other: &WalletAddress) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    /// `0x1234...abcd`; short addresses are returned unchanged.
    pub fn abbreviated(&self) -> String {
        let value = self.0.as_str();
        if value.len() <= 10 || !value.is_ascii() {
            return value.to_string();
        }
        format!("{}...{}", &value[..6], &value[value.len() - 4..])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentalImpact {
    pub wind: f64,
    pub rain: f64,
    pub temperature: f64,
}

impl EnvironmentalImpact {
    pub fn new(wind: f64, rain: f64, temperature: f64) -> Self {
        Self {
            wind,
            rain,
            temperature,
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            wind: clamp_percent(self.wind),
            rain: clamp_percent(self.rain),
            temperature: clamp_percent(self.temperature),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: RecordId,
    pub encrypted_data: String,
    pub timestamp: i64,
    pub owner: WalletAddress,
    pub site_name: String,
    pub condition: u8,
    pub environmental_impact: EnvironmentalImpact,
}

impl SiteRecord {
    pub fn is_at_risk(&self) -> bool {
        self.condition < AT_RISK_THRESHOLD
    }

    pub fn band(&self) -> ConditionBand {
        ConditionBand::for_condition(self.condition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionBand {
    Good,
    Fair,
    Critical,
}

impl ConditionBand {
    pub fn for_condition(condition: u8) -> Self {
        if condition > 75 {
            Self::Good
        } else if condition > 50 {
            Self::Fair
        } else {
            Self::Critical
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Critical => "critical",
        }
    }
}

/// Clamps into [0, 100]; NaN becomes 0.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

pub fn clamp_condition(value: f64) -> u8 {
    clamp_percent(value.round()) as u8
}
