//! Node configuration resolver
//!
//! A node's `config` is an untyped JSON object authored in the UI. This module
//! decodes it, in one pass, into a typed view per node type. Decoding never
//! fails: absent keys and values of the wrong shape degrade to the type's
//! zero value, and documented defaults are filled in afterwards.

use serde_json::{Map, Value};

use crate::model::{WorkflowNode, WorkflowNodeType};
use crate::provider::{ApplyDnsProviderType, DeployProviderType};
use crate::reference::OutputRef;

/// Renewal window used when `skipBeforeExpiryDays` is unset or zero
pub const DEFAULT_SKIP_BEFORE_EXPIRY_DAYS: i32 = 30;

/// Config keys as written by the UI
pub mod keys {
    pub const DOMAINS: &str = "domains";
    pub const CONTACT_EMAIL: &str = "contactEmail";
    pub const PROVIDER: &str = "provider";
    pub const PROVIDER_ACCESS_ID: &str = "providerAccessId";
    pub const PROVIDER_CONFIG: &str = "providerConfig";
    pub const KEY_ALGORITHM: &str = "keyAlgorithm";
    pub const NAMESERVERS: &str = "nameservers";
    pub const DNS_PROPAGATION_TIMEOUT: &str = "dnsPropagationTimeout";
    pub const DNS_TTL: &str = "dnsTTL";
    pub const DISABLE_FOLLOW_CNAME: &str = "disableFollowCNAME";
    pub const DISABLE_ARI: &str = "disableARI";
    pub const SKIP_BEFORE_EXPIRY_DAYS: &str = "skipBeforeExpiryDays";
    pub const CERTIFICATE: &str = "certificate";
    pub const SKIP_ON_LAST_SUCCEEDED: &str = "skipOnLastSucceeded";
    pub const CHANNEL: &str = "channel";
    pub const SUBJECT: &str = "subject";
    pub const MESSAGE: &str = "message";
}

/// Typed configuration of an `apply` node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyConfig {
    /// Domains to issue for, split from the comma-separated field
    pub domains: Vec<String>,
    pub contact_email: String,
    /// DNS provider answering the DNS-01 challenge
    pub provider: ApplyDnsProviderType,
    pub provider_access_id: String,
    pub provider_config: Map<String, Value>,
    pub key_algorithm: String,
    /// Resolvers used for propagation checks, split from the comma-separated field
    pub nameservers: Vec<String>,
    /// Seconds; zero means the provider default
    pub dns_propagation_timeout: i32,
    /// Seconds; zero means the provider default
    pub dns_ttl: i32,
    pub disable_follow_cname: bool,
    pub disable_ari: bool,
    /// Skip renewal while the current certificate has more days left than this
    pub skip_before_expiry_days: i32,
}

/// Typed configuration of a `deploy` node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployConfig {
    /// Upstream certificate, `None` when unset or malformed
    pub certificate: Option<OutputRef>,
    pub provider: DeployProviderType,
    pub provider_access_id: String,
    pub provider_config: Map<String, Value>,
    pub skip_on_last_succeeded: bool,
}

/// Typed configuration of a `notify` node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyConfig {
    pub channel: String,
    pub subject: String,
    pub message: String,
}

/// Decoded configuration, one variant per node type
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Start,
    End,
    Apply(ApplyConfig),
    Deploy(DeployConfig),
    Notify(NotifyConfig),
    Branch,
    Condition,
    ExecuteResultBranch,
    ExecuteSuccess,
    ExecuteFailure,
}

impl NodeConfig {
    pub fn node_type(&self) -> WorkflowNodeType {
        match self {
            NodeConfig::Start => WorkflowNodeType::Start,
            NodeConfig::End => WorkflowNodeType::End,
            NodeConfig::Apply(_) => WorkflowNodeType::Apply,
            NodeConfig::Deploy(_) => WorkflowNodeType::Deploy,
            NodeConfig::Notify(_) => WorkflowNodeType::Notify,
            NodeConfig::Branch => WorkflowNodeType::Branch,
            NodeConfig::Condition => WorkflowNodeType::Condition,
            NodeConfig::ExecuteResultBranch => WorkflowNodeType::ExecuteResultBranch,
            NodeConfig::ExecuteSuccess => WorkflowNodeType::ExecuteSuccess,
            NodeConfig::ExecuteFailure => WorkflowNodeType::ExecuteFailure,
        }
    }

    pub fn as_apply(&self) -> Option<&ApplyConfig> {
        match self {
            NodeConfig::Apply(config) => Some(config),
            _ => None,
        }
    }

    pub fn as_deploy(&self) -> Option<&DeployConfig> {
        match self {
            NodeConfig::Deploy(config) => Some(config),
            _ => None,
        }
    }

    pub fn as_notify(&self) -> Option<&NotifyConfig> {
        match self {
            NodeConfig::Notify(config) => Some(config),
            _ => None,
        }
    }
}

// ============================================================================
// Raw value decoding
// ============================================================================

/// String value, or empty when absent or not a string
pub fn value_as_string(config: &Map<String, Value>, key: &str) -> String {
    match config.get(key) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Boolean value; `"true"`/`"false"` strings are accepted
pub fn value_as_bool(config: &Map<String, Value>, key: &str) -> bool {
    match config.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// 32-bit integer value
///
/// Fractional numbers truncate toward zero; numeric strings are accepted;
/// anything out of `i32` range is treated as the wrong shape.
pub fn value_as_i32(config: &Map<String, Value>, key: &str) -> i32 {
    match config.get(key) {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).unwrap_or(0)
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX) {
                    f.trunc() as i32
                } else {
                    0
                }
            } else {
                0
            }
        }
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Object value, or an empty map when absent or not an object
pub fn value_as_map(config: &Map<String, Value>, key: &str) -> Map<String, Value> {
    match config.get(key) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Typed views
// ============================================================================

impl WorkflowNode {
    pub fn get_config_value_as_string(&self, key: &str) -> String {
        value_as_string(&self.config, key)
    }

    pub fn get_config_value_as_bool(&self, key: &str) -> bool {
        value_as_bool(&self.config, key)
    }

    pub fn get_config_value_as_i32(&self, key: &str) -> i32 {
        value_as_i32(&self.config, key)
    }

    pub fn get_config_value_as_map(&self, key: &str) -> Map<String, Value> {
        value_as_map(&self.config, key)
    }

    /// Apply view of the config
    ///
    /// `skip_before_expiry_days` falls back to 30 when the stored value is
    /// absent *or* zero; the two cannot be told apart.
    pub fn get_config_for_apply(&self) -> ApplyConfig {
        let mut skip_before_expiry_days = self.get_config_value_as_i32(keys::SKIP_BEFORE_EXPIRY_DAYS);
        if skip_before_expiry_days == 0 {
            skip_before_expiry_days = DEFAULT_SKIP_BEFORE_EXPIRY_DAYS;
        }

        ApplyConfig {
            domains: split_list(&self.get_config_value_as_string(keys::DOMAINS)),
            contact_email: self.get_config_value_as_string(keys::CONTACT_EMAIL),
            provider: ApplyDnsProviderType::from(
                self.get_config_value_as_string(keys::PROVIDER).as_str(),
            ),
            provider_access_id: self.get_config_value_as_string(keys::PROVIDER_ACCESS_ID),
            provider_config: self.get_config_value_as_map(keys::PROVIDER_CONFIG),
            key_algorithm: self.get_config_value_as_string(keys::KEY_ALGORITHM),
            nameservers: split_list(&self.get_config_value_as_string(keys::NAMESERVERS)),
            dns_propagation_timeout: self.get_config_value_as_i32(keys::DNS_PROPAGATION_TIMEOUT),
            dns_ttl: self.get_config_value_as_i32(keys::DNS_TTL),
            disable_follow_cname: self.get_config_value_as_bool(keys::DISABLE_FOLLOW_CNAME),
            disable_ari: self.get_config_value_as_bool(keys::DISABLE_ARI),
            skip_before_expiry_days,
        }
    }

    /// Deploy view of the config
    ///
    /// A dangling or malformed certificate reference still decodes; shape
    /// errors are reported by graph validation, dangling ids at execution.
    pub fn get_config_for_deploy(&self) -> DeployConfig {
        let certificate = OutputRef::parse(&self.get_config_value_as_string(keys::CERTIFICATE)).ok();

        DeployConfig {
            certificate,
            provider: DeployProviderType::from(
                self.get_config_value_as_string(keys::PROVIDER).as_str(),
            ),
            provider_access_id: self.get_config_value_as_string(keys::PROVIDER_ACCESS_ID),
            provider_config: self.get_config_value_as_map(keys::PROVIDER_CONFIG),
            skip_on_last_succeeded: self.get_config_value_as_bool(keys::SKIP_ON_LAST_SUCCEEDED),
        }
    }

    pub fn get_config_for_notify(&self) -> NotifyConfig {
        NotifyConfig {
            channel: self.get_config_value_as_string(keys::CHANNEL),
            subject: self.get_config_value_as_string(keys::SUBJECT),
            message: self.get_config_value_as_string(keys::MESSAGE),
        }
    }

    /// Decode the config into the variant matching the node type
    pub fn decode_config(&self) -> NodeConfig {
        match self.node_type {
            WorkflowNodeType::Start => NodeConfig::Start,
            WorkflowNodeType::End => NodeConfig::End,
            WorkflowNodeType::Apply => NodeConfig::Apply(self.get_config_for_apply()),
            WorkflowNodeType::Deploy => NodeConfig::Deploy(self.get_config_for_deploy()),
            WorkflowNodeType::Notify => NodeConfig::Notify(self.get_config_for_notify()),
            WorkflowNodeType::Branch => NodeConfig::Branch,
            WorkflowNodeType::Condition => NodeConfig::Condition,
            WorkflowNodeType::ExecuteResultBranch => NodeConfig::ExecuteResultBranch,
            WorkflowNodeType::ExecuteSuccess => NodeConfig::ExecuteSuccess,
            WorkflowNodeType::ExecuteFailure => NodeConfig::ExecuteFailure,
        }
    }
}
