// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type for configuration / validation failures
//! Any result returned by the validation or loading methods in this crate is a `ConfigError`.

use net::eth::mac::Mac;
use thiserror::Error;

/// The reasons why we may reject a configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing mandatory parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Forbidden: {0}")]
    Forbidden(&'static str),
    #[error("Bad interface mac address {0}: {1}")]
    BadMacAddress(Mac, &'static str),
    #[error("NAT port range [{0}, {1}] is invalid: {2}")]
    BadNatPortRange(u16, u16, &'static str),
    #[error("Trace payload length out of range [0, {max}]: {0}", max = crate::datapath::MAX_TRACE_PAYLOAD_LEN)]
    BadTracePayloadLen(u32),
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
    #[error("Builder failure: {0}")]
    Builder(String),
    #[error("Invalid tracing configuration: {0}")]
    Tracing(String),
}

/// Result-like type for configurations
pub type ConfigResult = Result<(), ConfigError>;

#[must_use]
pub fn stringify(conf_result: &ConfigResult) -> String {
    match conf_result {
        Ok(()) => "Ok".to_string(),
        Err(e) => format!("FAILED: {e}"),
    }
}
