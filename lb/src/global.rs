//! Opt-in process-wide agent
//!
//! Larger programs should build an [`Agent`] and pass it around. Small tools
//! can install one here once and reach it from anywhere.

use std::sync::OnceLock;

use eyre::Result;
use tracing::debug;

use crate::agent::Agent;
use crate::config::Config;

static AGENT: OnceLock<Agent> = OnceLock::new();

/// Install the process-wide agent; returns the agent back if one is already installed
pub fn init(agent: Agent) -> std::result::Result<(), Agent> {
    debug!("global::init: called");
    AGENT.set(agent)
}

/// The installed agent, if any
pub fn get() -> Option<&'static Agent> {
    AGENT.get()
}

/// The installed agent, installing one built from `LOG_*` environment variables if needed
pub fn get_or_init_from_env() -> Result<&'static Agent> {
    if let Some(agent) = AGENT.get() {
        return Ok(agent);
    }
    let agent = Agent::from_config(&Config::from_env()?)?;
    Ok(AGENT.get_or_init(|| agent))
}
