use crate::constants::TimelockBounds;
use crate::utils::config_loader::{
    ConverterConfigLoader, ConverterConfigLoaderSync, LoadConfigError, load_from_file, load_from_file_sync,
};
use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct EngineConfigRoot {
    pub engine: EngineConfigSection,
}

/// Bootstrap parameters for one conversion deployment: the accounts and
/// assets everything else is wired from. `${VAR}` references in the TOML
/// file are expanded from the environment before parsing.
#[derive(Clone, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct EngineConfigSection {
    /// Ledger account the engine holds LP shares and proceeds under.
    pub engine_account: Address,
    /// Asset all revenue is converted into.
    pub target_asset: Address,
    /// Default bridge for assets without a mapping entry.
    pub base_asset: Address,
    /// Initial reward sink; later changes go through the delay gate.
    pub reward_sink: Address,
    /// Admin of the delay gate.
    pub admin: Address,
    /// Delay the gate enforces between queueing and execution.
    pub timelock_delay_secs: u64,
}

impl EngineConfigSection {
    pub fn with_timelock_delay_secs(&self, timelock_delay_secs: u64) -> Self {
        Self { timelock_delay_secs, ..self.clone() }
    }
}

impl Default for EngineConfigSection {
    fn default() -> Self {
        Self {
            engine_account: Address::ZERO,
            target_asset: Address::ZERO,
            base_asset: Address::ZERO,
            reward_sink: Address::ZERO,
            admin: Address::ZERO,
            timelock_delay_secs: TimelockBounds::MINIMUM_DELAY,
        }
    }
}

#[async_trait]
impl ConverterConfigLoader for EngineConfigSection {
    type SectionType = EngineConfigSection;

    async fn load_section_from_file(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let root: EngineConfigRoot = load_from_file(file_name).await?;
        Ok(root.engine)
    }
}

impl ConverterConfigLoaderSync for EngineConfigSection {
    type SectionType = EngineConfigSection;

    fn load_section_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let root: EngineConfigRoot = load_from_file_sync(file_name)?;
        Ok(root.engine)
    }
}
