//! Plugins compiled into the core.
use crate::kernel::constants::STATIC_PROVISIONER;
use crate::plugin_system::error::{PluginError, PluginErrorKind};
use crate::plugin_system::traits::{CreateResult, Plugin, PluginContext, PluginResult, Provisioner};
use crate::resources::{Asset, Resource};

/// Provisioner for assets that already exist and carry an `ip_address`
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticProvisioner;

impl Plugin for StaticProvisioner {
    fn name(&self) -> &str {
        STATIC_PROVISIONER
    }
}

impl Provisioner for StaticProvisioner {
    fn validate(&self, asset: &Asset, _context: &PluginContext) -> PluginResult<()> {
        if asset.is_concrete() {
            Ok(())
        } else {
            Err(PluginError::new(
                PluginErrorKind::Validation,
                format!("static asset '{}' has no ip_address", asset.name()),
            ))
        }
    }

    fn create(&self, asset: &Asset, _context: &PluginContext) -> PluginResult<CreateResult> {
        log::debug!("Static asset '{}' needs no provisioning", asset.name());
        Ok(CreateResult::Nothing)
    }

    fn delete(&self, asset: &Asset, _context: &PluginContext) -> PluginResult<()> {
        log::debug!("Static asset '{}' needs no teardown", asset.name());
        Ok(())
    }
}
