
use std::sync::Arc;

use serde_json::Map;

use crate::resources::ResourceContext;
use crate::storage::{Config, Credential};

/// Context over default settings plus an `openstack` credential
pub(super) fn test_context() -> ResourceContext {
    let config = Config::default().with_credential(Credential {
        name: "openstack".into(),
        fields: Map::new(),
    });
    ResourceContext::new(Arc::new(config), "/tmp/carbon-tests/data")
}
