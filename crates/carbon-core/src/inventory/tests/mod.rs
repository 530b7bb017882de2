
use std::sync::Arc;

use crate::resources::asset::AssetDescriptor;
use crate::resources::{Asset, ResourceContext};
use crate::storage::Config;

pub(super) fn host(yaml: &str) -> Asset {
    let descriptor: AssetDescriptor = serde_yaml::from_str(yaml).expect("asset descriptor");
    let context = ResourceContext::new(Arc::new(Config::default()), "/data/run");
    Asset::from_descriptor(descriptor, &context).expect("valid asset")
}
