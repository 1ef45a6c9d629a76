//! Fuzz target: config document parsing
//!
//! Feeds arbitrary bytes to `GardenConfig::from_json` and verifies:
//! - No panics under arbitrary input
//! - Anything accepted passes `validate()` and survives the postcard
//!   encoding used by the config store
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use garden::config::GardenConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = GardenConfig::from_json(data) else {
        return;
    };
    assert!(config.validate().is_ok());

    let bytes = postcard::to_allocvec(&config).expect("accepted config encodes");
    let decoded: GardenConfig = postcard::from_bytes(&bytes).expect("encoded config decodes");
    assert_eq!(decoded, config);
});
