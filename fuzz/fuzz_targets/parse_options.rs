#![no_main]

use libfuzzer_sys::fuzz_target;
use qnsolve::Config;

fuzz_target!(|options: &str| {
    // Anything that parses must also validate.
    if let Ok(config) = Config::from_options(options) {
        assert!(config.validate().is_ok());
    }
});
