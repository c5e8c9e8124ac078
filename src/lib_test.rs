use super::*;
use serial_test::serial;

#[test]
#[serial]
fn test_init_logging_is_repeatable() {
    init_logging();
    // Second call must not panic even though a logger is already installed
    init_logging();
    info!("logger still usable after repeated init");
}
