use ampere::Config;

// This binary holds a single test so the env mutation cannot race another
// test thread.
#[test]
fn env_overrides_layer_on_top_of_defaults() {
    let mut config = Config::default();
    assert_eq!(config.web.port, 8080);
    assert!(config.bridge.url.is_empty());

    unsafe {
        std::env::set_var("PORT", "9090");
        std::env::set_var("BRIDGE_URL", "https://bridge.example/hook");
        std::env::set_var("BRIDGE_SECRET", "s3cret");
    }
    config.apply_env_overrides();

    assert_eq!(config.web.port, 9090);
    assert_eq!(config.bridge.url, "https://bridge.example/hook");
    assert_eq!(config.bridge.secret, "s3cret");

    // Junk PORT values are ignored rather than fatal
    unsafe {
        std::env::set_var("PORT", "not-a-port");
    }
    config.apply_env_overrides();
    assert_eq!(config.web.port, 9090);

    unsafe {
        std::env::remove_var("PORT");
        std::env::remove_var("BRIDGE_URL");
        std::env::remove_var("BRIDGE_SECRET");
    }
}
