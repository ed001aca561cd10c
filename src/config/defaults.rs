use super::*;

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            secret: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/ampere-logs".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_sweep_secs: 10,
            heartbeat_timeout_secs: 60,
            ghost_sweep_secs: 5,
            ghost_zero_power_secs: 30,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            completed_cap: 1000,
            activity_cap: 50,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            bridge: BridgeConfig::default(),
            logging: LoggingConfig::default(),
            liveness: LivenessConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}
