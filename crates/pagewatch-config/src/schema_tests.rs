use super::*;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 7878);
    assert_eq!(config.browser.endpoint, "http://127.0.0.1:9222");
    assert_eq!(config.logging.min_level, "debug");
    assert!(config.logging.types.is_empty());
}

#[test]
fn test_browser_config_default() {
    let browser = BrowserConfig::default();
    assert_eq!(browser.command_timeout_ms, 30000);
    assert_eq!(browser.reconnect_attempts, 3);
    assert_eq!(browser.reconnect_delay_ms, 500);
}

#[test]
fn test_screenshot_config_default() {
    let screenshots = ScreenshotConfig::default();
    assert!(screenshots.on_error);
    assert_eq!(screenshots.min_severity, 4);
    assert_eq!(screenshots.cooldown_ms, 2000);
    assert!(screenshots.dir.ends_with("screenshots"));
}

#[test]
fn test_control_config_default() {
    let control = ControlConfig::default();
    assert_eq!(control.default_timeout_ms, 30000);
    assert_eq!(control.poll_interval_ms, 50);
    assert_eq!(control.network_idle_ms, 500);
}

#[test]
fn test_data_dir_name() {
    assert!(data_dir().ends_with(".pagewatch"));
}

#[test]
fn test_config_serialization() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    assert!(text.contains("127.0.0.1"));
    assert!(text.contains("7878"));
    assert!(text.contains("[screenshots]"));
}
