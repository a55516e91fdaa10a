//! Shared helpers for gateway integration tests.

use std::path::PathBuf;
use yuanzhang::config::Settings;

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Settings pointing every external service at `base` (a local mock or an unused address).
pub fn test_settings(port: u16, base: &str) -> Settings {
    Settings {
        bind: "127.0.0.1".to_string(),
        port,
        line_channel_secret: "test-secret".to_string(),
        line_access_token: "test-token".to_string(),
        line_api_base: base.to_string(),
        photo_api_url: format!("{}/list", base),
        photo_cdn_base_url: "http://cdn.example".to_string(),
        gemini_api_key: "test-key".to_string(),
        gemini_model: "gemini-test".to_string(),
        gemini_api_base: base.to_string(),
        quotes_path: temp_quotes_path(),
    }
}

fn temp_quotes_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("yuanzhang-gateway-test-{}", uuid::Uuid::new_v4()))
        .join("quotes.json")
}
