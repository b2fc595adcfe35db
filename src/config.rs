use std::env;
use std::time::Duration;

const MIN_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub node_name: String,
    pub host: String,
    pub http_port: u16,
    pub backend_url: String,
    pub node_pools_path: String,
    pub live_status_path: String,
    pub gpu_telemetry_path: String,
    pub node_pools_interval: Duration,
    pub live_status_interval: Duration,
    pub gpu_telemetry_interval: Duration,
    pub request_timeout: Duration,
    pub current_user: Option<String>,
    pub ui_dir: String,
}

impl AppConfig {
    pub fn load() -> Self {
        Self {
            env: env::var("ENV").unwrap_or_else(|_| "production".into()),
            node_name: env::var("NODE_NAME").unwrap_or_else(|_|
                hostname::get().map(|h| h.to_string_lossy().into_owned()).unwrap_or("POOL-DASHBOARD".into())
            ).to_uppercase(),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT").unwrap_or("11090".to_string()).parse().unwrap_or(11090),
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".into())
                .trim_end_matches('/')
                .to_string(),
            node_pools_path: env::var("NODE_POOLS_PATH").unwrap_or_else(|_| "/api/v1/node-pools".into()),
            live_status_path: env::var("LIVE_STATUS_PATH").unwrap_or_else(|_| "/api/v1/clusters/status".into()),
            gpu_telemetry_path: env::var("GPU_TELEMETRY_PATH").unwrap_or_else(|_| "/api/v1/gpu/telemetry".into()),
            node_pools_interval: interval_ms("NODE_POOLS_INTERVAL_MS", 30_000),
            live_status_interval: interval_ms("LIVE_STATUS_INTERVAL_MS", 2_000),
            gpu_telemetry_interval: interval_ms("GPU_TELEMETRY_INTERVAL_MS", 2_000),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS").unwrap_or("10".to_string()).parse().unwrap_or(10),
            ),
            current_user: env::var("CURRENT_USER").ok().map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
            ui_dir: env::var("UI_DIR").unwrap_or_else(|_| "ui".into()),
        }
    }
}

fn interval_ms(key: &str, default: u64) -> Duration {
    let ms = env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default);
    Duration::from_millis(ms.max(MIN_INTERVAL_MS))
}
