use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;

/// A running `station-service` binary over the stores in one directory.
/// The process is killed when this is dropped.
pub struct StationProcess {
    base_url: String,
    child: Child,
}

impl StationProcess {
    /// Start the binary with short feedback timings and wait until the
    /// station has finished reconciling.
    pub async fn start(dir: &Path) -> anyhow::Result<Self> {
        let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
        let child = Command::new(env!("CARGO_BIN_EXE_station-service"))
            .env("DB_PATH", dir.join("station.db"))
            .env("FAST_STORE_PATH", dir.join("station_fast.json"))
            .env("PORT", port.to_string())
            .env("RUST_LOG", "info")
            .env("FEEDBACK_DISPLAY_MS", "20")
            .env("FEEDBACK_SETTLE_MS", "5")
            .env("RESULTS_DELAY_MS", "50")
            .env_remove("CANDIDATES_PATH")
            .env_remove("IDENTITY_DIGEST")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let station = Self {
            base_url: format!("http://127.0.0.1:{port}"),
            child,
        };
        station.wait_initialized(Duration::from_secs(10)).await?;
        Ok(station)
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    async fn wait_initialized(&self, timeout: Duration) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(self.url("/meta")).send().await {
                if let Ok(meta) = resp.json::<Value>().await {
                    if meta["ready"] == true {
                        return Ok(());
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("station at {} not initialized after {:?}", self.base_url, timeout)
    }
}

impl Drop for StationProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
