use std::path::PathBuf;
use std::time::Duration;

/// Worker daemon configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct WorkerdConfig {
    /// Root directory for job data (default: `./data`).
    pub data_root: PathBuf,
    /// ComfyUI base URL (default: `http://127.0.0.1:8188`).
    pub comfyui_url: String,
    /// Image-to-video workflow template path.
    pub workflow_path: PathBuf,
    /// Text-to-song workflow template path.
    pub song_workflow_path: PathBuf,
    /// Per-job wall-clock budget in minutes (default: `10`).
    pub job_timeout_minutes: u64,
    /// Backend poll interval in seconds (default: `2`).
    pub poll_interval_secs: u64,
    /// Telegram bot token; notifications are disabled when unset.
    pub telegram_bot_token: Option<String>,
    /// Default chat for records that carry no chat id.
    pub telegram_default_chat_id: Option<String>,
    /// Public base URL used for oversized-file download links.
    pub public_base_url: Option<String>,
}

impl WorkerdConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                      |
    /// |----------------------------|------------------------------|
    /// | `DATA_ROOT`                | `./data`                     |
    /// | `COMFYUI_URL`              | `http://127.0.0.1:8188`      |
    /// | `WORKFLOW_PATH`            | `./workflows/im2vid-api.json`|
    /// | `SONG_WORKFLOW_PATH`       | `./workflows/song-api.json`  |
    /// | `JOB_TIMEOUT_MINUTES`      | `10`                         |
    /// | `POLL_INTERVAL_SECS`       | `2`                          |
    /// | `TELEGRAM_BOT_TOKEN`       | unset                        |
    /// | `TELEGRAM_DEFAULT_CHAT_ID` | unset                        |
    /// | `PUBLIC_BASE_URL`          | unset                        |
    pub fn from_env() -> Self {
        let data_root =
            PathBuf::from(std::env::var("DATA_ROOT").unwrap_or_else(|_| "./data".into()));

        let comfyui_url =
            std::env::var("COMFYUI_URL").unwrap_or_else(|_| "http://127.0.0.1:8188".into());

        let workflow_path = PathBuf::from(
            std::env::var("WORKFLOW_PATH").unwrap_or_else(|_| "./workflows/im2vid-api.json".into()),
        );

        let song_workflow_path = PathBuf::from(
            std::env::var("SONG_WORKFLOW_PATH")
                .unwrap_or_else(|_| "./workflows/song-api.json".into()),
        );

        let job_timeout_minutes: u64 = std::env::var("JOB_TIMEOUT_MINUTES")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("JOB_TIMEOUT_MINUTES must be a valid u64");

        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("POLL_INTERVAL_SECS must be a valid u64");

        let telegram_bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok();
        let telegram_default_chat_id = std::env::var("TELEGRAM_DEFAULT_CHAT_ID").ok();
        let public_base_url = std::env::var("PUBLIC_BASE_URL").ok();

        Self {
            data_root,
            comfyui_url,
            workflow_path,
            song_workflow_path,
            job_timeout_minutes,
            poll_interval_secs,
            telegram_bot_token,
            telegram_default_chat_id,
            public_base_url,
        }
    }

    /// Per-job wall-clock budget.
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_minutes * 60)
    }

    /// Backend poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
