//! Minimal Telegram Bot API client.
//!
//! Supports exactly what outcome delivery needs: text messages and
//! media uploads (video, audio). Files over Telegram's upload limit are
//! replaced by a text message carrying a download link when one is
//! available.

use std::path::Path;
use std::time::Duration;

/// Telegram bot upload limit: 50 MB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Timeout for text message requests.
const MESSAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for media uploads.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from the Telegram Bot API layer.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// The HTTP request itself failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Telegram returned a non-2xx status code.
    #[error("Telegram API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Reading a local media file failed.
    #[error("File I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// TelegramApi
// ---------------------------------------------------------------------------

/// HTTP client for one bot token.
pub struct TelegramApi {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramApi {
    /// Create a client for the given bot token.
    pub fn new(bot_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
        }
    }

    /// Send a plain text message.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TelegramError> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .timeout(MESSAGE_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Send a video file, falling back to a link message when the file
    /// exceeds [`MAX_UPLOAD_BYTES`].
    pub async fn send_video(
        &self,
        chat_id: &str,
        file_path: &Path,
        caption: &str,
        link_fallback: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.send_media("sendVideo", "video", chat_id, file_path, caption, link_fallback)
            .await
    }

    /// Send an audio file, falling back to a link message when the file
    /// exceeds [`MAX_UPLOAD_BYTES`].
    pub async fn send_audio(
        &self,
        chat_id: &str,
        file_path: &Path,
        caption: &str,
        link_fallback: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.send_media("sendAudio", "audio", chat_id, file_path, caption, link_fallback)
            .await
    }

    // ---- private helpers ----

    /// Upload one media file via the given Bot API method, or send a
    /// link/notice message when the file is too large to upload.
    async fn send_media(
        &self,
        method: &str,
        part_name: &'static str,
        chat_id: &str,
        file_path: &Path,
        caption: &str,
        link_fallback: Option<&str>,
    ) -> Result<(), TelegramError> {
        let size = tokio::fs::metadata(file_path).await?.len();
        if size > MAX_UPLOAD_BYTES {
            let text = match link_fallback {
                Some(link) => format!("{caption}\n\nDownload: {link}"),
                None => format!(
                    "{caption}\n\nThe file is too large ({:.1} MB) to send directly.",
                    size as f64 / 1024.0 / 1024.0
                ),
            };
            return self.send_message(chat_id, &text).await;
        }

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| part_name.to_string());
        let bytes = tokio::fs::read(file_path).await?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part(part_name, part);

        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), TelegramError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TelegramError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_status() {
        let err = TelegramError::Api {
            status: 403,
            body: "bot was blocked".to_string(),
        };
        assert_eq!(err.to_string(), "Telegram API error (403): bot was blocked");
    }

    #[tokio::test]
    async fn send_video_for_missing_file_is_io_error() {
        let api = TelegramApi::new("123:abc");
        let result = api
            .send_video("42", Path::new("/nonexistent/clip.mp4"), "caption", None)
            .await;
        assert!(matches!(result, Err(TelegramError::Io(_))));
    }
}
