//! Outcome notification routing.
//!
//! [`Notifier`] is the delivery seam the worker invokes on terminal
//! outcomes; [`TelegramNotifier`] routes a job's result to a Telegram
//! chat. Notification failures are for the caller to log - a delivered
//! job's terminal status never depends on delivery.

use std::sync::Arc;

use async_trait::async_trait;
use mediamill_core::media;
use mediamill_events::TelegramApi;

use crate::model::{JobRecord, JobStatus};
use crate::store::JobStore;

/// Delivery collaborator invoked with a freshly reloaded record.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the outcome of a completed, failed, or timed-out job.
    async fn notify(&self, record: &JobRecord) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// TelegramNotifier
// ---------------------------------------------------------------------------

/// Routes job outcomes to a Telegram chat.
///
/// Completed jobs deliver the first video-like output (else the first
/// audio-like output, else a plain message); failed and timed-out jobs
/// deliver the error text; canceled jobs deliver nothing.
pub struct TelegramNotifier {
    api: TelegramApi,
    store: Arc<JobStore>,
    default_chat_id: Option<String>,
    public_base_url: Option<String>,
}

impl TelegramNotifier {
    /// Create a notifier.
    ///
    /// * `default_chat_id` - used when a record carries no chat id.
    /// * `public_base_url` - when set, oversized files fall back to a
    ///   `<base>/api/jobs/<id>/result` download link.
    pub fn new(
        api: TelegramApi,
        store: Arc<JobStore>,
        default_chat_id: Option<String>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            api,
            store,
            default_chat_id,
            public_base_url,
        }
    }

    fn result_link(&self, record: &JobRecord) -> Option<String> {
        self.public_base_url
            .as_deref()
            .map(|base| format!("{}/api/jobs/{}/result", base.trim_end_matches('/'), record.id))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, record: &JobRecord) -> anyhow::Result<()> {
        let Some(chat_id) = record
            .telegram_chat_id
            .as_deref()
            .or(self.default_chat_id.as_deref())
        else {
            return Ok(());
        };

        match record.status {
            JobStatus::Completed => {
                let link = self.result_link(record);
                if let Some(video) = media::first_video(&record.files) {
                    let path = self.store.output_dir(&record.id).join(video);
                    let caption = format!("Video ready!\n\nPrompt: {}", record.prompt);
                    self.api
                        .send_video(chat_id, &path, &caption, link.as_deref())
                        .await?;
                } else if let Some(audio) = media::first_audio(&record.files) {
                    let path = self.store.output_dir(&record.id).join(audio);
                    let caption = format!("Song ready!\n\n{}", record.prompt);
                    self.api
                        .send_audio(chat_id, &path, &caption, link.as_deref())
                        .await?;
                } else {
                    let text = format!("Job {} completed but no media found.", record.id);
                    self.api.send_message(chat_id, &text).await?;
                }
            }
            JobStatus::Failed | JobStatus::TimedOut => {
                let text = format!(
                    "Job {} failed\n\nError: {}",
                    record.id,
                    record.error.as_deref().unwrap_or("Unknown error")
                );
                self.api.send_message(chat_id, &text).await?;
            }
            // Nothing to say about queued, running, or canceled jobs.
            _ => {}
        }

        Ok(())
    }
}
