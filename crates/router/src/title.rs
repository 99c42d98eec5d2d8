//! Channel title generation via an external text-generation collaborator.

use {anyhow::Result as AnyResult, async_trait::async_trait, tracing::debug};

use switchboard_common::ChannelId;
use switchboard_store::ChannelUpdate;

use crate::{
    error::{Error, Result},
    service::MessageService,
};

/// How many recent messages feed the title prompt.
const TRANSCRIPT_MESSAGES: u32 = 10;
const MAX_TITLE_CHARS: usize = 80;

/// External text-generation capability. The model side lives outside this
/// system; implementations wrap whatever runtime the deployment uses.
#[async_trait]
pub trait TitleGenerator: Send + Sync {
    /// Produce a short conversation title from a compact transcript.
    async fn generate(&self, transcript: &str) -> AnyResult<String>;
}

/// Trim model output into a usable channel name.
fn normalize_title(raw: &str) -> String {
    let mut title = raw.trim();
    for quote in ['"', '\'', '\u{201c}', '\u{201d}'] {
        title = title
            .strip_prefix(quote)
            .unwrap_or(title)
            .strip_suffix(quote)
            .unwrap_or(title);
    }
    let title = title.trim();
    if title.is_empty() {
        return "Untitled".to_string();
    }
    match title.char_indices().nth(MAX_TITLE_CHARS) {
        Some((idx, _)) => title[..idx].trim_end().to_string(),
        None => title.to_string(),
    }
}

impl MessageService {
    /// Generate a title from the channel's recent history, persist it as the
    /// channel name, and return it.
    pub async fn generate_channel_title(&self, channel_id: ChannelId) -> Result<String> {
        let generator = self
            .title_generator
            .as_ref()
            .ok_or(Error::NoTitleGenerator)?;

        let channel = self.store.get_channel(channel_id).await?;
        let mut recent = self
            .store
            .channel_messages(channel_id, TRANSCRIPT_MESSAGES, None)
            .await?;
        // Listing is newest-first; the prompt reads top to bottom.
        recent.reverse();

        let transcript = recent
            .iter()
            .map(|m| format!("{}: {}", m.author_id, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let raw = generator
            .generate(&transcript)
            .await
            .map_err(|source| Error::TitleGeneration { source })?;
        let title = normalize_title(&raw);
        debug!(%channel_id, title, "generated channel title");

        self.store
            .update_channel(channel.id, ChannelUpdate {
                name: Some(title.clone()),
                ..Default::default()
            })
            .await?;
        Ok(title)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use {
        super::*,
        crate::{ingest::SubmitMessageParams, service::test_util::harness},
        switchboard_common::{EntityId, ServerId},
        tokio::sync::Mutex,
    };

    struct CannedGenerator {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TitleGenerator for CannedGenerator {
        async fn generate(&self, transcript: &str) -> AnyResult<String> {
            self.prompts.lock().await.push(transcript.to_string());
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn normalize_strips_quotes_and_clamps() {
        assert_eq!(normalize_title("\"Release Planning\""), "Release Planning");
        assert_eq!(normalize_title("  '\u{201c}Quoted\u{201d}'  "), "Quoted");
        assert_eq!(normalize_title("   "), "Untitled");
        let long = "x".repeat(200);
        assert_eq!(normalize_title(&long).chars().count(), 80);
    }

    #[tokio::test]
    async fn without_generator_fails_cleanly() {
        let h = harness().await;
        let err = h
            .service
            .generate_channel_title(ChannelId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoTitleGenerator));
    }

    #[tokio::test]
    async fn generates_and_persists_title() {
        let h = harness().await;
        let channel_id = ChannelId::generate();
        h.service
            .submit_user_message(SubmitMessageParams {
                channel_id: channel_id.to_string(),
                server_id: ServerId::DEFAULT.to_string(),
                author_id: EntityId::generate().to_string(),
                content: "let's plan the release".into(),
                reply_to_id: None,
                source_type: None,
                raw_message: None,
                metadata: Some(serde_json::json!({"authorDisplayName": "Ada"})),
            })
            .await
            .unwrap();

        let generator = Arc::new(CannedGenerator {
            reply: "\"Release Planning\"".into(),
            prompts: Mutex::new(vec![]),
        });
        let service = h.service.with_title_generator(generator.clone());

        let title = service.generate_channel_title(channel_id).await.unwrap();
        assert_eq!(title, "Release Planning");

        let channel = service.store().get_channel(channel_id).await.unwrap();
        assert_eq!(channel.name, "Release Planning");

        let prompts = generator.prompts.lock().await;
        assert!(prompts[0].contains("let's plan the release"));
    }
}
