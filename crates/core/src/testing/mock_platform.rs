//! Mock chat platform for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::platform::{
    AccessGrant, ChannelInfo, ChannelSpec, ChatPlatform, HistoryEmbed, HistoryMessage,
    OutgoingMessage, PlatformError,
};

/// Platform calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    CreateChannel,
    SetTopic,
    SendMessage,
    SendDirect,
    FetchHistory,
    DeleteChannel,
    GrantAccess,
}

/// State of a simulated channel.
#[derive(Debug, Clone)]
pub struct MockChannel {
    pub info: ChannelInfo,
    pub grants: Vec<AccessGrant>,
    pub history: Vec<HistoryMessage>,
}

/// Mock implementation of the ChatPlatform trait.
///
/// Simulates one guild in memory:
/// - Channels with topics, permission grants and message history
/// - Roles
/// - Sent channel and direct messages recorded for assertions
/// - Per-operation failure injection
///
/// # Example
///
/// ```rust,ignore
/// use ctfdesk_core::testing::MockChatPlatform;
///
/// let platform = MockChatPlatform::new();
/// platform.add_channel(100, "Tickets", None).await;
/// platform.add_role(200).await;
///
/// // ... run the ticket controller against it ...
///
/// let sent = platform.messages_in(900).await;
/// assert_eq!(sent.len(), 1);
/// ```
pub struct MockChatPlatform {
    channels: Arc<RwLock<HashMap<u64, MockChannel>>>,
    roles: Arc<RwLock<HashSet<u64>>>,
    sent: Arc<RwLock<Vec<(u64, OutgoingMessage)>>>,
    direct: Arc<RwLock<Vec<(u64, OutgoingMessage)>>>,
    deleted: Arc<RwLock<Vec<u64>>>,
    failures: Arc<RwLock<HashMap<MockOperation, PlatformError>>>,
    next_id: AtomicU64,
    next_message_id: AtomicU64,
    bot_user_id: u64,
}

impl std::fmt::Debug for MockChatPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChatPlatform")
            .field("channels", &"<channels>")
            .field("roles", &"<roles>")
            .field("sent", &"<sent>")
            .field("bot_user_id", &self.bot_user_id)
            .finish()
    }
}

impl Default for MockChatPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatPlatform {
    /// Bot user id used for messages the platform sends.
    pub const BOT_USER_ID: u64 = 1;

    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            roles: Arc::new(RwLock::new(HashSet::new())),
            sent: Arc::new(RwLock::new(Vec::new())),
            direct: Arc::new(RwLock::new(Vec::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(10_000),
            next_message_id: AtomicU64::new(1),
            bot_user_id: Self::BOT_USER_ID,
        }
    }

    // =========================================================================
    // Test Configuration Methods
    // =========================================================================

    /// Add a channel or category.
    pub async fn add_channel(&self, id: u64, name: &str, category_id: Option<u64>) {
        self.channels.write().await.insert(
            id,
            MockChannel {
                info: ChannelInfo {
                    id,
                    name: name.to_string(),
                    topic: None,
                    category_id,
                },
                grants: Vec::new(),
                history: Vec::new(),
            },
        );
    }

    pub async fn add_role(&self, id: u64) {
        self.roles.write().await.insert(id);
    }

    /// Append a message from a user to a channel's history.
    pub async fn push_user_message(&self, channel_id: u64, author_id: u64, author: &str, content: &str) {
        let message = HistoryMessage {
            id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            author_id,
            author_name: author.to_lowercase(),
            author_display: author.to_string(),
            author_bot: false,
            content: content.to_string(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            embeds: Vec::new(),
            system: false,
        };
        if let Some(channel) = self.channels.write().await.get_mut(&channel_id) {
            channel.history.push(message);
        }
    }

    /// Make the next call of `operation` fail with `error`.
    pub async fn fail_next(&self, operation: MockOperation, error: PlatformError) {
        self.failures.write().await.insert(operation, error);
    }

    // =========================================================================
    // Test Assertion Methods
    // =========================================================================

    pub async fn channel(&self, id: u64) -> Option<MockChannel> {
        self.channels.read().await.get(&id).cloned()
    }

    pub async fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .read()
            .await
            .values()
            .map(|c| c.info.name.clone())
            .collect();
        names.sort();
        names
    }

    pub async fn grants(&self, channel_id: u64) -> Vec<AccessGrant> {
        self.channels
            .read()
            .await
            .get(&channel_id)
            .map(|c| c.grants.clone())
            .unwrap_or_default()
    }

    /// Messages sent to one channel, in order.
    pub async fn messages_in(&self, channel_id: u64) -> Vec<OutgoingMessage> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|(id, _)| *id == channel_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Every channel message sent, with its channel id.
    pub async fn sent_messages(&self) -> Vec<(u64, OutgoingMessage)> {
        self.sent.read().await.clone()
    }

    /// Direct messages sent, with the recipient id.
    pub async fn direct_messages(&self) -> Vec<(u64, OutgoingMessage)> {
        self.direct.read().await.clone()
    }

    pub async fn deleted_channels(&self) -> Vec<u64> {
        self.deleted.read().await.clone()
    }

    async fn take_failure(&self, operation: MockOperation) -> Result<(), PlatformError> {
        match self.failures.write().await.remove(&operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatPlatform for MockChatPlatform {
    async fn channel_exists(&self, channel_id: u64) -> Result<bool, PlatformError> {
        Ok(self.channels.read().await.contains_key(&channel_id))
    }

    async fn role_exists(&self, role_id: u64) -> Result<bool, PlatformError> {
        Ok(self.roles.read().await.contains(&role_id))
    }

    async fn count_channels_with_prefix(
        &self,
        category_id: u64,
        prefix: &str,
    ) -> Result<usize, PlatformError> {
        Ok(self
            .channels
            .read()
            .await
            .values()
            .filter(|c| c.info.category_id == Some(category_id) && c.info.name.starts_with(prefix))
            .count())
    }

    async fn create_channel(&self, spec: &ChannelSpec) -> Result<u64, PlatformError> {
        self.take_failure(MockOperation::CreateChannel).await?;

        let mut channels = self.channels.write().await;
        if !channels.contains_key(&spec.category_id) {
            return Err(PlatformError::NotFound(format!("category {}", spec.category_id)));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        channels.insert(
            id,
            MockChannel {
                info: ChannelInfo {
                    id,
                    name: spec.name.clone(),
                    topic: Some(spec.topic.clone()),
                    category_id: Some(spec.category_id),
                },
                grants: spec.grants.clone(),
                history: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn channel_info(&self, channel_id: u64) -> Result<Option<ChannelInfo>, PlatformError> {
        Ok(self
            .channels
            .read()
            .await
            .get(&channel_id)
            .map(|c| c.info.clone()))
    }

    async fn set_topic(&self, channel_id: u64, topic: &str) -> Result<(), PlatformError> {
        self.take_failure(MockOperation::SetTopic).await?;

        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(&channel_id)
            .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel_id)))?;
        channel.info.topic = Some(topic.to_string());
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: u64,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError> {
        self.take_failure(MockOperation::SendMessage).await?;

        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(&channel_id)
            .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel_id)))?;

        channel.history.push(HistoryMessage {
            id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            author_id: self.bot_user_id,
            author_name: "ctfdesk".to_string(),
            author_display: "CTFdesk".to_string(),
            author_bot: true,
            content: message.content.clone().unwrap_or_default(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            embeds: message
                .notice
                .iter()
                .map(|n| HistoryEmbed {
                    title: Some(n.title.clone()),
                    description: Some(n.description.clone()),
                })
                .collect(),
            system: false,
        });

        self.sent.write().await.push((channel_id, message.clone()));
        Ok(())
    }

    async fn send_direct(
        &self,
        user_id: u64,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError> {
        self.take_failure(MockOperation::SendDirect).await?;
        self.direct.write().await.push((user_id, message.clone()));
        Ok(())
    }

    async fn fetch_history(&self, channel_id: u64) -> Result<Vec<HistoryMessage>, PlatformError> {
        self.take_failure(MockOperation::FetchHistory).await?;

        self.channels
            .read()
            .await
            .get(&channel_id)
            .map(|c| c.history.clone())
            .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel_id)))
    }

    async fn delete_channel(&self, channel_id: u64, _reason: &str) -> Result<(), PlatformError> {
        self.take_failure(MockOperation::DeleteChannel).await?;

        if self.channels.write().await.remove(&channel_id).is_none() {
            return Err(PlatformError::NotFound(format!("channel {}", channel_id)));
        }
        self.deleted.write().await.push(channel_id);
        Ok(())
    }

    async fn grant_access(
        &self,
        channel_id: u64,
        grant: &AccessGrant,
    ) -> Result<(), PlatformError> {
        self.take_failure(MockOperation::GrantAccess).await?;

        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(&channel_id)
            .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel_id)))?;
        channel.grants.retain(|g| g.subject != grant.subject);
        channel.grants.push(*grant);
        Ok(())
    }
}
