//! Collaborator contracts provided by the chat-server host.
//!
//! The plugin never talks to the chat platform directly: every user lookup, channel
//! lookup, key-value read/write and post goes through one of these traits. Concrete
//! adapters live in `quotebot-db` (key-value) and in the server crate (posts).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::HostError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    /// Space separated role markers, exactly as the host reports them.
    #[serde(default)]
    pub roles: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub channel_id: String,
    /// `None` lets the host pick its default bot identity.
    pub user_id: Option<String>,
    pub message: String,
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn user(&self, user_id: &str) -> Result<UserProfile, HostError>;
    async fn user_by_username(&self, username: &str) -> Result<UserProfile, HostError>;
}

#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn channel_by_name(&self, team_id: &str, name: &str) -> Result<ChannelInfo, HostError>;
    async fn channel(&self, channel_id: &str) -> Result<ChannelInfo, HostError>;
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, HostError>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), HostError>;
}

#[async_trait]
pub trait PostCreator: Send + Sync {
    async fn create_post(&self, post: NewPost) -> Result<(), HostError>;
}

#[derive(Clone)]
pub struct HostServices {
    pub identity: Arc<dyn IdentityDirectory>,
    pub channels: Arc<dyn ChannelDirectory>,
    pub kv: Arc<dyn KeyValueStore>,
    pub posts: Arc<dyn PostCreator>,
}
