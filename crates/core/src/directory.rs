use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::DirectoryConfig;
use crate::errors::HostError;
use crate::host::{ChannelDirectory, ChannelInfo, IdentityDirectory, UserProfile};

/// Users and channels known up front, indexed for the lookups the plugin performs.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    users: HashMap<String, UserProfile>,
    channels: HashMap<String, ChannelInfo>,
}

impl StaticDirectory {
    pub fn new(users: Vec<UserProfile>, channels: Vec<ChannelInfo>) -> Self {
        Self {
            users: users.into_iter().map(|user| (user.id.clone(), user)).collect(),
            channels: channels.into_iter().map(|channel| (channel.id.clone(), channel)).collect(),
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(config.users.clone(), config.channels.clone())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[async_trait]
impl IdentityDirectory for StaticDirectory {
    async fn user(&self, user_id: &str) -> Result<UserProfile, HostError> {
        self.users.get(user_id).cloned().ok_or_else(|| HostError::not_found("user", user_id))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserProfile, HostError> {
        self.users
            .values()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned()
            .ok_or_else(|| HostError::not_found("user", username))
    }
}

#[async_trait]
impl ChannelDirectory for StaticDirectory {
    async fn channel_by_name(&self, team_id: &str, name: &str) -> Result<ChannelInfo, HostError> {
        self.channels
            .values()
            .find(|channel| channel.team_id == team_id && channel.name == name)
            .cloned()
            .ok_or_else(|| HostError::not_found("channel", format!("{team_id}/{name}")))
    }

    async fn channel(&self, channel_id: &str) -> Result<ChannelInfo, HostError> {
        self.channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| HostError::not_found("channel", channel_id))
    }
}
