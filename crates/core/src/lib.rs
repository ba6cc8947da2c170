pub mod config;
pub mod directory;
pub mod errors;
pub mod host;
pub mod posting;
pub mod roles;
pub mod settings;
pub mod store;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use directory::StaticDirectory;
pub use errors::{ApplicationError, HostError, InterfaceError, StoreError};
pub use host::{
    ChannelDirectory, ChannelInfo, HostServices, IdentityDirectory, KeyValueStore, NewPost,
    PostCreator, UserProfile,
};
pub use posting::{PostOutcome, PostTarget, RandomPoster, FALLBACK_QUOTE};
pub use roles::RoleSet;
pub use settings::{BotSettings, SettingsHandle, SettingsUpdate};
pub use store::QuoteStore;
