use serde::{Deserialize, Serialize};

pub const BOT_DISPLAY_NAME: &str = "Quotebot";
pub const ICON_URL: &str = "/plugins/quotebot/quotebot.png";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Ephemeral,
    InChannel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseProps {
    pub from_webhook: String,
    pub use_user_icon: String,
}

impl Default for ResponseProps {
    fn default() -> Self {
        Self { from_webhook: "true".to_owned(), use_user_icon: "true".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response_type: ResponseType,
    pub username: String,
    pub icon_url: String,
    pub text: String,
    pub props: ResponseProps,
}

impl CommandResponse {
    pub fn new(response_type: ResponseType, text: impl Into<String>) -> Self {
        Self {
            response_type,
            username: BOT_DISPLAY_NAME.to_owned(),
            icon_url: ICON_URL.to_owned(),
            text: text.into(),
            props: ResponseProps::default(),
        }
    }

    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self::new(ResponseType::Ephemeral, text)
    }

    pub fn in_channel(text: impl Into<String>) -> Self {
        Self::new(ResponseType::InChannel, text)
    }

    pub fn is_ephemeral(&self) -> bool {
        self.response_type == ResponseType::Ephemeral
    }
}

pub const NO_QUOTES: &str = "There aren't any quotes yet.";
pub const EMPTY_QUOTE: &str = "Empty quote. Try adding a quote with some text.";
pub const DELETE_NOT_ADMIN: &str = "Only admins can delete quotes.";
pub const DELETE_NOT_A_NUMBER: &str = "What quote? You have to specify a quote index.";
pub const LIST_NOT_ADMIN: &str = "Only admins can list the quotes.";
pub const CHANNEL_NOT_ADMIN: &str = "Only admins can set the channel.";
pub const CHANNEL_MISSING: &str = "You must specify a channel name.";
pub const INTERVAL_NOT_ADMIN: &str = "Only admins can set the interval.";
pub const INTERVAL_NOT_A_NUMBER: &str = "You have to specify an interval in minutes, >= 15.";
pub const INTERVAL_TOO_SHORT: &str =
    "You can't set an Interval less than 15 minutes, it's annoying.";
pub const INTERVAL_TOO_LONG: &str =
    "You can't set the Interval to more than a week, that's excessive.";
pub const USER_NOT_ADMIN: &str = "Only admins can set the post user.";
pub const USER_MISSING: &str = "You must specify a user name.";

pub fn quote_message(text: &str) -> CommandResponse {
    CommandResponse::in_channel(format!("> {text}"))
}

pub fn quote_missing_message(requested: i64, count: usize) -> CommandResponse {
    CommandResponse::ephemeral(format!(
        "Unable to show quote {requested}, it doesn't exist yet. There are {count} quotes on file."
    ))
}

pub fn quote_added_message(text: &str, number: usize) -> CommandResponse {
    CommandResponse::in_channel(format!("Added {text:?} as quote number {number}."))
}

pub fn delete_missing_message(requested: i64) -> CommandResponse {
    CommandResponse::ephemeral(format!("You can't delete quote {requested}, it doesn't exist."))
}

pub fn quote_deleted_message(requested: i64, remaining: usize) -> CommandResponse {
    CommandResponse::ephemeral(format!(
        "Deleted quote {requested}. There are {remaining} quotes on file."
    ))
}

pub fn quote_list_message(quotes: &[String]) -> CommandResponse {
    let mut text = format!("There are {} quotes on file.", quotes.len());
    for (index, quote) in quotes.iter().enumerate() {
        text.push_str(&format!("\n* {} = {quote:?}", index + 1));
    }
    CommandResponse::ephemeral(text)
}

pub fn channel_unknown_message(name: &str) -> CommandResponse {
    CommandResponse::ephemeral(format!("{name:?} isn't a valid channel, use one that exists."))
}

pub fn channel_set_message(display_name: &str) -> CommandResponse {
    CommandResponse::ephemeral(format!("Channel set to {display_name}."))
}

pub fn interval_set_message(minutes: i64) -> CommandResponse {
    CommandResponse::ephemeral(format!("Interval set to {minutes} minutes."))
}

pub fn user_unknown_message(username: &str) -> CommandResponse {
    CommandResponse::ephemeral(format!("Unable to find a user named {username:?}."))
}

pub fn user_set_message(username: &str) -> CommandResponse {
    CommandResponse::ephemeral(format!("Quotes will be posted by {username}."))
}

/// `monitoring` is the channel display name and interval, or `None` when the channel
/// cannot be resolved.
pub fn info_message(
    is_admin: bool,
    quote_count: usize,
    monitoring: Option<(&str, f64)>,
) -> CommandResponse {
    let mut text =
        if is_admin { "You are an Admin.".to_owned() } else { "You are a User.".to_owned() };
    text.push_str(&format!(" Quotebot knows {quote_count} quotes."));
    match monitoring {
        Some((channel, minutes)) => {
            text.push_str(&format!(" Monitoring {channel} for activity every {minutes} minutes."))
        }
        None => text.push_str(" Monitoring a non-existent channel. An Admin should fix that."),
    }
    CommandResponse::ephemeral(text)
}

pub fn help_text(trigger: &str) -> String {
    format!(
        "Quotebot remembers quotes you tell it about, and spits them out again when you ask it to.

Commands:

* /{trigger} - Regurgitate a random quote.
* /{trigger} *x* - Show quote number *x*.
* /{trigger} add *genius quote* - Store *genius quote* for later. Don't forget to
  include an attribution!
* /{trigger} help - Show the help.
* /{trigger} info - Show the number of quotes, the channel, and the interval."
    )
}

pub fn admin_help_text(trigger: &str) -> String {
    format!(
        "Admin commands:

* /{trigger} channel *x* - Monitor channel *x* for activity and randomly
  show quotes there.
* /{trigger} delete *x* - Delete quote number *x*.
* /{trigger} interval *x* - The time between automatically posting quotes
  in a channel.
* /{trigger} list - List all known quotes.
* /{trigger} user *x* - Post random quotes as user *x*."
    )
}

pub fn help_message(trigger: &str, is_admin: bool) -> CommandResponse {
    if is_admin {
        let text = format!("{}\n\n{}", help_text(trigger), admin_help_text(trigger));
        CommandResponse::ephemeral(text)
    } else {
        CommandResponse::ephemeral(help_text(trigger))
    }
}
