use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};
use uuid::Uuid;

use crate::domain::types::Role;

/// Command-line arguments for the palsync binary.
#[derive(Debug, Parser)]
#[command(
    name = "palsync",
    version,
    about = "Tinnitus pal feed and community client"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PALSYNC_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(flatten)]
    pub user: UserArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the post feed of a group.
    Feed(FeedArgs),
    /// Print the comment thread of a post.
    Comments(ThreadArgs),
    /// Comment on a post or reply to a comment.
    Comment(CommentArgs),
    /// Delete a comment you wrote (admins may delete any comment).
    #[command(name = "delete-comment")]
    DeleteComment(DeleteCommentArgs),
    /// Upload images and publish a post to a group.
    #[command(name = "create-post")]
    CreatePost(CreatePostArgs),
    /// Create a group and invite members.
    #[command(name = "create-group")]
    CreateGroup(CreateGroupArgs),
    /// List group categories.
    Categories,
    /// Print the configured user and their avatar URL.
    Whoami,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SettingsOverrides {
    /// Override the API base URL.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Override the bearer token sent to the API.
    #[arg(long = "api-token", env = "PALSYNC_API_TOKEN", value_name = "TOKEN", global = true)]
    pub api_token: Option<String>,

    /// Override the per-request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS", global = true)]
    pub api_timeout_seconds: Option<u64>,

    /// Override the number of unsubscribed queries kept in memory.
    #[arg(long = "cache-idle-entry-limit", value_name = "COUNT", global = true)]
    pub cache_idle_entry_limit: Option<usize>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

/// Identity of the signed-in user, as issued by the auth provider.
#[derive(Debug, Args, Default, Clone)]
pub struct UserArgs {
    #[arg(long = "user-id", env = "PALSYNC_USER_ID", value_name = "UUID", global = true)]
    pub user_id: Option<Uuid>,

    #[arg(long = "user-role", value_enum, default_value_t = RoleArg::User, global = true)]
    pub role: RoleArg,

    #[arg(long = "user-name", env = "PALSYNC_USER_NAME", value_name = "NAME", global = true)]
    pub first_name: Option<String>,

    /// Avatar storage path of the user.
    #[arg(long = "user-avatar", value_name = "PATH", global = true)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Admin,
    #[default]
    User,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Admin => Role::Admin,
            RoleArg::User => Role::User,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct FeedArgs {
    pub group_id: i64,

    /// Number of pages to load.
    #[arg(long, default_value_t = 1)]
    pub pages: usize,
}

#[derive(Debug, Args, Clone)]
pub struct ThreadArgs {
    pub post_id: i64,

    /// Number of pages to load.
    #[arg(long, default_value_t = 1)]
    pub pages: usize,
}

#[derive(Debug, Args, Clone)]
pub struct CommentArgs {
    pub post_id: i64,

    /// Comment to reply to.
    #[arg(long = "reply-to", value_name = "COMMENT_ID")]
    pub parent_comment_id: Option<i64>,

    pub content: String,
}

#[derive(Debug, Args, Clone)]
pub struct DeleteCommentArgs {
    pub post_id: i64,
    pub comment_id: i64,
}

#[derive(Debug, Args, Clone)]
pub struct CreatePostArgs {
    pub group_id: i64,

    #[arg(long, default_value = "")]
    pub content: String,

    /// Image to attach; repeat for several images. Uploaded in the given order.
    #[arg(long = "file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateGroupArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long = "category-id", value_name = "ID")]
    pub category_id: Option<i64>,

    /// Let members invite other people.
    #[arg(long = "allow-invitation", action = clap::ArgAction::SetTrue)]
    pub allow_invitation: bool,

    /// User to invite; repeat for several users.
    #[arg(long = "invite", value_name = "UUID")]
    pub invitees: Vec<Uuid>,
}
