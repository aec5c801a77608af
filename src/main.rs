use std::{path::Path, process, sync::Arc};

use palsync::{
    application::{
        comments::{NewComment, add_comment_key, delete_key, thread_key},
        context::AppContext,
        error::AppError,
        groups::{NewGroup, categories_key, create_group_key},
        posts::{CreatePostCommand, create_post_key, feed_key, summarize_feed},
        repos::UploadFile,
    },
    cache::{MutationHandle, MutationOptions, NextPage, QueryKey, QueryState, QueryStatus},
    config::{self, Command, Settings, UserArgs},
    domain::{entities::CommentRecord, users::CurrentUser},
    infra::{error::InfraError, navigation::LoggingNavigator, telemetry},
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let navigator = Arc::new(LoggingNavigator::new());
    let app = AppContext::from_settings(&settings, navigator)?;
    info!(
        targets = ?app.registry.target_names(),
        "Sync layer ready"
    );

    let result = dispatch(&app, &settings, &cli_args.user, cli_args.command).await;
    app.shutdown();
    result
}

async fn dispatch(
    app: &AppContext,
    settings: &Settings,
    user: &UserArgs,
    command: Command,
) -> Result<(), AppError> {
    match command {
        Command::Feed(args) => {
            let key = feed_key(args.group_id);
            let mut state = settled(&key, app.posts.feed(args.group_id).await)?;
            for _ in 1..args.pages {
                match app.posts.feed_next_page(args.group_id).await {
                    NextPage::Settled(next) | NextPage::Restarted(next) => {
                        state = settled(&key, next)?;
                    }
                    _ => break,
                }
            }
            print_json(&summarize_feed(&state, OffsetDateTime::now_utc()))
        }
        Command::Comments(args) => {
            let key = thread_key(args.post_id);
            let mut state = settled(&key, app.comments.thread(args.post_id).await)?;
            for _ in 1..args.pages {
                match app.comments.thread_next_page(args.post_id).await {
                    NextPage::Settled(next) | NextPage::Restarted(next) => {
                        state = settled(&key, next)?;
                    }
                    _ => break,
                }
            }
            print_json(&state.items().collect::<Vec<_>>())
        }
        Command::Comment(args) => {
            let comment = NewComment {
                post_id: args.post_id,
                parent_comment_id: args.parent_comment_id,
                content: args.content,
            };
            let handle = MutationHandle::new(add_comment_key(args.post_id));
            app.comments
                .add_comment(&handle, comment, MutationOptions::new())
                .await?;
            info!(post_id = args.post_id, "Comment posted");
            Ok(())
        }
        Command::DeleteComment(args) => {
            let user = current_user(user)?;
            let comment = find_comment(app, args.post_id, args.comment_id).await?;
            let handle = MutationHandle::new(delete_key(comment.id));
            app.comments
                .delete_comment(&handle, &user, &comment, MutationOptions::new())
                .await?;
            info!(comment_id = args.comment_id, "Comment deleted");
            Ok(())
        }
        Command::CreatePost(args) => {
            let user = current_user(user)?;
            let mut files = Vec::with_capacity(args.files.len());
            for path in &args.files {
                files.push(read_upload(path).await?);
            }
            let command = CreatePostCommand {
                group_id: args.group_id,
                content: args.content,
                files,
            };
            let handle = MutationHandle::new(create_post_key());
            app.posts
                .create_post(&handle, &user, command, MutationOptions::new())
                .await?;
            info!(group_id = args.group_id, "Post created");
            Ok(())
        }
        Command::CreateGroup(args) => {
            let user = current_user(user)?;
            let group = NewGroup {
                name: args.name,
                description: args.description,
                allow_invitation: args.allow_invitation,
                category_id: args.category_id,
                invitees: args.invitees,
            };
            let handle = MutationHandle::new(create_group_key());
            let created = app
                .groups
                .create_group(&handle, &user, group, MutationOptions::new())
                .await?;
            print_json(&created)
        }
        Command::Categories => {
            let key = categories_key();
            let state = settled(&key, app.groups.categories().await)?;
            print_json(&state.items().collect::<Vec<_>>())
        }
        Command::Whoami => {
            let user = current_user(user)?;
            let avatar_url = user.avatar_url(settings.api.avatar_base_url.as_ref());
            print_json(&Whoami {
                user: &user,
                avatar_url,
            })
        }
    }
}

#[derive(Serialize)]
struct Whoami<'a> {
    #[serde(flatten)]
    user: &'a CurrentUser,
    avatar_url: Option<String>,
}

fn current_user(args: &UserArgs) -> Result<CurrentUser, AppError> {
    let id = args
        .user_id
        .ok_or_else(|| AppError::validation("--user-id is required for this command"))?;
    Ok(CurrentUser {
        id,
        role: args.role.into(),
        first_name: args.first_name.clone().unwrap_or_default(),
        avatar: args.avatar.clone(),
    })
}

/// Page through a thread until the comment shows up.
async fn find_comment(
    app: &AppContext,
    post_id: i64,
    comment_id: i64,
) -> Result<CommentRecord, AppError> {
    let key = thread_key(post_id);
    let mut state = settled(&key, app.comments.thread(post_id).await)?;
    loop {
        if let Some(comment) = state.items().find(|comment| comment.id == comment_id) {
            return Ok(comment.clone());
        }
        match app.comments.thread_next_page(post_id).await {
            NextPage::Settled(next) | NextPage::Restarted(next) => {
                state = settled(&key, next)?;
            }
            NextPage::InFlight => {
                warn!(post_id, "Thread fetch already running");
                break;
            }
            NextPage::Exhausted | NextPage::NotLoaded => break,
        }
    }
    Err(AppError::not_found(format!(
        "comment {comment_id} on post {post_id}"
    )))
}

async fn read_upload(path: &Path) -> Result<UploadFile, AppError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(InfraError::from)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::validation(format!("`{}` has no file name", path.display())))?;
    Ok(UploadFile::new(file_name, bytes))
}

fn settled<T>(key: &QueryKey, state: QueryState<T>) -> Result<QueryState<T>, AppError> {
    match (&state.status, &state.error) {
        (QueryStatus::Error, Some(error)) => Err(AppError::query(key, error)),
        _ => Ok(state),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
