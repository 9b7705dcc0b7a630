//! Report command
//!
//! Usage: blogdb report <NAME> [--top N] [--min-posts N] [--user ID]

use crate::{print_json, CliResult};
use blogdb_core::reports::{
    raw_top_posts_per_user, EmailMatchedCommenters, PostBodyStatsReport, PostCommentCounts,
    PostCountsPerUser, ProlificAuthors, RankedPost, Report, ReportRunner, TopPostsPerUser,
    UserDirectory, UsersWithDiscussion, UsersWithoutPosts, REPORT_NAMES,
};
use blogdb_core::{CallContext, SqliteStore};
use clap::Args;
use serde::Serialize;

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Report name; `list` prints the available names
    pub name: String,

    /// Posts kept per user for `top_posts_per_user`
    #[arg(long, default_value_t = 3)]
    pub top: u32,

    /// Threshold for `prolific_authors`
    #[arg(long, default_value_t = 2)]
    pub min_posts: u32,

    /// Restrict `user_directory` to one user
    #[arg(long)]
    pub user: Option<i64>,

    /// Run the hand-written SQL rendition where one exists
    #[arg(long)]
    pub raw: bool,
}

/// Execute report
pub fn execute(store: &SqliteStore, ctx: &CallContext, args: ReportArgs) -> CliResult<()> {
    let runner = ReportRunner::new(store);
    if args.raw {
        if args.name != TopPostsPerUser::NAME {
            return Err(format!("no raw rendition of report `{}`", args.name).into());
        }
        let rows: Vec<RankedPost> = runner.run_raw(ctx, raw_top_posts_per_user(args.top))?;
        return print_all(&rows);
    }

    match args.name.as_str() {
        "list" => {
            for name in REPORT_NAMES {
                println!("{name}");
            }
            Ok(())
        }
        PostCountsPerUser::NAME => print_all(&runner.run(ctx, &PostCountsPerUser)?),
        TopPostsPerUser::NAME => print_all(&runner.run(
            ctx,
            &TopPostsPerUser {
                per_user: args.top,
            },
        )?),
        EmailMatchedCommenters::NAME => print_all(&runner.run(ctx, &EmailMatchedCommenters)?),
        UsersWithoutPosts::NAME => print_all(&runner.run(ctx, &UsersWithoutPosts)?),
        UserDirectory::NAME => print_all(&runner.run(
            ctx,
            &UserDirectory {
                user_id: args.user,
            },
        )?),
        PostBodyStatsReport::NAME => print_all(&runner.run(ctx, &PostBodyStatsReport)?),
        ProlificAuthors::NAME => print_all(&runner.run(
            ctx,
            &ProlificAuthors {
                min_posts: args.min_posts,
            },
        )?),
        UsersWithDiscussion::NAME => print_all(&runner.run(ctx, &UsersWithDiscussion)?),
        PostCommentCounts::NAME => print_all(&runner.run(ctx, &PostCommentCounts)?),
        other => Err(format!(
            "unknown report `{other}`; expected one of {}",
            REPORT_NAMES.join(", ")
        )
        .into()),
    }
}

fn print_all<T: Serialize>(rows: &[T]) -> CliResult<()> {
    rows.iter().try_for_each(print_json)
}
