//! Seed import command
//!
//! Usage: blogdb seed --users users.json --posts posts.json --comments comments.json
//!
//! Input files use the jsonplaceholder shape. External ids are remapped to
//! the keys the store generates; posts and comments pointing at unknown
//! parents are rejected before anything is written for them.

use crate::CliResult;
use blogdb_core::service::PostDraft;
use blogdb_core::{
    BlogService, NewAddress, NewComment, NewCompany, NewPost, NewUser, SqliteStore, StoreConfig,
    UserProfile,
};
use clap::Args;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Users JSON array
    #[arg(long)]
    pub users: PathBuf,

    /// Posts JSON array
    #[arg(long)]
    pub posts: Option<PathBuf>,

    /// Comments JSON array; requires --posts
    #[arg(long, requires = "posts")]
    pub comments: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct FeedGeo {
    lat: String,
    lng: String,
}

#[derive(Debug, Deserialize)]
struct FeedAddress {
    street: String,
    suite: String,
    city: String,
    zipcode: String,
    geo: FeedGeo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedCompany {
    name: String,
    catch_phrase: String,
    bs: String,
}

#[derive(Debug, Deserialize)]
struct FeedUser {
    id: i64,
    name: String,
    username: String,
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    website: String,
    address: Option<FeedAddress>,
    company: Option<FeedCompany>,
}

impl FeedUser {
    fn into_profile(self) -> UserProfile {
        let profile = UserProfile::new(NewUser {
            name: self.name,
            username: self.username,
            email: self.email,
            phone: self.phone,
            website: self.website,
        });
        let profile = match self.address {
            Some(address) => profile.with_address(NewAddress {
                user_id: 0,
                street: address.street,
                suite: address.suite,
                city: address.city,
                zipcode: address.zipcode,
                lat: address.geo.lat,
                lng: address.geo.lng,
            }),
            None => profile,
        };
        match self.company {
            Some(company) => profile.with_company(NewCompany {
                user_id: 0,
                name: company.name,
                catch_phrase: company.catch_phrase,
                bs: company.bs,
            }),
            None => profile,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedPost {
    user_id: i64,
    id: i64,
    title: String,
    body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedComment {
    post_id: i64,
    name: String,
    email: String,
    body: String,
}

/// Execute seed import
///
/// Users and posts are imported as two units, each under a fresh call
/// context. Repeated external ids are rejected before any write.
pub fn execute(store: &SqliteStore, config: &StoreConfig, args: SeedArgs) -> CliResult<()> {
    let service = BlogService::new(store);

    let feed_users: Vec<FeedUser> = read_json(&args.users)?;
    let external_ids = unique_user_ids(&feed_users)?;
    let profiles = feed_users
        .into_iter()
        .map(FeedUser::into_profile)
        .collect::<Vec<_>>();
    let user_ids = service.import_users(&config.call_context(), &profiles)?;
    let user_map: HashMap<i64, i64> = external_ids.into_iter().zip(user_ids).collect();
    println!("imported users={}", user_map.len());

    let Some(posts_path) = &args.posts else {
        return Ok(());
    };
    let feed_posts: Vec<FeedPost> = read_json(posts_path)?;
    let feed_comments: Vec<FeedComment> = match &args.comments {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let drafts = build_drafts(&user_map, feed_posts, feed_comments)?;
    let published = service.publish_posts(&config.call_context(), &drafts)?;
    let comment_total: usize = published.iter().map(|post| post.comment_ids.len()).sum();
    println!(
        "imported posts={} comments={}",
        published.len(),
        comment_total
    );
    Ok(())
}

fn unique_user_ids(feed_users: &[FeedUser]) -> CliResult<Vec<i64>> {
    let mut seen = HashSet::with_capacity(feed_users.len());
    feed_users
        .iter()
        .map(|user| -> CliResult<i64> {
            if seen.insert(user.id) {
                Ok(user.id)
            } else {
                Err(format!("user id {} appears more than once", user.id).into())
            }
        })
        .collect()
}

fn build_drafts(
    user_map: &HashMap<i64, i64>,
    feed_posts: Vec<FeedPost>,
    feed_comments: Vec<FeedComment>,
) -> CliResult<Vec<PostDraft>> {
    let mut drafts = Vec::with_capacity(feed_posts.len());
    let mut post_slots: HashMap<i64, usize> = HashMap::new();
    for post in feed_posts {
        let user_id = *user_map
            .get(&post.user_id)
            .ok_or_else(|| format!("post {} references unknown user {}", post.id, post.user_id))?;
        if post_slots.insert(post.id, drafts.len()).is_some() {
            return Err(format!("post id {} appears more than once", post.id).into());
        }
        drafts.push(PostDraft {
            post: NewPost {
                user_id,
                title: post.title,
                body: post.body,
            },
            comments: Vec::new(),
        });
    }
    for comment in feed_comments {
        let slot = *post_slots
            .get(&comment.post_id)
            .ok_or_else(|| format!("comment references unknown post {}", comment.post_id))?;
        drafts[slot].comments.push(NewComment {
            post_id: 0,
            name: comment.name,
            email: comment.email,
            body: comment.body,
        });
    }
    Ok(drafts)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("cannot read `{}`: {err}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}
