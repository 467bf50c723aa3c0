//! Client-side joins
//!
//! Parent rows are fetched first, then child rows for the visible parent set
//! in separate round trips. These functions merge the results in memory by
//! foreign key. A missing author is replaced by [`AuthorSummary::unknown`].

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{AuthorSummary, FeedItem, Like, LikeSummary, Post, Profile, Story, StoryGroup};

/// Distinct ids in first-seen order
pub fn unique_ids<I: IntoIterator<Item = Uuid>>(ids: I) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Author lookup keyed by `user_id`
pub struct AuthorIndex {
    by_user: HashMap<Uuid, AuthorSummary>,
}

impl AuthorIndex {
    pub fn new(profiles: &[Profile]) -> Self {
        Self {
            by_user: profiles
                .iter()
                .map(|p| (p.user_id, AuthorSummary::from(p)))
                .collect(),
        }
    }

    pub fn author(&self, user_id: Uuid) -> AuthorSummary {
        self.by_user
            .get(&user_id)
            .cloned()
            .unwrap_or_else(AuthorSummary::unknown)
    }
}

/// Per-post like count and whether `viewer` is among the likers
pub fn like_summaries(likes: &[Like], viewer: Option<Uuid>) -> HashMap<Uuid, LikeSummary> {
    let mut summaries: HashMap<Uuid, LikeSummary> = HashMap::new();
    for like in likes {
        let entry = summaries.entry(like.post_id).or_default();
        entry.count += 1;
        if Some(like.user_id) == viewer {
            entry.is_liked = true;
        }
    }
    summaries
}

/// Comment count per post from the `post_id` column of its comments
pub fn comment_counts(comment_post_ids: &[Uuid]) -> HashMap<Uuid, i64> {
    let mut counts = HashMap::new();
    for post_id in comment_post_ids {
        *counts.entry(*post_id).or_insert(0) += 1;
    }
    counts
}

/// Merge posts with authors, like aggregates and comment counts. Post order
/// is preserved.
pub fn merge_feed(
    posts: Vec<Post>,
    profiles: &[Profile],
    likes: &[Like],
    comment_post_ids: &[Uuid],
    viewer: Option<Uuid>,
) -> Vec<FeedItem> {
    let authors = AuthorIndex::new(profiles);
    let likes = like_summaries(likes, viewer);
    let comments = comment_counts(comment_post_ids);

    posts
        .into_iter()
        .map(|post| FeedItem {
            author: authors.author(post.user_id),
            likes: likes.get(&post.id).copied().unwrap_or_default(),
            comment_count: comments.get(&post.id).copied().unwrap_or(0),
            post,
        })
        .collect()
}

/// Group stories by author, keeping the order in which authors first appear.
pub fn group_stories(stories: Vec<Story>, profiles: &[Profile]) -> Vec<StoryGroup> {
    let authors = AuthorIndex::new(profiles);
    let mut groups: Vec<StoryGroup> = Vec::new();
    let mut slot: HashMap<Uuid, usize> = HashMap::new();

    for story in stories {
        match slot.get(&story.user_id) {
            Some(&idx) => groups[idx].stories.push(story),
            None => {
                slot.insert(story.user_id, groups.len());
                groups.push(StoryGroup {
                    user_id: story.user_id,
                    author: authors.author(story.user_id),
                    stories: vec![story],
                });
            }
        }
    }

    groups
}
