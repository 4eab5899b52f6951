//! Topic search and discovery.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use democrasite_common::{AppError, AppResult};
use democrasite_db::{
    entities::topic,
    repositories::{TopicRepository, TopicSearchQuery, TopicSort, UserRepository},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Query parameters of a topic search.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub title: Option<String>,
    /// Comma-separated tag substrings, matched as an OR-list.
    pub tags: Option<String>,
    pub sort: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            title: None,
            tags: None,
            sort: None,
        }
    }
}

const fn default_page() -> i64 {
    DEFAULT_PAGE
}

const fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// A topic in a listing.
#[derive(Debug, Clone, Serialize)]
pub struct TopicSummary {
    pub share_code: String,
    pub title: String,
    pub created_at: DateTime<FixedOffset>,
    pub total_votes: i64,
    pub favorite_count: i64,
    pub answer_count: usize,
    pub tags: Vec<String>,
    pub creator_username: String,
    pub is_public: bool,
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub topics: Vec<TopicSummary>,
    pub total: u64,
    pub page: i64,
    pub limit: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Parse a sort key. `votes` is an alias of `popular`.
pub fn parse_sort(sort: Option<&str>) -> AppResult<TopicSort> {
    match sort.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(TopicSort::default()),
        Some(s) => match s.to_lowercase().as_str() {
            "popular" | "votes" => Ok(TopicSort::Popular),
            "recent" => Ok(TopicSort::Recent),
            "favorites" => Ok(TopicSort::Favorites),
            "alphabetical" => Ok(TopicSort::Alphabetical),
            other => Err(AppError::Validation(format!(
                "Unknown sort order: {other}"
            ))),
        },
    }
}

/// Strip control characters and surrounding whitespace from a search term.
fn sanitize(term: &str) -> String {
    term.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn split_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(sanitize)
            .filter(|t| !t.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Build listing entries, resolving creator usernames in one query.
pub(crate) async fn summarize(
    user_repo: &UserRepository,
    topics: Vec<topic::Model>,
) -> AppResult<Vec<TopicSummary>> {
    let mut creator_ids: Vec<String> = topics.iter().map(|t| t.creator_id.clone()).collect();
    creator_ids.sort();
    creator_ids.dedup();

    let usernames: HashMap<String, String> = user_repo
        .find_by_ids(&creator_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    Ok(topics
        .into_iter()
        .map(|t| TopicSummary {
            answer_count: t.answer_list().len(),
            tags: t.tag_list(),
            creator_username: usernames.get(&t.creator_id).cloned().unwrap_or_default(),
            share_code: t.share_code,
            title: t.title,
            created_at: t.created_at,
            total_votes: t.vote_count,
            favorite_count: t.favorite_count,
            is_public: t.is_public,
        })
        .collect())
}

/// Search service over topics visible to a user.
#[derive(Clone)]
pub struct SearchService {
    topic_repo: TopicRepository,
    user_repo: UserRepository,
}

impl SearchService {
    /// Create a new search service.
    #[must_use]
    pub const fn new(topic_repo: TopicRepository, user_repo: UserRepository) -> Self {
        Self {
            topic_repo,
            user_repo,
        }
    }

    /// Search topics visible to `user_id`.
    pub async fn search(&self, user_id: &str, params: &SearchParams) -> AppResult<SearchPage> {
        if params.page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if !(1..=MAX_LIMIT).contains(&params.limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        let sort = parse_sort(params.sort.as_deref())?;

        let page = params.page as u64;
        let limit = params.limit as u64;
        let query = TopicSearchQuery {
            viewer_id: user_id.to_string(),
            title: params
                .title
                .as_deref()
                .map(sanitize)
                .filter(|t| !t.is_empty()),
            tags: split_tags(params.tags.as_deref()),
            sort,
            offset: (page - 1).saturating_mul(limit),
            limit,
        };

        let (topics, total) = self.topic_repo.search(&query).await?;
        debug!(user_id = %user_id, total, page, limit, sort = ?sort, "Searched topics");

        Ok(SearchPage {
            topics: summarize(&self.user_repo, topics).await?,
            total,
            page: params.page,
            limit: params.limit,
            has_next: page.saturating_mul(limit) < total,
            has_prev: page > 1,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{Fixture, TopicOptions};

    #[test]
    fn test_parse_sort() {
        assert_eq!(parse_sort(None).unwrap(), TopicSort::Popular);
        assert_eq!(parse_sort(Some("votes")).unwrap(), TopicSort::Popular);
        assert_eq!(parse_sort(Some("Recent")).unwrap(), TopicSort::Recent);
        assert_eq!(parse_sort(Some("favorites")).unwrap(), TopicSort::Favorites);
        assert_eq!(
            parse_sort(Some("alphabetical")).unwrap(),
            TopicSort::Alphabetical
        );
        assert!(matches!(
            parse_sort(Some("random")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(
            split_tags(Some(" sports, ,music\t")),
            vec!["sports", "music"]
        );
        assert!(split_tags(None).is_empty());
    }

    fn params(page: i64, limit: i64) -> SearchParams {
        SearchParams {
            page,
            limit,
            ..SearchParams::default()
        }
    }

    #[tokio::test]
    async fn test_pagination_bounds() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;

        for (page, limit) in [(0, 20), (1, 0), (1, 101)] {
            let result = fx.search.search(&alice.id, &params(page, limit)).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_pagination_flags() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        for i in 0..5 {
            fx.topic(&alice, TopicOptions::public().title(&format!("Topic {i}")))
                .await;
        }

        let first = fx.search.search(&alice.id, &params(1, 2)).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.topics.len(), 2);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let last = fx.search.search(&alice.id, &params(3, 2)).await.unwrap();
        assert_eq!(last.topics.len(), 1);
        assert!(!last.has_next);
        assert!(last.has_prev);

        let beyond = fx.search.search(&alice.id, &params(10, 2)).await.unwrap();
        assert!(beyond.topics.is_empty());
        assert_eq!(beyond.page, 10);
    }

    #[tokio::test]
    async fn test_huge_page_number_is_empty() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        fx.topic(&alice, TopicOptions::public()).await;

        let page = 100_000_000_000_000_000;
        let result = fx.search.search(&alice.id, &params(page, 100)).await.unwrap();
        assert!(result.topics.is_empty());
        assert_eq!(result.total, 1);
        assert_eq!(result.page, page);
        assert!(result.has_prev);
        assert!(!result.has_next);

        let last = fx.search.search(&alice.id, &params(i64::MAX, 100)).await.unwrap();
        assert!(last.topics.is_empty());
        assert_eq!(last.total, 1);
    }

    #[tokio::test]
    async fn test_tag_filter_and_visibility() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        fx.topic(&alice, TopicOptions::public().title("Team").tags(&["Sports"]))
            .await;
        fx.topic(&alice, TopicOptions::public().title("Album").tags(&["music"]))
            .await;
        fx.topic(&alice, TopicOptions::public().title("Pizza").tags(&["food"]))
            .await;
        fx.topic(
            &alice,
            TopicOptions::private().title("Secret").tags(&["sports"]),
        )
        .await;

        let search = SearchParams {
            tags: Some("sports,music".to_string()),
            sort: Some("alphabetical".to_string()),
            ..SearchParams::default()
        };

        let page = fx.search.search(&bob.id, &search).await.unwrap();
        let titles: Vec<&str> = page.topics.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Album", "Team"]);

        let page = fx.search.search(&alice.id, &search).await.unwrap();
        assert_eq!(page.total, 3);
        let secret = page.topics.iter().find(|t| t.title == "Secret").unwrap();
        assert!(!secret.is_public);
        assert_eq!(secret.creator_username, "alice");
        assert_eq!(secret.tags, vec!["SPORTS"]);
        assert_eq!(secret.answer_count, 2);
    }

    #[tokio::test]
    async fn test_popular_sort_follows_votes() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        fx.topic(&alice, TopicOptions::public().title("Quiet")).await;
        let busy = fx.topic(&alice, TopicOptions::public().title("Busy")).await;

        for user in [&alice, &bob] {
            fx.votes
                .submit_vote(&busy.share_code, &user.id, &["Yes".to_string()])
                .await
                .unwrap();
        }

        let page = fx
            .search
            .search(&alice.id, &SearchParams::default())
            .await
            .unwrap();
        assert_eq!(page.topics[0].title, "Busy");
        assert_eq!(page.topics[0].total_votes, 2);
    }
}
