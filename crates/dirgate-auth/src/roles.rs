//! Cache-backed role membership.
//!
//! Declarative role checks must not pay for a fresh bind per request, so
//! group member sets are served from a loading cache. A miss populates
//! the entry from the directory exactly once, even under concurrent
//! access: the underlying cache collapses simultaneous misses for one key
//! into a single in-flight load, while distinct keys load fully in
//! parallel.
//!
//! Population failures degrade to the empty member set. A directory
//! outage therefore denies role-based authorization instead of granting
//! it or surfacing errors to request handling.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dirgate_ldap::{sanitize_token, CachePolicy, DirectoryResult, GroupDirectory};
use moka::future::Cache;

/// Source of a group's member usernames.
///
/// The cache is generic over this seam so tests can observe how many
/// underlying lookups a workload triggers.
#[async_trait]
pub trait GroupLoader: Send + Sync {
    /// Looks up the member usernames of a group.
    async fn members_of(&self, group: &str) -> DirectoryResult<HashSet<String>>;
}

#[async_trait]
impl GroupLoader for GroupDirectory {
    async fn members_of(&self, group: &str) -> DirectoryResult<HashSet<String>> {
        self.members_of_group(group).await
    }
}

/// Loading cache from group name to member set.
pub struct GroupMembershipCache<L> {
    cache: Cache<String, Arc<HashSet<String>>>,
    loader: Arc<L>,
}

impl<L> Clone for GroupMembershipCache<L> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            loader: Arc::clone(&self.loader),
        }
    }
}

impl<L: GroupLoader + 'static> GroupMembershipCache<L> {
    /// Creates a cache over the given loader with the configured policy.
    #[must_use]
    pub fn new(loader: L, policy: &CachePolicy) -> Self {
        let mut builder = Cache::builder().max_capacity(policy.max_entries);
        if let Some(ttl) = policy.time_to_live {
            builder = builder.time_to_live(ttl);
        }
        Self {
            cache: builder.build(),
            loader: Arc::new(loader),
        }
    }

    /// Returns the members of a group, populating the entry on first
    /// access.
    ///
    /// A failed load is recorded as the empty set; once evicted or
    /// expired, the next read is a fresh miss and re-queries the
    /// directory.
    pub async fn members_of(&self, group: &str) -> Arc<HashSet<String>> {
        let loader = Arc::clone(&self.loader);
        let key = group.to_string();
        self.cache
            .get_with(key.clone(), async move {
                match loader.members_of(&key).await {
                    Ok(members) => Arc::new(members),
                    Err(err) => {
                        tracing::warn!(
                            group = %key,
                            "group member lookup failed, treating membership as empty: {err}"
                        );
                        Arc::new(HashSet::new())
                    }
                }
            })
            .await
    }

    /// Checks whether a user belongs to a group (the role check used by
    /// declarative authorization).
    ///
    /// The username is sanitized before comparison, matching the form
    /// usernames take everywhere else in the filter pipeline.
    pub async fn is_member(&self, username: &str, group: &str) -> bool {
        self.members_of(group)
            .await
            .contains(&sanitize_token(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use dirgate_ldap::DirectoryError;

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
        members: HashSet<String>,
        delay: Duration,
    }

    #[async_trait]
    impl GroupLoader for CountingLoader {
        async fn members_of(&self, _group: &str) -> DirectoryResult<HashSet<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.members.clone())
        }
    }

    struct FailingLoader {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GroupLoader for FailingLoader {
        async fn members_of(&self, _group: &str) -> DirectoryResult<HashSet<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DirectoryError::unavailable("connection refused"))
        }
    }

    fn policy(ttl: Option<Duration>) -> CachePolicy {
        CachePolicy {
            max_entries: 64,
            time_to_live: ttl,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_misses_trigger_a_single_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = GroupMembershipCache::new(
            CountingLoader {
                calls: Arc::clone(&calls),
                members: HashSet::from(["alice".to_string()]),
                delay: Duration::from_millis(50),
            },
            &policy(None),
        );

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(
                async move { cache.members_of("admins").await },
            ));
        }
        for task in tasks {
            let members = task.await.unwrap();
            assert!(members.contains("alice"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_population_is_cached_as_empty() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = GroupMembershipCache::new(
            FailingLoader {
                calls: Arc::clone(&calls),
            },
            &policy(None),
        );

        assert!(cache.members_of("admins").await.is_empty());
        assert!(!cache.is_member("alice", "admins").await);

        // The empty result was cached: no further lookups.
        let _ = cache.members_of("admins").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_a_fresh_miss() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = GroupMembershipCache::new(
            CountingLoader {
                calls: Arc::clone(&calls),
                members: HashSet::from(["alice".to_string()]),
                delay: Duration::ZERO,
            },
            &policy(Some(Duration::from_millis(100))),
        );

        assert!(cache.is_member("alice", "admins").await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(cache.is_member("alice", "admins").await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn membership_check_sanitizes_the_username() {
        let cache = GroupMembershipCache::new(
            CountingLoader {
                calls: Arc::new(AtomicUsize::new(0)),
                members: HashSet::from(["alice".to_string()]),
                delay: Duration::ZERO,
            },
            &policy(None),
        );

        assert!(cache.is_member("ali*ce", "admins").await);
        assert!(!cache.is_member("eve", "admins").await);
    }

    #[tokio::test]
    async fn distinct_groups_load_independently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = GroupMembershipCache::new(
            CountingLoader {
                calls: Arc::clone(&calls),
                members: HashSet::new(),
                delay: Duration::ZERO,
            },
            &policy(None),
        );

        let _ = cache.members_of("admins").await;
        let _ = cache.members_of("ops").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
