//! Artifact-graph store protocol.
//!
//! A store answers four questions about the graph of artifacts attached to a
//! subject: which referrers exist, what a referrer's manifest looks like, what
//! bytes a blob holds, and which descriptor a human-readable path points at.
//!
//! Calls carry no implied session. Paging state travels in the
//! [`StoreConfiguration`] as a `nextToken`, so any single call can be retried.

pub mod reference;
pub mod types;
pub mod wire;

use std::collections::HashSet;

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use tracing::debug;

use crate::errors::code::LIST_REFERRERS_FAILURE;
use crate::errors::{ComponentType, Result};

pub use reference::SubjectReference;
pub use types::{
    BlobContent, Descriptor, ListReferrersPage, ReferenceManifest, Referrer, StoreConfiguration,
};

/// A pluggable artifact-graph store.
#[async_trait]
pub trait ReferrerStore: Send + Sync {
    /// Registered name of this store.
    fn name(&self) -> &str;

    /// One page of referrers attached to `subject`.
    ///
    /// An empty `artifact_types` means all types.
    async fn list_referrers(
        &self,
        subject: &Descriptor,
        artifact_types: &[String],
        config: &StoreConfiguration,
    ) -> Result<ListReferrersPage>;

    async fn get_blob_content(
        &self,
        artifact: &Descriptor,
        config: &StoreConfiguration,
    ) -> Result<BlobContent>;

    /// Resolve `name:tag` or `name@digest` to its canonical descriptor.
    async fn get_subject_descriptor(
        &self,
        path: &str,
        config: &StoreConfiguration,
    ) -> Result<Descriptor>;

    async fn get_reference_manifest(
        &self,
        subject_path: &str,
        referrer: &Descriptor,
        config: &StoreConfiguration,
    ) -> Result<ReferenceManifest>;
}

struct PageCursor {
    next: Option<StoreConfiguration>,
    seen_tokens: HashSet<String>,
}

/// Stream every page of referrers for `subject`.
///
/// Each page's `nextToken` is fed back through the configuration of the
/// following call. A token that repeats fails the stream instead of looping.
pub fn referrer_pages<'a>(
    store: &'a dyn ReferrerStore,
    subject: &'a Descriptor,
    artifact_types: &'a [String],
    config: StoreConfiguration,
) -> impl Stream<Item = Result<ListReferrersPage>> + Send + 'a {
    let cursor = PageCursor {
        next: Some(config),
        seen_tokens: HashSet::new(),
    };

    stream::try_unfold(cursor, move |mut cursor| async move {
        let Some(config) = cursor.next.take() else {
            return Ok(None);
        };

        let page = store.list_referrers(subject, artifact_types, &config).await?;
        debug!(
            store = store.name(),
            subject = %subject.digest,
            referrers = page.referrers.len(),
            more = page.next_token().is_some(),
            "listed referrer page"
        );

        if let Some(token) = page.next_token() {
            if !cursor.seen_tokens.insert(token.to_string()) {
                return Err(LIST_REFERRERS_FAILURE
                    .with_detail(format!(
                        "store '{}' returned paging token '{}' twice",
                        store.name(),
                        token
                    ))
                    .with_component_type(ComponentType::ReferrerStore)
                    .with_plugin_name(store.name()));
            }
            cursor.next = Some(config.with_next_token(token));
        }

        Ok(Some((page, cursor)))
    })
}

/// Collect every referrer for `subject` across all pages.
pub async fn list_all_referrers(
    store: &dyn ReferrerStore,
    subject: &Descriptor,
    artifact_types: &[String],
    config: StoreConfiguration,
) -> Result<Vec<Referrer>> {
    referrer_pages(store, subject, artifact_types, config)
        .try_fold(Vec::new(), |mut all, page| async move {
            all.extend(page.referrers);
            Ok(all)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::code::GET_BLOB_CONTENT_FAILURE;
    use futures::StreamExt;

    /// Serves `pages` in order; the token is the index of the next page.
    struct PagedStore {
        pages: Vec<Vec<&'static str>>,
        stuck: bool,
    }

    #[async_trait]
    impl ReferrerStore for PagedStore {
        fn name(&self) -> &str {
            "paged"
        }

        async fn list_referrers(
            &self,
            subject: &Descriptor,
            _artifact_types: &[String],
            config: &StoreConfiguration,
        ) -> Result<ListReferrersPage> {
            let index: usize = config
                .next_token()
                .map(|t| t.parse().unwrap())
                .unwrap_or(0);
            let next_token = if self.stuck {
                Some("1".to_string())
            } else if index + 1 < self.pages.len() {
                Some((index + 1).to_string())
            } else {
                None
            };
            Ok(ListReferrersPage {
                subject: subject.clone(),
                referrers: self.pages[index]
                    .iter()
                    .map(|d| Referrer::new(Descriptor::new("m", *d, 1), "sig"))
                    .collect(),
                next_token,
            })
        }

        async fn get_blob_content(
            &self,
            _artifact: &Descriptor,
            _config: &StoreConfiguration,
        ) -> Result<BlobContent> {
            Err(GET_BLOB_CONTENT_FAILURE.error())
        }

        async fn get_subject_descriptor(
            &self,
            _path: &str,
            _config: &StoreConfiguration,
        ) -> Result<Descriptor> {
            Ok(Descriptor::new("m", "sha256:00", 1))
        }

        async fn get_reference_manifest(
            &self,
            _subject_path: &str,
            referrer: &Descriptor,
            _config: &StoreConfiguration,
        ) -> Result<ReferenceManifest> {
            Ok(ReferenceManifest {
                descriptor: referrer.clone(),
                artifact_type: "sig".into(),
                blobs: Vec::new(),
                subject: None,
                annotations: Default::default(),
            })
        }
    }

    fn subject() -> Descriptor {
        Descriptor::new("m", "sha256:00", 1)
    }

    #[tokio::test]
    async fn test_pages_follow_tokens() {
        let store = PagedStore {
            pages: vec![vec!["a", "b"], vec!["c"], vec!["d"]],
            stuck: false,
        };
        let subject = subject();
        let pages: Vec<_> = referrer_pages(&store, &subject, &[], StoreConfiguration::new())
            .collect()
            .await;
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.is_ok()));

        let all = list_all_referrers(&store, &subject, &[], StoreConfiguration::new())
            .await
            .unwrap();
        let digests: Vec<_> = all.iter().map(Referrer::digest).collect();
        assert_eq!(digests, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_repeated_token_fails() {
        let store = PagedStore {
            pages: vec![vec!["a"], vec!["b"]],
            stuck: true,
        };
        let err = list_all_referrers(&store, &subject(), &[], StoreConfiguration::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), LIST_REFERRERS_FAILURE);
        assert_eq!(err.plugin_name(), Some("paged"));
    }
}
