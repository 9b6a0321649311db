//! Link-following pagination over JSON:API collections.
//!
//! [`fetch_all`] hides pagination from callers: it follows `links.next` until
//! the directory stops sending one and returns every item in page order.
//! Nothing is deduplicated. If the collection changes while it is being
//! walked, overlapping pages show up as duplicates.

use log::debug;
use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::error::{DirectoryError, DirectoryResult};
use crate::model::Page;
use crate::transport::{DirectoryTransport, REST_API_ROOT, is_under_rest_root};

/// Resolve a `next` link against the API root.
///
/// The directory returns next links relative to `/rest`. A link that already
/// carries the root is used as is.
pub fn next_path(link: &str) -> String {
    if is_under_rest_root(link) {
        link.to_string()
    } else {
        format!("{REST_API_ROOT}{link}")
    }
}

/// Decode a response body, naming the request path on failure.
pub fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> DirectoryResult<T> {
    serde_json::from_slice(body).map_err(|source| DirectoryError::Decode {
        path: path.to_string(),
        source,
    })
}

/// Fetch every page of the collection at `initial_path`.
///
/// Stateless: each call starts over from `initial_path`. All pages are held in
/// memory before returning.
pub async fn fetch_all<T, D>(transport: &D, initial_path: &str) -> DirectoryResult<Vec<T>>
where
    T: DeserializeOwned,
    D: DirectoryTransport + ?Sized,
{
    let mut items = Vec::new();
    let mut path = initial_path.to_string();
    let mut pages = 0usize;

    loop {
        let response = transport.send(Method::GET, &path, None).await?;
        let page: Page<T> = decode(&path, &response.body)?;
        pages += 1;

        let next = page.next_link().map(next_path);
        items.extend(page.data);

        match next {
            Some(next) => path = next,
            None => break,
        }
    }

    debug!(
        "fetched {} items in {} pages from {}",
        items.len(),
        pages,
        initial_path
    );
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Identity, SsoConnection};
    use crate::transport::InMemoryDirectory;

    #[test]
    fn test_next_path_prefixing() {
        assert_eq!(
            next_path("/groups/g1/memberships?starting_after=abc"),
            "/rest/groups/g1/memberships?starting_after=abc"
        );
        assert_eq!(next_path("/rest/groups/g1/users"), "/rest/groups/g1/users");
        assert_eq!(next_path("/restaurants"), "/rest/restaurants");
    }

    #[tokio::test]
    async fn test_fetch_all_follows_links_in_order() {
        let directory = InMemoryDirectory::new().with_page_size(3);
        directory
            .add_sso_connection(
                "g1",
                SsoConnection {
                    id: "c1".to_string(),
                    name: None,
                },
            )
            .await;
        for n in 0..7 {
            directory.add_identity("g1", Identity::new(format!("u{n}"))).await;
        }

        let identities: Vec<Identity> =
            fetch_all(&directory, "/rest/groups/g1/sso_connections/c1/users")
                .await
                .unwrap();

        let ids: Vec<&str> = identities.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["u0", "u1", "u2", "u3", "u4", "u5", "u6"]);
        assert_eq!(directory.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_empty_collection() {
        let directory = InMemoryDirectory::new();
        directory
            .add_sso_connection(
                "g1",
                SsoConnection {
                    id: "c1".to_string(),
                    name: None,
                },
            )
            .await;

        let identities: Vec<Identity> =
            fetch_all(&directory, "/rest/groups/g1/sso_connections/c1/users")
                .await
                .unwrap();
        assert!(identities.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_propagates_transport_errors() {
        let directory = InMemoryDirectory::new();
        let result: DirectoryResult<Vec<Identity>> =
            fetch_all(&directory, "/rest/groups/missing/sso_connections/c1/users").await;
        let err = result.unwrap_err();
        assert!(matches!(err, DirectoryError::Transport(ref e) if e.status() == Some(404)));
    }
}
