//! API client facade.
//!
//! [`Client`] offers the same CRUD surface over every Bytebase collection,
//! whichever wire protocol the collection speaks. Messages name their
//! collection through [`ApiMessage`]; the client turns each operation into
//! a [`Call`] and hands it to the shared [`Transport`].
//!
//! Each handler invocation works on a [`Client::scoped`] copy carrying the
//! host's cancellation token. Cancelling it aborts the in-flight request
//! with [`ProviderError::Cancelled`].

pub mod auth;
pub mod transport;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::api::iam::IamPolicy;
use crate::api::State;
use crate::error::ProviderError;
use crate::types::DEFAULT_PAGE_SIZE;

pub use self::transport::{Call, Collection, HttpTransport, Method, Paging, Protocol, Transport};

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// A protocol message that lives in a server collection.
pub trait ApiMessage: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// The collection holding messages of this type.
    fn collection() -> &'static Collection;

    /// Canonical name.
    fn name(&self) -> &str;

    /// Lifecycle state; collections without soft delete are always active.
    fn state(&self) -> State {
        State::Active
    }
}

/// Options of a list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Compiled filter expression.
    pub filter: String,
    /// Include soft-deleted objects.
    pub show_deleted: bool,
    /// Page size; the server may cap it lower.
    pub page_size: i32,
    /// Follow `next_page_token` until exhausted. Otherwise only the first page is returned.
    pub list_all: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            filter: String::new(),
            show_deleted: false,
            page_size: DEFAULT_PAGE_SIZE,
            list_all: true,
        }
    }
}

impl ListOptions {
    /// All pages matching `filter`.
    pub fn filtered(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Default::default()
        }
    }
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<M> {
    /// Items in server order.
    pub items: Vec<M>,
    /// Token for the next page; empty on the last page.
    pub next_page_token: String,
}

/// Authenticated, cancellation-aware client.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
}

impl Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client over a transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cancel: CancellationToken::new(),
        }
    }

    /// Copy of this client whose calls abort when `cancel` fires.
    pub fn scoped(&self, cancel: CancellationToken) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            cancel,
        }
    }

    /// Whether the scope of this client was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Send a raw call.
    pub async fn send(&self, call: Call) -> Result<Value> {
        if self.cancel.is_cancelled() {
            return Err(cancelled(&call));
        }
        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled(&call)),
            result = self.transport.send(&call) => result,
        };
        tracing::debug!(
            method = %call.method,
            collection = call.collection.segment,
            target = %call.target,
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "API call"
        );
        result
    }

    /// Fetch one object.
    pub async fn get<M: ApiMessage>(&self, name: &str) -> Result<M> {
        let value = self.send(Call::new(M::collection(), Method::Get, name)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetch one page.
    pub async fn list_page<M: ApiMessage>(
        &self,
        parent: &str,
        options: &ListOptions,
        page_token: &str,
    ) -> Result<Page<M>> {
        let collection = M::collection();
        let mut call = Call::new(collection, Method::List, parent);
        call.paging = Some(Paging {
            page_size: options.page_size,
            page_token: page_token.to_string(),
            filter: options.filter.clone(),
            show_deleted: options.show_deleted,
        });
        let mut value = self.send(call).await?;
        let items = match value.get_mut(collection.list_field).map(Value::take) {
            Some(Value::Null) | None => Vec::new(),
            Some(items) => serde_json::from_value(items)?,
        };
        let next_page_token = value
            .get("nextPageToken")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Page {
            items,
            next_page_token,
        })
    }

    /// List a collection, following pages when `options.list_all` is set.
    pub async fn list<M: ApiMessage>(&self, parent: &str, options: &ListOptions) -> Result<Vec<M>> {
        let collection = M::collection().segment;
        let start = Instant::now();
        let mut items = Vec::new();
        let mut page_token = String::new();
        let mut pages = 0u32;
        loop {
            let page_start = Instant::now();
            let page = self.list_page::<M>(parent, options, &page_token).await?;
            pages += 1;
            tracing::debug!(
                collection,
                page = pages,
                count = page.items.len(),
                elapsed_ms = page_start.elapsed().as_millis() as u64,
                "listed page"
            );
            items.extend(page.items);
            page_token = page.next_page_token;
            if page_token.is_empty() || !options.list_all {
                break;
            }
        }
        tracing::debug!(
            collection,
            pages,
            total = items.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "listed collection"
        );
        Ok(items)
    }

    /// Create an object under `parent`, with a caller-chosen id when the
    /// collection takes one.
    pub async fn create<M: ApiMessage>(
        &self,
        parent: &str,
        id: Option<&str>,
        message: &M,
    ) -> Result<M> {
        let mut call = Call::new(M::collection(), Method::Create, parent)
            .with_body(serde_json::to_value(message)?);
        call.id = id.map(str::to_string);
        let value = self.send(call).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Apply `mask` to the object named by `message`, upserting when the
    /// collection does. Returns `None` without a call when the mask is empty.
    pub async fn update<M: ApiMessage>(&self, message: &M, mask: &[String]) -> Result<Option<M>> {
        self.update_with(message, mask, M::collection().allow_missing)
            .await
    }

    /// [`Client::update`] with an explicit upsert flag.
    pub async fn update_with<M: ApiMessage>(
        &self,
        message: &M,
        mask: &[String],
        allow_missing: bool,
    ) -> Result<Option<M>> {
        if mask.is_empty() {
            tracing::debug!(name = message.name(), "empty update mask, skipping update");
            return Ok(None);
        }
        let mut call = Call::new(M::collection(), Method::Update, message.name())
            .with_body(serde_json::to_value(message)?);
        call.update_mask = mask.to_vec();
        call.allow_missing = allow_missing;
        let value = self.send(call).await?;
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Delete an object.
    pub async fn delete<M: ApiMessage>(&self, name: &str) -> Result<()> {
        self.send(Call::new(M::collection(), Method::Delete, name))
            .await
            .map(|_| ())
    }

    /// Restore a soft-deleted object.
    pub async fn undelete<M: ApiMessage>(&self, name: &str) -> Result<M> {
        let collection = M::collection();
        if !collection.soft_delete {
            return Err(ProviderError::Unimplemented(format!(
                "{} cannot be undeleted",
                collection.segment
            )));
        }
        let value = self.send(Call::new(collection, Method::Undelete, name)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Read the IAM policy of a workspace or project.
    pub async fn get_iam_policy(&self, resource: &str) -> Result<IamPolicy> {
        let call = Call::new(iam_collection(resource), Method::GetIamPolicy, resource);
        Ok(serde_json::from_value(self.send(call).await?)?)
    }

    /// Overwrite the IAM policy of a workspace or project.
    pub async fn set_iam_policy(&self, resource: &str, policy: &IamPolicy) -> Result<IamPolicy> {
        let call = Call::new(iam_collection(resource), Method::SetIamPolicy, resource)
            .with_body(serde_json::to_value(policy)?);
        Ok(serde_json::from_value(self.send(call).await?)?)
    }
}

fn iam_collection(resource: &str) -> &'static Collection {
    if resource.starts_with(crate::names::PROJECT_PREFIX) {
        crate::api::project::Project::collection()
    } else {
        &crate::api::WORKSPACES
    }
}

fn cancelled(call: &Call) -> ProviderError {
    ProviderError::Cancelled(format!(
        "{} {} aborted",
        call.method,
        if call.target.is_empty() {
            call.collection.segment
        } else {
            call.target.as_str()
        }
    ))
}
