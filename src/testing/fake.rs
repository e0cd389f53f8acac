//! In-memory Bytebase.
//!
//! [`FakeBytebase`] implements [`Transport`] over a map of collections so
//! handlers can be exercised without a server. It keeps what the handlers
//! depend on:
//!
//! - names built from parent, collection segment and id
//! - soft delete and undelete for soft-deletable collections
//! - field-masked updates and `allow_missing` upserts
//! - paging with `nextPageToken`, hiding soft-deleted objects unless asked
//! - IAM policies of the workspace and of existing projects
//! - review-config attachments derived from TAG policies
//!
//! List filters are recorded but not evaluated. Every call is recorded
//! for assertions.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::api::policy::REVIEW_CONFIG_TAG;
use crate::api::user::SERVICE_ACCOUNT;
use crate::client::transport::camel_case;
use crate::client::{Call, Client, Method, Transport};
use crate::error::ProviderError;
use crate::names::{PROJECT_PREFIX, WORKSPACE_NAME};

#[derive(Debug, Default)]
struct Store {
    collections: BTreeMap<String, Vec<Value>>,
    iam: BTreeMap<String, Value>,
    calls: Vec<Call>,
    serial: u64,
}

impl Store {
    fn next_serial(&mut self) -> u64 {
        self.serial += 1;
        self.serial
    }

    fn items(&self, segment: &str) -> &[Value] {
        self.collections.get(segment).map(Vec::as_slice).unwrap_or_default()
    }

    fn find(&self, segment: &str, name: &str) -> Option<&Value> {
        self.items(segment).iter().find(|item| name_of(item) == name)
    }

    fn find_mut(&mut self, segment: &str, name: &str) -> Option<&mut Value> {
        self.collections
            .get_mut(segment)?
            .iter_mut()
            .find(|item| name_of(item) == name)
    }
}

/// An in-memory server.
#[derive(Debug, Clone)]
pub struct FakeBytebase {
    store: Arc<Mutex<Store>>,
    page_size: usize,
}

impl Default for FakeBytebase {
    fn default() -> Self {
        Self::new()
    }
}

fn name_of(item: &Value) -> &str {
    item.get("name").and_then(Value::as_str).unwrap_or_default()
}

fn is_deleted(item: &Value) -> bool {
    item.get("state").and_then(Value::as_str) == Some("DELETED")
}

/// Parent of `name` in the collection `segment`; empty for top-level names.
fn parent_of<'a>(name: &'a str, segment: &str) -> &'a str {
    let marker = format!("/{}/", segment);
    match name.rfind(&marker) {
        Some(index) => &name[..index],
        None => "",
    }
}

fn not_found(name: &str) -> ProviderError {
    ProviderError::NotFound(format!("{} not found", name))
}

impl FakeBytebase {
    /// An empty server.
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            page_size: usize::MAX,
        }
    }

    /// Cap every page at `page_size` items.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        match self.store.lock() {
            Ok(store) => store,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Seed an object into the collection `segment`, replacing any object
    /// of the same name.
    pub fn insert(&self, segment: &str, object: Value) {
        let mut store = self.lock();
        let name = name_of(&object).to_string();
        let items = store.collections.entry(segment.to_string()).or_default();
        items.retain(|item| name_of(item) != name);
        items.push(object);
    }

    /// The stored object, as the server holds it.
    pub fn object(&self, segment: &str, name: &str) -> Option<Value> {
        self.lock().find(segment, name).cloned()
    }

    /// A client over this server.
    pub fn client(&self) -> Client {
        Client::new(Arc::new(self.clone()))
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls of one method.
    pub fn calls_of(&self, method: Method) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    fn get(&self, store: &Store, call: &Call) -> Result<Value, ProviderError> {
        let segment = call.collection.segment;
        let object = store
            .find(segment, &call.target)
            .cloned()
            .ok_or_else(|| not_found(&call.target))?;
        Ok(decorate(store, segment, object))
    }

    fn list(&self, store: &Store, call: &Call) -> Result<Value, ProviderError> {
        let segment = call.collection.segment;
        let paging = call.paging.clone().unwrap_or_default();
        let matching: Vec<Value> = store
            .items(segment)
            .iter()
            .filter(|item| call.target == WORKSPACE_NAME || parent_of(name_of(item), segment) == call.target)
            .filter(|item| paging.show_deleted || !is_deleted(item))
            .cloned()
            .collect();

        let offset: usize = paging.page_token.parse().unwrap_or_default();
        let requested = usize::try_from(paging.page_size).unwrap_or(usize::MAX).max(1);
        let size = requested.min(self.page_size);
        let end = offset.saturating_add(size).min(matching.len());
        let page: Vec<Value> = matching[offset.min(end)..end]
            .iter()
            .cloned()
            .map(|item| decorate(store, segment, item))
            .collect();
        let next = if end < matching.len() {
            end.to_string()
        } else {
            String::new()
        };
        let mut response = Map::new();
        response.insert(call.collection.list_field.to_string(), Value::Array(page));
        response.insert("nextPageToken".to_string(), Value::String(next));
        Ok(Value::Object(response))
    }

    fn create(&self, store: &mut Store, call: &Call) -> Result<Value, ProviderError> {
        let segment = call.collection.segment;
        let mut object = call.body.clone().unwrap_or_else(|| json!({}));
        let name = match (&call.id, name_of(&object)) {
            (Some(id), _) if call.target.is_empty() => format!("{}/{}", segment, id),
            (Some(id), _) => format!("{}/{}/{}", call.target, segment, id),
            (None, name) if !name.is_empty() => name.to_string(),
            (None, _) => {
                let serial = store.next_serial();
                if call.target.is_empty() {
                    format!("{}/{}", segment, serial)
                } else {
                    format!("{}/{}/{}", call.target, segment, serial)
                }
            },
        };
        if store.find(segment, &name).is_some() {
            return Err(ProviderError::AlreadyExists(format!("{} already exists", name)));
        }
        object["name"] = Value::String(name);
        if call.collection.soft_delete {
            object["state"] = json!("ACTIVE");
        }
        let secret = object.get("userType").and_then(Value::as_str) == Some(SERVICE_ACCOUNT);
        let stored = stored_form(object);
        store
            .collections
            .entry(segment.to_string())
            .or_default()
            .push(stored.clone());

        let mut response = decorate(store, segment, stored);
        if secret {
            response["serviceKey"] = Value::String(format!("bbs_{}", store.next_serial()));
        }
        Ok(response)
    }

    fn update(&self, store: &mut Store, call: &Call) -> Result<Value, ProviderError> {
        let segment = call.collection.segment;
        let body = call.body.clone().unwrap_or_else(|| json!({}));
        let Some(existing) = store.find_mut(segment, &call.target) else {
            if !call.allow_missing {
                return Err(not_found(&call.target));
            }
            let mut object = body;
            object["name"] = Value::String(call.target.clone());
            if call.collection.soft_delete {
                object["state"] = json!("ACTIVE");
            }
            let stored = stored_form(object);
            store
                .collections
                .entry(segment.to_string())
                .or_default()
                .push(stored.clone());
            return Ok(decorate(store, segment, stored));
        };

        if call.collection.field_mask {
            for path in &call.update_mask {
                let top = camel_case(path.split('.').next().unwrap_or_default());
                match body.get(&top) {
                    Some(value) => existing[top.as_str()] = value.clone(),
                    None => {
                        if let Value::Object(map) = existing {
                            map.remove(&top);
                        }
                    },
                }
            }
        } else {
            let name = call.target.clone();
            let state = existing.get("state").cloned();
            *existing = body;
            existing["name"] = Value::String(name);
            if let Some(state) = state {
                existing["state"] = state;
            }
        }
        let stored = stored_form(existing.clone());
        *existing = stored.clone();
        Ok(decorate(store, segment, stored))
    }

    fn delete(&self, store: &mut Store, call: &Call) -> Result<Value, ProviderError> {
        let segment = call.collection.segment;
        if call.collection.soft_delete {
            let object = store
                .find_mut(segment, &call.target)
                .filter(|item| !is_deleted(item))
                .ok_or_else(|| not_found(&call.target))?;
            object["state"] = json!("DELETED");
            return Ok(json!({}));
        }
        let items = store.collections.entry(segment.to_string()).or_default();
        let before = items.len();
        items.retain(|item| name_of(item) != call.target);
        if items.len() == before {
            return Err(not_found(&call.target));
        }
        Ok(json!({}))
    }

    fn undelete(&self, store: &mut Store, call: &Call) -> Result<Value, ProviderError> {
        let segment = call.collection.segment;
        let object = store
            .find_mut(segment, &call.target)
            .ok_or_else(|| not_found(&call.target))?;
        if !is_deleted(object) {
            return Err(ProviderError::FailedPrecondition(format!(
                "{} is not deleted",
                call.target
            )));
        }
        object["state"] = json!("ACTIVE");
        let object = object.clone();
        Ok(decorate(store, segment, object))
    }

    fn check_iam_target(&self, store: &Store, target: &str) -> Result<(), ProviderError> {
        let exists = target == WORKSPACE_NAME
            || (target.starts_with(PROJECT_PREFIX)
                && store.find("projects", target).is_some_and(|p| !is_deleted(p)));
        if exists {
            Ok(())
        } else {
            Err(not_found(target))
        }
    }

    fn get_iam_policy(&self, store: &Store, call: &Call) -> Result<Value, ProviderError> {
        self.check_iam_target(store, &call.target)?;
        Ok(store
            .iam
            .get(&call.target)
            .cloned()
            .unwrap_or_else(|| json!({"bindings": []})))
    }

    fn set_iam_policy(&self, store: &mut Store, call: &Call) -> Result<Value, ProviderError> {
        self.check_iam_target(store, &call.target)?;
        let mut policy = call.body.clone().unwrap_or_else(|| json!({"bindings": []}));
        policy["etag"] = Value::String(format!("etag-{}", store.next_serial()));
        store.iam.insert(call.target.clone(), policy.clone());
        Ok(policy)
    }
}

/// What the server keeps of a written object: secrets are dropped.
fn stored_form(mut object: Value) -> Value {
    if let Value::Object(map) = &mut object {
        map.remove("password");
        map.remove("serviceKey");
    }
    object
}

/// Add server-derived fields to a response.
fn decorate(store: &Store, segment: &str, mut object: Value) -> Value {
    if segment == "reviewConfigs" {
        let name = name_of(&object).to_string();
        let mut resources: Vec<String> = store
            .items("policies")
            .iter()
            .filter(|policy| {
                policy
                    .pointer("/tagPolicy/tags")
                    .and_then(|tags| tags.get(REVIEW_CONFIG_TAG))
                    .and_then(Value::as_str)
                    == Some(name.as_str())
            })
            .map(|policy| parent_of(name_of(policy), "policies").to_string())
            .collect();
        resources.sort();
        if let Value::Object(map) = &mut object {
            map.insert("resources".to_string(), json!(resources));
        }
    }
    object
}

#[async_trait]
impl Transport for FakeBytebase {
    async fn send(&self, call: &Call) -> Result<Value, ProviderError> {
        let mut store = self.lock();
        store.calls.push(call.clone());
        match call.method {
            Method::Get => self.get(&store, call),
            Method::List => self.list(&store, call),
            Method::Create => self.create(&mut store, call),
            Method::Update => self.update(&mut store, call),
            Method::Delete => self.delete(&mut store, call),
            Method::Undelete => self.undelete(&mut store, call),
            Method::GetIamPolicy => self.get_iam_policy(&store, call),
            Method::SetIamPolicy => self.set_iam_policy(&mut store, call),
        }
    }
}
