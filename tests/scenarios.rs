//! End-to-end handler scenarios
//!
//! Each test drives the provider through `ProviderTester` against the
//! in-memory server and checks both the resulting state and the calls
//! the server received.

use serde_json::{json, Value};
use terraform_provider_bytebase::api::policy::Policy;
use terraform_provider_bytebase::client::Method;
use terraform_provider_bytebase::filter::condition::{self, IamCondition};
use terraform_provider_bytebase::filter::{Filter, Label};
use terraform_provider_bytebase::mapper::hash::sha256_hex;
use terraform_provider_bytebase::BytebaseProvider;
use terraform_provider_bytebase::testing::{
    assert_error_contains, assert_no_errors, assert_warning_contains, FakeBytebase, ProviderTester,
};
use tokio_test::{assert_err, assert_ok};

mod project {
    use super::*;

    #[tokio::test]
    async fn test_create_then_read() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);

        let state = tester
            .lifecycle_create(
                "bytebase_project",
                json!({
                    "resource_id": "acme",
                    "title": "Acme",
                    "workflow": "UI",
                    "schema_version": "SCHEMA_VERSION_SEMANTIC",
                    "schema_change": "DDL"
                }),
            )
            .await
            .unwrap();

        assert_eq!(state["id"], "projects/acme");
        assert_eq!(state["title"], "Acme");
        assert_eq!(state["schema_version"], "SCHEMA_VERSION_SEMANTIC");
        assert_eq!(fake.calls_of(Method::Create).len(), 1);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);
        let config = json!({"resource_id": "acme", "title": "Acme", "workflow": "UI"});

        let first = tester.create("bytebase_project", config.clone()).await.unwrap();
        let second = tester.create("bytebase_project", config).await.unwrap();

        assert_eq!(first.state, second.state);
        assert_warning_contains(&second.diagnostics, "already exists");
        assert_eq!(fake.calls_of(Method::Create).len(), 1);
        assert!(fake.calls_of(Method::Update).is_empty());
    }

    #[tokio::test]
    async fn test_soft_deleted_project_is_undeleted_then_updated() {
        let fake = FakeBytebase::new();
        fake.insert(
            "projects",
            json!({
                "name": "projects/acme",
                "title": "Old title",
                "state": "DELETED",
                "visibility": "VISIBILITY_PRIVATE",
                "schemaVersion": "SCHEMA_VERSION_SEMANTIC"
            }),
        );
        let tester = ProviderTester::bytebase(&fake);

        let outcome = tester
            .create(
                "bytebase_project",
                json!({
                    "resource_id": "acme",
                    "title": "Acme",
                    "schema_version": "SCHEMA_VERSION_SEMANTIC"
                }),
            )
            .await
            .unwrap();

        assert_eq!(outcome.id(), Some("projects/acme"));
        assert_warning_contains(&outcome.diagnostics, "soft-deleted");

        let mutations: Vec<Method> = fake
            .calls()
            .iter()
            .map(|c| c.method)
            .filter(|m| matches!(m, Method::Undelete | Method::Update))
            .collect();
        assert_eq!(mutations, vec![Method::Undelete, Method::Update]);

        let update = &fake.calls_of(Method::Update)[0];
        assert_eq!(update.update_mask, vec!["title".to_string()]);
        let stored = fake.object("projects", "projects/acme").unwrap();
        assert_eq!(stored["state"], "ACTIVE");
        assert_eq!(stored["title"], "Acme");
    }

    #[tokio::test]
    async fn test_immutable_change_is_rejected_before_any_call() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);
        let prior = json!({
            "id": "projects/acme",
            "resource_id": "acme",
            "title": "Acme",
            "schema_version": "SCHEMA_VERSION_SEMANTIC"
        });
        let err = tester
            .update(
                "bytebase_project",
                prior,
                json!({"resource_id": "acme", "title": "Acme", "schema_version": "SCHEMA_VERSION_TIMESTAMP"}),
            )
            .await
            .unwrap_err();
        assert_error_contains(err.diagnostics(), "schema_version");
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_clears_deleted_project() {
        let fake = FakeBytebase::new();
        fake.insert("projects", json!({"name": "projects/gone", "state": "DELETED"}));
        let tester = ProviderTester::bytebase(&fake);
        let outcome = tester
            .read("bytebase_project", json!({"id": "projects/gone", "resource_id": "gone"}))
            .await
            .unwrap();
        assert!(outcome.state.is_none());
    }

    #[tokio::test]
    async fn test_import() {
        let fake = FakeBytebase::new();
        fake.insert("projects", json!({"name": "projects/acme", "title": "Acme", "state": "ACTIVE"}));
        let tester = ProviderTester::bytebase(&fake);

        let imported = assert_ok!(tester.import_resource("bytebase_project", "projects/acme").await);
        assert_eq!(imported.state.unwrap()["resource_id"], "acme");
        assert_err!(tester.import_resource("bytebase_project", "projects/none").await);
    }
}

/// Create, refresh, then apply the same configuration again. Returns the
/// refreshed state and the number of updates issued by the create.
async fn apply_twice(
    tester: &ProviderTester<BytebaseProvider>,
    fake: &FakeBytebase,
    resource: &str,
    config: Value,
) -> (Value, usize) {
    let created = tester.create(resource, config.clone()).await.unwrap();
    assert_no_errors(&created.diagnostics);
    let baseline = fake.calls_of(Method::Update).len();

    let refreshed = tester.read(resource, created.state.unwrap()).await.unwrap();
    let state = refreshed.state.unwrap();
    let reapplied = tester.update(resource, state.clone(), config).await.unwrap();
    assert_no_errors(&reapplied.diagnostics);
    assert_eq!(reapplied.state.unwrap(), state);
    (state, baseline)
}

mod user {
    use super::*;

    #[tokio::test]
    async fn test_unchanged_config_issues_no_update() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);
        let config = json!({"email": "a@example.com", "title": "A", "password": "secret"});

        let (state, baseline) = apply_twice(&tester, &fake, "bytebase_user", config).await;

        assert_eq!(state["password"], sha256_hex("secret"));
        assert_eq!(fake.calls_of(Method::Update).len(), baseline);
    }

    #[tokio::test]
    async fn test_password_change_updates_password_only() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);
        let (state, _) = apply_twice(
            &tester,
            &fake,
            "bytebase_user",
            json!({"email": "a@example.com", "title": "A", "password": "secret"}),
        )
        .await;

        let outcome = tester
            .update(
                "bytebase_user",
                state,
                json!({"email": "a@example.com", "title": "A", "password": "rotated"}),
            )
            .await
            .unwrap();

        let updates = fake.calls_of(Method::Update);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_mask, vec!["password".to_string()]);
        assert_eq!(outcome.state.unwrap()["password"], sha256_hex("rotated"));
    }
}

mod instance {
    use super::*;

    fn config(password: &str, use_ssl: bool) -> Value {
        json!({
            "resource_id": "prod",
            "title": "Prod",
            "engine": "POSTGRES",
            "environment": "environments/prod",
            "data_sources": [{
                "id": "admin",
                "type": "ADMIN",
                "host": "db.internal",
                "port": "5432",
                "password": password,
                "use_ssl": use_ssl
            }]
        })
    }

    #[tokio::test]
    async fn test_unchanged_config_issues_no_update() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);

        let (state, baseline) = apply_twice(&tester, &fake, "bytebase_instance", config("pw1", false)).await;

        assert_eq!(state["data_sources"][0]["password"], "pw1");
        assert_eq!(fake.calls_of(Method::Update).len(), baseline);
    }

    #[tokio::test]
    async fn test_data_source_secret_change_is_applied() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);
        let (state, baseline) = apply_twice(&tester, &fake, "bytebase_instance", config("pw1", false)).await;

        let outcome = tester.update("bytebase_instance", state, config("pw2", true)).await.unwrap();
        assert_no_errors(&outcome.diagnostics);

        let updates = fake.calls_of(Method::Update);
        assert_eq!(updates.len(), baseline + 1);
        assert_eq!(updates[baseline].update_mask, vec!["data_sources".to_string()]);
        let stored = fake.object("instances", "instances/prod").unwrap();
        assert_eq!(stored["dataSources"][0]["password"], "pw2");
        assert_eq!(stored["dataSources"][0]["useSsl"], true);

        let state = outcome.state.unwrap();
        assert_eq!(state["data_sources"][0]["password"], "pw2");
        assert_eq!(state["data_sources"][0]["use_ssl"], true);
    }
}

mod policy {
    use super::*;

    fn config(disallow_ddl: bool) -> Value {
        json!({
            "parent": "projects/p1",
            "type": "DATA_SOURCE_QUERY",
            "data_source_query_policy": [{"restriction": "DISALLOW", "disallow_ddl": disallow_ddl}]
        })
    }

    #[tokio::test]
    async fn test_unchanged_config_issues_no_update() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);

        let (state, baseline) = apply_twice(&tester, &fake, "bytebase_policy", config(true)).await;

        assert_eq!(state["id"], "projects/p1/policies/data_source_query");
        assert_eq!(state["data_source_query_policy"][0]["disallow_dml"], false);
        assert_eq!(state["tag_policy"], json!([]));
        assert_eq!(fake.calls_of(Method::Update).len(), baseline);
    }

    #[tokio::test]
    async fn test_payload_change_is_applied() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);
        let (state, baseline) = apply_twice(&tester, &fake, "bytebase_policy", config(true)).await;

        let outcome = tester.update("bytebase_policy", state, config(false)).await.unwrap();

        assert_eq!(fake.calls_of(Method::Update).len(), baseline + 1);
        assert_eq!(
            outcome.state.unwrap()["data_source_query_policy"][0]["disallow_ddl"],
            false
        );
    }
}

mod compilers {
    use super::*;

    #[test]
    fn test_database_filter() {
        let filter = Filter {
            project: Some("projects/p".to_string()),
            engines: vec!["POSTGRES".to_string(), "MYSQL".to_string()],
            labels: vec![Label::new("env", "prod"), Label::new("env", "stg")],
            ..Default::default()
        };
        assert_eq!(
            filter.compile(),
            r#"project == "projects/p" && engine in ["POSTGRES", "MYSQL"] && label == "env:prod,stg""#
        );
    }

    #[test]
    fn test_iam_condition_round_trip() {
        let block = IamCondition {
            database: Some("instances/i/databases/d".to_string()),
            tables: vec!["t1".to_string(), "t2".to_string()],
            row_limit: Some(100),
            expire_timestamp: Some("2030-01-02T03:04:05Z".to_string()),
            ..Default::default()
        };
        let compiled = block.compile();
        assert_eq!(
            compiled,
            r#"resource.database == "instances/i/databases/d" && resource.table in ["t1","t2"] && request.row_limit <= 100 && request.time < timestamp("2030-01-02T03:04:05Z")"#
        );
        let parsed = condition::parse(&compiled);
        assert!(parsed.is_exact());
        assert_eq!(parsed.condition, block);
    }
}

mod role {
    use super::*;

    #[tokio::test]
    async fn test_permission_prefix_checked_before_any_call() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);

        let err = tester
            .create(
                "bytebase_role",
                json!({
                    "resource_id": "auditor",
                    "title": "Auditor",
                    "permissions": ["bb.issue.create", "oops"]
                }),
            )
            .await
            .unwrap_err();

        assert_error_contains(err.diagnostics(), "bb.");
        assert_error_contains(err.diagnostics(), "oops");
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_crud() {
        let fake = FakeBytebase::new();
        let tester = ProviderTester::bytebase(&fake);

        let updated = tester
            .lifecycle_crud(
                "bytebase_role",
                json!({"resource_id": "auditor", "title": "Auditor", "permissions": ["bb.issues.get"]}),
                json!({
                    "resource_id": "auditor",
                    "title": "Auditor",
                    "permissions": ["bb.issues.get", "bb.databases.list"]
                }),
            )
            .await
            .unwrap();

        assert_eq!(updated["permissions"], json!(["bb.databases.list", "bb.issues.get"]));
        assert!(fake.object("roles", "roles/auditor").is_none());
    }
}

mod review_config {
    use super::*;

    fn rules() -> Value {
        json!([{
            "type": "naming.table",
            "level": "WARNING",
            "engine": "MYSQL",
            "payload": "",
            "comment": ""
        }])
    }

    fn state(resources: &[&str]) -> Value {
        json!({
            "id": "reviewConfigs/basic",
            "resource_id": "basic",
            "title": "Basic",
            "enabled": true,
            "rules": rules(),
            "resources": resources
        })
    }

    #[tokio::test]
    async fn test_attachment_diff() {
        let fake = FakeBytebase::new();
        fake.insert(
            "reviewConfigs",
            json!({
                "name": "reviewConfigs/basic",
                "title": "Basic",
                "enabled": true,
                "rules": [{"type": "naming.table", "level": "WARNING", "engine": "MYSQL"}]
            }),
        );
        for target in ["environments/test", "projects/p1"] {
            fake.insert(
                "policies",
                serde_json::to_value(Policy::review_config_tag(target, "reviewConfigs/basic")).unwrap(),
            );
        }
        let tester = ProviderTester::bytebase(&fake);

        let mut desired = state(&["projects/p1", "projects/p2"]);
        desired.as_object_mut().unwrap().remove("id");
        let outcome = tester
            .update(
                "bytebase_review_config",
                state(&["environments/test", "projects/p1"]),
                desired,
            )
            .await
            .unwrap();
        assert_no_errors(&outcome.diagnostics);

        let deletes = fake.calls_of(Method::Delete);
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].target, "environments/test/policies/tag");
        let updates = fake.calls_of(Method::Update);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].target, "projects/p2/policies/tag");
        assert!(!fake.calls().iter().any(|c| c.target.starts_with("projects/p1/")));

        assert_eq!(
            outcome.state.unwrap()["resources"],
            json!(["projects/p1", "projects/p2"])
        );
    }
}

mod data_sources {
    use super::*;

    #[tokio::test]
    async fn test_projects_list() {
        let fake = FakeBytebase::new().with_page_size(1);
        for id in ["a", "b", "c"] {
            fake.insert(
                "projects",
                json!({"name": format!("projects/{}", id), "title": id, "state": "ACTIVE"}),
            );
        }
        fake.insert("projects", json!({"name": "projects/old", "state": "DELETED"}));
        let tester = ProviderTester::bytebase(&fake);

        let state = tester.read_data_source("bytebase_projects", json!({})).await.unwrap();
        let names: Vec<&str> = state["projects"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["projects/a", "projects/b", "projects/c"]);
        assert_eq!(fake.calls_of(Method::List).len(), 3);
        assert!(state["id"].as_str().unwrap().parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn test_unknown_data_source() {
        let tester = ProviderTester::bytebase(&FakeBytebase::new());
        let err = tester.read_data_source("bytebase_nothing", json!({})).await.unwrap_err();
        assert_error_contains(err.diagnostics(), "bytebase_nothing");
    }
}
