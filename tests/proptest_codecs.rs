//! Property-based tests using proptest
//!
//! These tests check the invariants of the name codec, the filter and
//! condition compilers, set hashing and field-mask computation over
//! randomized inputs.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use terraform_provider_bytebase::data::ResourceData;
use terraform_provider_bytebase::filter::condition::{self, IamCondition};
use terraform_provider_bytebase::filter::masking::ExceptionCondition;
use terraform_provider_bytebase::filter::{Filter, Label, QueryFields, StateFilter};
use terraform_provider_bytebase::mapper::hash::{canonical_expression, iam_binding_hash};
use terraform_provider_bytebase::mapper::mask::field_mask;
use terraform_provider_bytebase::names;
use terraform_provider_bytebase::{BytebaseProvider, ProviderService};

/// Valid resource ids
fn arb_id() -> impl Strategy<Value = String> {
    "[a-z]([a-z0-9-]{0,20}[a-z0-9])?"
}

/// Literal values, including quotes, backslashes and ampersands
fn arb_literal() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./ ,&\"\\\\-]{1,16}"
}

fn arb_timestamp() -> impl Strategy<Value = String> {
    "20[3-9][0-9]-(0[1-9]|1[0-2])-(0[1-9]|1[0-9]|2[0-8])T([01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9]Z"
}

fn arb_iam_condition() -> impl Strategy<Value = IamCondition> {
    (
        proptest::option::of(arb_literal()),
        proptest::option::of(arb_literal()),
        prop::collection::vec(arb_literal(), 0..4),
        proptest::option::of(0i64..1_000_000),
        proptest::option::of(arb_timestamp()),
    )
        .prop_map(|(database, schema, tables, row_limit, expire_timestamp)| IamCondition {
            database,
            schema,
            tables,
            row_limit,
            expire_timestamp,
        })
}

fn arb_word() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn arb_filter() -> impl Strategy<Value = Filter> {
    (
        proptest::option::of(arb_word()),
        prop_oneof![
            Just(QueryFields::Name),
            Just(QueryFields::TitleOrEmail),
            Just(QueryFields::NameOrEmail)
        ],
        proptest::option::of(arb_id().prop_map(|id| format!("projects/{}", id))),
        proptest::option::of(arb_id().prop_map(|id| format!("environments/{}", id))),
        prop::collection::vec(prop_oneof!["MYSQL", "POSTGRES", "TIDB"].prop_map(String::from), 0..3),
        prop::collection::vec((arb_word(), arb_word()), 0..4),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(query, query_fields, project, environment, engines, labels, exclude, deleted)| Filter {
                query,
                query_fields,
                project,
                environment,
                engines,
                labels: labels.into_iter().map(|(k, v)| Label::new(k, v)).collect(),
                exclude_unassigned: exclude,
                state: if deleted {
                    StateFilter::Deleted
                } else {
                    StateFilter::Active
                },
                ..Default::default()
            },
        )
}

proptest! {
    /// Formatting then parsing a name yields the original ids
    #[test]
    fn name_round_trip(instance in arb_id(), database in arb_id()) {
        let name = names::format(&[("instances", &instance), ("databases", &database)]);
        let ids = names::parse(&name, &["instances", "databases"]).unwrap();
        prop_assert_eq!(ids, vec![instance.as_str(), database.as_str()]);
        prop_assert!(names::parse(&name, &["instances"]).is_err());
        prop_assert!(names::parse(&name, &["projects", "databases"]).is_err());
    }

    /// Every generated id passes the id grammar; upper case never does
    #[test]
    fn resource_id_grammar(id in arb_id()) {
        prop_assert!(names::validate_resource_id(&id).is_ok());
        let upper = id.to_uppercase();
        prop_assert!(names::validate_resource_id(&upper).is_err());
    }

    /// Compilation is deterministic with one clause per populated field
    #[test]
    fn filter_is_deterministic(filter in arb_filter()) {
        let compiled = filter.compile();
        prop_assert_eq!(&compiled, &filter.clone().compile());

        let mut label_keys: Vec<&str> = filter.labels.iter().map(|l| l.key.as_str()).collect();
        label_keys.sort_unstable();
        label_keys.dedup();
        let expected = usize::from(filter.query.is_some())
            + usize::from(filter.project.is_some())
            + usize::from(filter.environment.is_some())
            + usize::from(!filter.engines.is_empty())
            + label_keys.len()
            + usize::from(filter.exclude_unassigned)
            + usize::from(filter.state == StateFilter::Deleted);
        let clauses = if compiled.is_empty() { 0 } else { compiled.split(" && ").count() };
        prop_assert_eq!(clauses, expected);
        prop_assert_eq!(filter.show_deleted(), compiled.contains("state == \"DELETED\""));
    }

    /// Structured IAM conditions survive compile then parse
    #[test]
    fn iam_condition_round_trip(original in arb_iam_condition()) {
        let parsed = condition::parse(&original.compile());
        prop_assert!(parsed.is_exact(), "unrecognized: {:?}", parsed.unrecognized);
        prop_assert_eq!(parsed.condition, original);
    }

    /// Masking exception conditions survive compile then parse
    #[test]
    fn exception_condition_round_trip(
        instance in proptest::option::of(arb_id()),
        database in proptest::option::of(arb_literal()),
        column in proptest::option::of(arb_literal()),
        expire in proptest::option::of(arb_timestamp()),
    ) {
        let original = ExceptionCondition {
            instance_id: instance,
            database_name: database,
            column_name: column,
            expire_timestamp: expire,
            ..Default::default()
        };
        prop_assert_eq!(ExceptionCondition::parse(&original.compile()), original);
    }

    /// Binding identity ignores member order and duplicates and spacing around `&&`
    #[test]
    fn binding_hash_is_order_insensitive(
        members in prop::collection::vec("user:[a-z]{1,5}@x\\.com", 1..6),
        condition in arb_iam_condition(),
    ) {
        let expression = condition.compile();
        let mut shuffled = members.clone();
        shuffled.reverse();
        shuffled.push(members[0].clone());
        let loose = expression.replace(" && ", "   &&  ");
        prop_assert_eq!(
            iam_binding_hash("roles/projectQuerier", &members, &expression),
            iam_binding_hash("roles/projectQuerier", &shuffled, &loose)
        );
        prop_assert_eq!(canonical_expression(&loose), expression);
    }

    /// The field mask only names declared update paths, without duplicates,
    /// and names `title` exactly when the title changed
    #[test]
    fn field_mask_is_subset_of_update_paths(
        prior_title in arb_word(),
        title in arb_word(),
        prior_key in proptest::option::of(arb_word()),
        key in proptest::option::of(arb_word()),
    ) {
        let schema = BytebaseProvider::new().schema().resources.remove("bytebase_project").unwrap();
        let declared: Vec<String> = schema
            .block
            .attributes
            .values()
            .filter_map(|a| a.update_path.clone())
            .chain(schema.block.blocks.values().filter_map(|b| b.update_path.clone()))
            .collect();

        let prior = json!({"id": "projects/p", "resource_id": "p", "title": prior_title, "key": prior_key});
        let desired = json!({"resource_id": "p", "title": title, "key": key});
        let data = ResourceData::new(Arc::new(schema), Some(prior), desired);
        let mask = field_mask(&data);

        for path in &mask {
            prop_assert!(declared.contains(path), "{} is not declared", path);
        }
        let unique: HashSet<&String> = mask.iter().collect();
        prop_assert_eq!(unique.len(), mask.len());
        prop_assert_eq!(mask.contains(&"title".to_string()), prior_title != title);
    }
}
