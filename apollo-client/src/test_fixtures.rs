//! Star Wars operations shared by the tests.

use std::sync::Arc;

use serde_json_bytes::json;

use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::spec::CacheKeyInfo;
use crate::spec::Field;
use crate::spec::FieldType;
use crate::spec::Fragment;
use crate::spec::InputValue;
use crate::spec::Operation;
use crate::spec::Schema;
use crate::spec::Selection;
use crate::spec::SelectionSet;

pub(crate) fn schema() -> Schema {
    Schema::new()
        .with_possible_types("Character", ["Human", "Droid"])
        .with_cache_key_resolver(|typename, object| {
            object
                .get("id")
                .and_then(|id| id.as_str())
                .map(|id| match typename {
                    "Human" | "Droid" | "Character" => {
                        CacheKeyInfo::new(id).with_group("Character")
                    }
                    _ => CacheKeyInfo::new(id),
                })
        })
}

pub(crate) fn object(value: Value) -> Object {
    value.as_object().cloned().unwrap_or_default()
}

fn hero(selections: Vec<Selection>) -> Selection {
    Selection::Field(
        Field::new("hero", FieldType::named("Character"))
            .with_argument("episode", InputValue::variable("episode"))
            .with_selections(selections),
    )
}

/// `query HeroName($episode: Episode) { hero(episode: $episode) { __typename id name } }`
pub(crate) fn hero_name_query() -> Operation {
    Operation::query(
        "HeroName",
        SelectionSet::new(
            "Query",
            vec![hero(vec![
                Selection::typename(),
                Selection::field("id", FieldType::Id.non_null()),
                Selection::field("name", FieldType::String.non_null()),
            ])],
        ),
    )
    .with_document(
        "query HeroName($episode: Episode) { hero(episode: $episode) { __typename id name } }",
    )
    .with_variables(object(json!({ "episode": "JEDI" })))
}

/// Selects the friends of the hero, and the primary function of droids.
pub(crate) fn hero_and_friends_query() -> Operation {
    let droid_details = Arc::new(Fragment::new(
        "DroidDetails",
        "Droid",
        vec![Selection::field("primaryFunction", FieldType::String)],
    ));

    Operation::query(
        "HeroAndFriends",
        SelectionSet::new(
            "Query",
            vec![hero(vec![
                Selection::typename(),
                Selection::field("id", FieldType::Id.non_null()),
                Selection::field("name", FieldType::String.non_null()),
                Selection::spread(&droid_details),
                Selection::Field(
                    Field::new("friends", FieldType::named("Character").list()).with_selections(
                        vec![
                            Selection::typename(),
                            Selection::field("id", FieldType::Id.non_null()),
                            Selection::field("name", FieldType::String.non_null()),
                        ],
                    ),
                ),
            ])],
        ),
    )
    .with_document(
        "query HeroAndFriends($episode: Episode) { hero(episode: $episode) { __typename id name \
         ...DroidDetails friends { __typename id name } } } \
         fragment DroidDetails on Droid { primaryFunction }",
    )
    .with_variables(object(json!({ "episode": "JEDI" })))
}

/// Defers the friends of the hero under the `friends` label.
pub(crate) fn hero_with_deferred_friends_query() -> Operation {
    Operation::query(
        "HeroDeferredFriends",
        SelectionSet::new(
            "Query",
            vec![hero(vec![
                Selection::typename(),
                Selection::field("id", FieldType::Id.non_null()),
                Selection::field("name", FieldType::String.non_null()),
                Selection::deferred(
                    "friends",
                    None,
                    vec![Selection::Field(
                        Field::new("friends", FieldType::named("Character").list())
                            .with_selections(vec![
                                Selection::typename(),
                                Selection::field("id", FieldType::Id.non_null()),
                                Selection::field("name", FieldType::String.non_null()),
                            ]),
                    )],
                ),
            ])],
        ),
    )
    .with_document(
        "query HeroDeferredFriends($episode: Episode) { hero(episode: $episode) { __typename id \
         name ... @defer(label: \"friends\") { friends { __typename id name } } } }",
    )
    .with_variables(object(json!({ "episode": "JEDI" })))
}

pub(crate) fn r2_d2() -> Value {
    json!({
        "hero": {
            "__typename": "Droid",
            "id": "2001",
            "name": "R2-D2",
            "primaryFunction": "Astromech",
            "friends": [
                { "__typename": "Human", "id": "1000", "name": "Luke Skywalker" },
                { "__typename": "Human", "id": "1002", "name": "Han Solo" }
            ]
        }
    })
}
