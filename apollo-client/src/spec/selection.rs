use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use super::FieldType;
use super::InputValue;
use crate::json_ext::Object;

/// A compiled, read-only selection.
///
/// Selections are produced ahead of time by the code generator and never change during
/// execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    Field(Field),
    FragmentSpread(Arc<Fragment>),
    InlineFragment(InlineFragment),
    /// Selections guarded by `@include`/`@skip`.
    Conditional {
        include_skip: IncludeSkip,
        selections: Vec<Selection>,
    },
    /// Selections delivered incrementally with `@defer`.
    Deferred(DeferredFragment),
}

/// The selections of an object along with the type they are selected on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSet {
    pub parent_type: String,
    pub selections: Vec<Selection>,
}

impl SelectionSet {
    pub fn new(parent_type: impl Into<String>, selections: Vec<Selection>) -> Self {
        Self {
            parent_type: parent_type.into(),
            selections,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    /// Arguments in document order. Their order never affects the storage key.
    pub arguments: IndexMap<String, InputValue>,
    pub field_type: FieldType,
    /// Present for fields of composite type.
    pub selection_set: Option<Vec<Selection>>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: IndexMap::new(),
            field_type,
            selection_set: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: InputValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn with_selections(mut self, selections: Vec<Selection>) -> Self {
        self.selection_set = Some(selections);
        self
    }

    /// The key of this field in the response: its alias, or its name.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A named fragment definition, shared by every spread that references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub name: String,
    pub type_condition: String,
    pub selection_set: Vec<Selection>,
}

impl Fragment {
    pub fn new(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selection_set: Vec<Selection>,
    ) -> Self {
        Self {
            name: name.into(),
            type_condition: type_condition.into(),
            selection_set,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineFragment {
    // Optional in specs, the enclosing type applies if not specified
    pub type_condition: Option<String>,
    pub selection_set: Vec<Selection>,
}

impl InlineFragment {
    /// The identifier recorded in the fulfilled fragments of an object.
    pub fn identifier(&self, parent_type: &str) -> String {
        format!(
            "...on {}",
            self.type_condition.as_deref().unwrap_or(parent_type)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredFragment {
    pub label: String,
    /// The `if` argument of `@defer`.
    pub condition: Condition,
    pub type_condition: Option<String>,
    pub selection_set: Vec<Selection>,
}

impl Selection {
    pub fn field(name: impl Into<String>, field_type: FieldType) -> Self {
        Selection::Field(Field::new(name, field_type))
    }

    pub fn typename() -> Self {
        Selection::Field(Field::new(super::TYPENAME, FieldType::String.non_null()))
    }

    pub fn spread(fragment: &Arc<Fragment>) -> Self {
        Selection::FragmentSpread(fragment.clone())
    }

    pub fn inline(type_condition: impl Into<String>, selection_set: Vec<Selection>) -> Self {
        Selection::InlineFragment(InlineFragment {
            type_condition: Some(type_condition.into()),
            selection_set,
        })
    }

    pub fn include_if(variable: impl Into<String>, selections: Vec<Selection>) -> Self {
        Selection::Conditional {
            include_skip: IncludeSkip {
                include: Condition::Variable(variable.into()),
                skip: Condition::No,
            },
            selections,
        }
    }

    pub fn skip_if(variable: impl Into<String>, selections: Vec<Selection>) -> Self {
        Selection::Conditional {
            include_skip: IncludeSkip {
                include: Condition::Yes,
                skip: Condition::Variable(variable.into()),
            },
            selections,
        }
    }

    pub fn deferred(
        label: impl Into<String>,
        type_condition: Option<String>,
        selection_set: Vec<Selection>,
    ) -> Self {
        Selection::Deferred(DeferredFragment {
            label: label.into(),
            condition: Condition::Yes,
            type_condition,
            selection_set,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeSkip {
    include: Condition,
    skip: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Yes,
    No,
    Variable(String),
}

impl IncludeSkip {
    pub fn new(include: Condition, skip: Condition) -> Self {
        Self { include, skip }
    }

    pub fn should_skip(&self, variables: &Object) -> bool {
        // Using .unwrap_or is legit here because a variable that is absent or not a boolean
        // leaves the selection in its default state
        self.skip.eval(variables).unwrap_or(false) || !self.include.eval(variables).unwrap_or(true)
    }
}

impl Default for IncludeSkip {
    fn default() -> Self {
        Self {
            include: Condition::Yes,
            skip: Condition::No,
        }
    }
}

impl Condition {
    pub fn eval(&self, variables: &Object) -> Option<bool> {
        match self {
            Condition::Yes => Some(true),
            Condition::No => Some(false),
            Condition::Variable(variable_name) => variables
                .get(variable_name.as_str())
                .and_then(|v| v.as_bool()),
        }
    }
}
