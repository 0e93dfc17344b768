use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use super::SelectionSet;
use crate::cache::MUTATION_ROOT;
use crate::cache::QUERY_ROOT;
use crate::cache::SUBSCRIPTION_ROOT;
use crate::json_ext::Object;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// The well-known key of the record holding the root fields of this kind of operation.
    pub fn root_cache_key(&self) -> &'static str {
        match self {
            OperationKind::Query => QUERY_ROOT,
            OperationKind::Mutation => MUTATION_ROOT,
            OperationKind::Subscription => SUBSCRIPTION_ROOT,
        }
    }

    pub fn root_type(&self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
            OperationKind::Subscription => "Subscription",
        }
    }
}

/// A compiled operation with its variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    pub kind: OperationKind,
    /// The full document. Operations registered ahead of time may only know their hash.
    pub document: Option<String>,
    /// Hex encoded sha256 of the document, sent as the persisted query id.
    pub hash: Option<String>,
    pub selection_set: SelectionSet,
    pub variables: Object,
}

impl Operation {
    fn new(name: impl Into<String>, kind: OperationKind, selection_set: SelectionSet) -> Self {
        Self {
            name: name.into(),
            kind,
            document: None,
            hash: None,
            selection_set,
            variables: Object::new(),
        }
    }

    pub fn query(name: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self::new(name, OperationKind::Query, selection_set)
    }

    pub fn mutation(name: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self::new(name, OperationKind::Mutation, selection_set)
    }

    pub fn subscription(name: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self::new(name, OperationKind::Subscription, selection_set)
    }

    /// Attaches the document, and derives its persisted query hash.
    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        let document = document.into();
        self.hash = Some(hex::encode(Sha256::digest(document.as_bytes())));
        self.document = Some(document);
        self
    }

    /// Sets the persisted query hash of an operation whose document is not shipped.
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn with_variables(mut self, variables: Object) -> Self {
        self.variables = variables;
        self
    }

    pub fn root_cache_key(&self) -> &'static str {
        self.kind.root_cache_key()
    }
}
