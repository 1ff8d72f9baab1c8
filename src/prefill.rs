//! Initial field values taken from the landing URL's query string.
use reqwest::Url;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Field, OrderSubmission};

/// Accepted query keys per field, canonical name first.
const KEYS: &[(Field, &[&str])] = &[
    (Field::OrderNumber, &["orderNumber", "orderId"]),
    (Field::CreatorName, &["creatorName", "creatorFullName"]),
    (Field::QuantityOrdered, &["quantityOrdered", "totalItemsInOrder"]),
    (Field::SubmittedUrl, &["submittedUrl"]),
    (Field::OrderConfirmationLink, &["orderConfirmationLink", "orderStatusUrl"]),
    (Field::Message, &["message"]),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefill {
    values: BTreeMap<Field, String>,
}

impl Prefill {
    /// Build from decoded query pairs. A present canonical key shadows its alias, even when empty;
    /// empty values are skipped.
    /// When a key repeats, its first value is used.
    pub fn from_query<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut first: BTreeMap<String, String> = BTreeMap::new();
        for (k, v) in pairs {
            first.entry(k.as_ref().to_string()).or_insert_with(|| v.into());
        }

        let values = KEYS
            .iter()
            .filter_map(|(field, keys)| {
                keys.iter()
                    .find_map(|key| first.get(*key))
                    .filter(|v| !v.is_empty())
                    .map(|v| (*field, v.clone()))
            })
            .collect();
        Self { values }
    }

    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Overlay onto `submission`, leaving fields in `edited` untouched.
    pub fn apply(&self, submission: OrderSubmission, edited: &BTreeSet<Field>) -> OrderSubmission {
        self.values
            .iter()
            .filter(|(field, _)| !edited.contains(*field))
            .fold(submission, |sub, (field, value)| sub.with_field(*field, value.clone()))
    }
}
