use std::fmt;

use crate::kv::dictionary::{KeyFields, KeySpec, is_missing_value};

/// Ordered tuple of field values forming one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyTuple(Vec<String>);

impl KeyTuple {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    /// True when every value is empty or a missing code.
    pub fn is_placeholder(&self) -> bool {
        self.0.iter().all(|value| is_missing_value(value))
    }

    /// Picks `fields` out of a row; `None` when the row is too short.
    pub fn extract(fields: &KeyFields, row: &[String]) -> Option<KeyTuple> {
        fields
            .indices
            .iter()
            .map(|&index| row.get(index).map(|value| value.trim().to_string()))
            .collect::<Option<Vec<String>>>()
            .map(KeyTuple)
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Keys of one row. `None` marks a key kind the file type does not declare,
/// or a secondary key left blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowKeys {
    pub pk: Option<KeyTuple>,
    pub fk: Option<KeyTuple>,
    pub secondary_fk: Option<KeyTuple>,
}

/// The row is narrower than the key declaration requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowTooShort {
    pub width: usize,
    pub required: usize,
}

/// Extracts the declared keys of one row.
pub fn extract_row_keys(spec: &KeySpec, row: &[String]) -> Result<RowKeys, RowTooShort> {
    let required = spec.max_index() + 1;
    if row.len() < required {
        return Err(RowTooShort {
            width: row.len(),
            required,
        });
    }
    let pk = spec.pk.and_then(|pk| KeyTuple::extract(&pk, row));
    let fk = spec
        .fk
        .and_then(|relation| KeyTuple::extract(&relation.fields, row));
    let secondary_fk = spec
        .secondary_fk
        .and_then(|relation| KeyTuple::extract(&relation.fields, row))
        .filter(|keys| !keys.is_placeholder());
    Ok(RowKeys {
        pk,
        fk,
        secondary_fk,
    })
}
