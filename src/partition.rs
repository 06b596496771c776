//! Partition tuples with a canonical, representation-independent identity.
//!
//! A [`PartitionKey`] is used as a map key by the watermark store and the scan
//! planner, so two keys describing the same partition must compare and hash
//! equal no matter which code path produced them. Floating-point components are
//! stored as canonicalised IEEE bits (`-0.0` folds into `0.0`, every NaN folds
//! into one quiet NaN) and ordered with `total_cmp`, mirroring how owned keys
//! keep equality, ordering and hashing aligned.

use std::{cmp::Ordering, fmt};

use arrow::datatypes::{DataType, Schema, TimeUnit};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Single value of a partition column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionValue {
    /// Null partition value.
    Null,
    /// Boolean component.
    Boolean(bool),
    /// 32-bit signed integer component.
    Int32(i32),
    /// 64-bit signed integer component.
    Int64(i64),
    /// 32-bit float stored as canonical IEEE bits.
    Float32(#[serde(deserialize_with = "canonical_f32_bits")] u32),
    /// 64-bit float stored as canonical IEEE bits.
    Float64(#[serde(deserialize_with = "canonical_f64_bits")] u64),
    /// UTF-8 component.
    Utf8(String),
    /// Binary component.
    Binary(Vec<u8>),
    /// Days since the Unix epoch.
    Date32(i32),
    /// Microseconds since the Unix epoch.
    TimestampMicros(i64),
}

impl PartitionValue {
    /// Build a float component, canonicalising signed zero and NaN payloads.
    pub fn float32(value: f32) -> Self {
        PartitionValue::Float32(canonical_f32(value).to_bits())
    }

    /// Build a double component, canonicalising signed zero and NaN payloads.
    pub fn float64(value: f64) -> Self {
        PartitionValue::Float64(canonical_f64(value).to_bits())
    }

    /// Whether this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, PartitionValue::Null)
    }

    /// Whether a value of this variant may be stored in a column of `data_type`.
    pub fn matches_type(&self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (PartitionValue::Null, _)
                | (PartitionValue::Boolean(_), DataType::Boolean)
                | (PartitionValue::Int32(_), DataType::Int32)
                | (PartitionValue::Int64(_), DataType::Int64)
                | (PartitionValue::Float32(_), DataType::Float32)
                | (PartitionValue::Float64(_), DataType::Float64)
                | (PartitionValue::Utf8(_), DataType::Utf8 | DataType::LargeUtf8)
                | (PartitionValue::Binary(_), DataType::Binary | DataType::LargeBinary)
                | (PartitionValue::Date32(_), DataType::Date32)
                | (
                    PartitionValue::TimestampMicros(_),
                    DataType::Timestamp(TimeUnit::Microsecond, _)
                )
        )
    }

    fn rank(&self) -> u8 {
        match self {
            PartitionValue::Null => 0,
            PartitionValue::Boolean(_) => 1,
            PartitionValue::Int32(_) => 2,
            PartitionValue::Int64(_) => 3,
            PartitionValue::Float32(_) => 4,
            PartitionValue::Float64(_) => 5,
            PartitionValue::Utf8(_) => 6,
            PartitionValue::Binary(_) => 7,
            PartitionValue::Date32(_) => 8,
            PartitionValue::TimestampMicros(_) => 9,
        }
    }
}

fn canonical_f32(value: f32) -> f32 {
    if value.is_nan() {
        f32::NAN
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}

fn canonical_f64(value: f64) -> f64 {
    if value.is_nan() {
        f64::NAN
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}

fn canonical_f32_bits<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let bits = u32::deserialize(deserializer)?;
    Ok(canonical_f32(f32::from_bits(bits)).to_bits())
}

fn canonical_f64_bits<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let bits = u64::deserialize(deserializer)?;
    Ok(canonical_f64(f64::from_bits(bits)).to_bits())
}

impl PartialOrd for PartitionValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Nulls sort first; values of different variants order by variant rank.
impl Ord for PartitionValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use PartitionValue as V;
        match (self, other) {
            (V::Null, V::Null) => Ordering::Equal,
            (V::Boolean(a), V::Boolean(b)) => a.cmp(b),
            (V::Int32(a), V::Int32(b)) | (V::Date32(a), V::Date32(b)) => a.cmp(b),
            (V::Int64(a), V::Int64(b)) | (V::TimestampMicros(a), V::TimestampMicros(b)) => {
                a.cmp(b)
            }
            (V::Float32(a), V::Float32(b)) => f32::from_bits(*a).total_cmp(&f32::from_bits(*b)),
            (V::Float64(a), V::Float64(b)) => f64::from_bits(*a).total_cmp(&f64::from_bits(*b)),
            (V::Utf8(a), V::Utf8(b)) => a.cmp(b),
            (V::Binary(a), V::Binary(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for PartitionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionValue::Null => f.write_str("null"),
            PartitionValue::Boolean(v) => fmt::Display::fmt(v, f),
            PartitionValue::Int32(v) | PartitionValue::Date32(v) => fmt::Display::fmt(v, f),
            PartitionValue::Int64(v) | PartitionValue::TimestampMicros(v) => {
                fmt::Display::fmt(v, f)
            }
            PartitionValue::Float32(bits) => fmt::Display::fmt(&f32::from_bits(*bits), f),
            PartitionValue::Float64(bits) => fmt::Display::fmt(&f64::from_bits(*bits), f),
            PartitionValue::Utf8(v) => f.write_str(v),
            PartitionValue::Binary(v) => {
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for PartitionValue {
    fn from(value: bool) -> Self {
        PartitionValue::Boolean(value)
    }
}

impl From<i32> for PartitionValue {
    fn from(value: i32) -> Self {
        PartitionValue::Int32(value)
    }
}

impl From<i64> for PartitionValue {
    fn from(value: i64) -> Self {
        PartitionValue::Int64(value)
    }
}

impl From<f32> for PartitionValue {
    fn from(value: f32) -> Self {
        PartitionValue::float32(value)
    }
}

impl From<f64> for PartitionValue {
    fn from(value: f64) -> Self {
        PartitionValue::float64(value)
    }
}

impl From<&str> for PartitionValue {
    fn from(value: &str) -> Self {
        PartitionValue::Utf8(value.to_owned())
    }
}

impl From<String> for PartitionValue {
    fn from(value: String) -> Self {
        PartitionValue::Utf8(value)
    }
}

impl From<Vec<u8>> for PartitionValue {
    fn from(value: Vec<u8>) -> Self {
        PartitionValue::Binary(value)
    }
}

/// Ordered tuple of partition-column values.
///
/// The empty key identifies the single partition of an unpartitioned table.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey(Vec<PartitionValue>);

impl PartitionKey {
    /// Build a key from its ordered components.
    pub fn new(values: Vec<PartitionValue>) -> Self {
        Self(values)
    }

    /// Key of the only partition of an unpartitioned table.
    pub fn unpartitioned() -> Self {
        Self(Vec::new())
    }

    /// Components in partition-spec order.
    pub fn values(&self) -> &[PartitionValue] {
        &self.0
    }

    /// Component at `pos`, if any.
    pub fn get(&self, pos: usize) -> Option<&PartitionValue> {
        self.0.get(pos)
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the unpartitioned key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Into<PartitionValue>> FromIterator<V> for PartitionKey {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, value) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(value, f)?;
        }
        f.write_str(")")
    }
}

/// Transform applied to a source column to derive a partition value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    /// The partition value is the column value itself.
    Identity,
    /// Hash bucket of the column value.
    Bucket(u32),
    /// Truncation of the column value to a width.
    Truncate(u32),
    /// Calendar day of a date/timestamp.
    Day,
    /// Calendar month of a date/timestamp.
    Month,
    /// Calendar year of a date/timestamp.
    Year,
}

impl Transform {
    /// Whether this is the identity transform.
    pub fn is_identity(&self) -> bool {
        matches!(self, Transform::Identity)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => f.write_str("identity"),
            Transform::Bucket(n) => write!(f, "bucket[{n}]"),
            Transform::Truncate(w) => write!(f, "truncate[{w}]"),
            Transform::Day => f.write_str("day"),
            Transform::Month => f.write_str("month"),
            Transform::Year => f.write_str("year"),
        }
    }
}

/// One field of a partition spec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionField {
    /// Name of the schema column the value is derived from.
    pub source: String,
    /// Transform applied to the source column.
    pub transform: Transform,
}

/// Ordered list of partition fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    fields: Vec<PartitionField>,
}

impl PartitionSpec {
    /// Spec of an unpartitioned table.
    pub fn unpartitioned() -> Self {
        Self { fields: Vec::new() }
    }

    /// Spec partitioning by the given columns with identity transforms.
    pub fn identity<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: columns
                .into_iter()
                .map(|source| PartitionField {
                    source: source.into(),
                    transform: Transform::Identity,
                })
                .collect(),
        }
    }

    /// Spec built from explicit fields.
    pub fn new(fields: Vec<PartitionField>) -> Self {
        Self { fields }
    }

    /// Partition fields in order.
    pub fn fields(&self) -> &[PartitionField] {
        &self.fields
    }

    /// Whether the table is unpartitioned.
    pub fn is_unpartitioned(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of the field sourced from `column`, honouring case sensitivity.
    pub fn position_of(&self, column: &str, case_sensitive: bool) -> Option<usize> {
        self.fields.iter().position(|field| {
            if case_sensitive {
                field.source == column
            } else {
                field.source.eq_ignore_ascii_case(column)
            }
        })
    }

    /// Check the spec against a schema: every source column must exist and every
    /// transform must be the identity.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for field in &self.fields {
            if schema.field_with_name(&field.source).is_err() {
                return Err(Error::InvalidArgument(format!(
                    "partition source column '{}' is not in the schema",
                    field.source
                )));
            }
            if !field.transform.is_identity() {
                return Err(Error::InvalidArgument(format!(
                    "Unsupported partition transform:{}",
                    field.transform
                )));
            }
        }
        Ok(())
    }

    /// Check a key against this spec and the schema column types.
    pub fn check_key(&self, schema: &Schema, key: &PartitionKey) -> Result<()> {
        if key.len() != self.fields.len() {
            return Err(Error::InvalidArgument(format!(
                "partition {key} has {} values, spec expects {}",
                key.len(),
                self.fields.len()
            )));
        }
        for (field, value) in self.fields.iter().zip(key.values()) {
            let column = schema.field_with_name(&field.source).map_err(|_| {
                Error::InvalidArgument(format!(
                    "partition source column '{}' is not in the schema",
                    field.source
                ))
            })?;
            if !value.matches_type(column.data_type()) {
                return Err(Error::InvalidArgument(format!(
                    "partition value {value} does not match type {:?} of column '{}'",
                    column.data_type(),
                    field.source
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{hash_map::DefaultHasher, HashMap},
        hash::{Hash, Hasher},
    };

    use arrow::datatypes::Field;

    use super::*;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn keys_from_different_paths_collide() {
        let built = PartitionKey::new(vec![
            PartitionValue::Utf8("2024-01-01".to_string()),
            PartitionValue::Int32(3),
        ]);
        let collected: PartitionKey = vec![
            PartitionValue::from("2024-01-01"),
            PartitionValue::from(3i32),
        ]
        .into_iter()
        .collect();
        assert_eq!(built, collected);
        assert_eq!(hash_of(&built), hash_of(&collected));

        let mut map = HashMap::new();
        map.insert(built, 5i64);
        assert_eq!(map.get(&collected), Some(&5));
    }

    #[test]
    fn float_components_are_canonical() {
        assert_eq!(PartitionValue::from(0.0f64), PartitionValue::from(-0.0f64));
        assert_eq!(
            PartitionValue::from(f64::NAN),
            PartitionValue::float64(f64::from_bits(0x7ff8_0000_0000_0001))
        );
        assert!(PartitionValue::from(-1.5f64) < PartitionValue::from(2.0f64));
    }

    #[test]
    fn decoded_floats_are_canonical() {
        let raw = PartitionKey::new(vec![
            PartitionValue::Float64(0x7ff8_0000_0000_0001),
            PartitionValue::Float32((-0.0f32).to_bits()),
        ]);
        let bytes = bincode::serialize(&raw).expect("encode");
        let decoded: PartitionKey = bincode::deserialize(&bytes).expect("decode");
        let canonical = PartitionKey::new(vec![
            PartitionValue::float64(f64::NAN),
            PartitionValue::float32(0.0),
        ]);
        assert_eq!(decoded, canonical);
        assert_eq!(hash_of(&decoded), hash_of(&canonical));
    }

    #[test]
    fn null_sorts_first_and_variants_do_not_mix() {
        assert!(PartitionValue::Null < PartitionValue::Int32(i32::MIN));
        assert_ne!(PartitionValue::Int32(1), PartitionValue::Int64(1));
        assert_eq!(
            PartitionKey::from_iter(["a", "b"]).to_string(),
            "(a, b)".to_string()
        );
    }

    #[test]
    fn spec_validation_rejects_non_identity() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("dt", DataType::Utf8, false),
        ]);
        assert!(PartitionSpec::identity(["dt"]).validate(&schema).is_ok());
        assert!(PartitionSpec::identity(["missing"]).validate(&schema).is_err());
        let bucketed = PartitionSpec::new(vec![PartitionField {
            source: "id".to_string(),
            transform: Transform::Bucket(16),
        }]);
        let err = bucketed.validate(&schema).expect_err("bucket transform");
        assert!(err.to_string().contains("bucket[16]"));
    }

    #[test]
    fn check_key_enforces_arity_and_types() {
        let schema = Schema::new(vec![Field::new("dt", DataType::Utf8, false)]);
        let spec = PartitionSpec::identity(["dt"]);
        assert!(spec
            .check_key(&schema, &PartitionKey::from_iter(["2024-01-01"]))
            .is_ok());
        assert!(spec
            .check_key(&schema, &PartitionKey::from_iter([1i32]))
            .is_err());
        assert!(spec
            .check_key(&schema, &PartitionKey::unpartitioned())
            .is_err());
    }
}
