use serde::de::value::{SeqDeserializer, StrDeserializer, U32Deserializer};
use serde::de::{DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;
use serde_json::Value as JsonValue;

use crate::error::FluentDbError;
use crate::types::RowValues;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

static NULL_VALUE: RowValues = RowValues::Null;

/// Normalized form used to match column names against field names:
/// lowercase, underscores removed (`CategoryID`, `category_id` and `categoryid` agree).
pub(crate) fn field_key(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn json_error(err: serde_json::Error) -> FluentDbError {
    FluentDbError::Mapping(err.to_string())
}

/// Deserializer over a single column value.
///
/// NULL read into a non-`Option` primitive yields the primitive's zero value.
pub struct ValueDeserializer<'a> {
    value: &'a RowValues,
}

impl<'a> ValueDeserializer<'a> {
    #[must_use]
    pub fn new(value: &'a RowValues) -> Self {
        Self { value }
    }

    fn structured<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FluentDbError> {
        match self.value {
            RowValues::JSON(json) => json.clone().deserialize_any(visitor).map_err(json_error),
            // SQLite keeps JSON documents as TEXT
            RowValues::Text(text) => match serde_json::from_str::<JsonValue>(text) {
                Ok(json) => json.deserialize_any(visitor).map_err(json_error),
                Err(_) => self.deserialize_any(visitor),
            },
            _ => self.deserialize_any(visitor),
        }
    }
}

macro_rules! deserialize_integer {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                match self.value {
                    RowValues::Null => visitor.visit_i64(0),
                    RowValues::Bool(b) => visitor.visit_i64(i64::from(*b)),
                    RowValues::Text(s) => match s.trim().parse::<i64>() {
                        Ok(i) => visitor.visit_i64(i),
                        Err(_) => self.deserialize_any(visitor),
                    },
                    _ => self.deserialize_any(visitor),
                }
            }
        )*
    };
}

macro_rules! deserialize_float {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                match self.value {
                    RowValues::Null => visitor.visit_f64(0.0),
                    RowValues::Text(s) => match s.trim().parse::<f64>() {
                        Ok(f) => visitor.visit_f64(f),
                        Err(_) => self.deserialize_any(visitor),
                    },
                    _ => self.deserialize_any(visitor),
                }
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ValueDeserializer<'_> {
    type Error = FluentDbError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Int(i) => visitor.visit_i64(*i),
            RowValues::Float(f) => visitor.visit_f64(*f),
            RowValues::Text(s) => visitor.visit_str(s),
            RowValues::Bool(b) => visitor.visit_bool(*b),
            RowValues::Timestamp(dt) => {
                visitor.visit_string(dt.format(TIMESTAMP_FORMAT).to_string())
            }
            RowValues::Null => visitor.visit_unit(),
            RowValues::JSON(json) => json.clone().deserialize_any(visitor).map_err(json_error),
            RowValues::Blob(bytes) => visitor.visit_bytes(bytes),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Null => visitor.visit_bool(false),
            RowValues::Int(i) => visitor.visit_bool(*i != 0),
            RowValues::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => visitor.visit_bool(true),
                "false" | "0" => visitor.visit_bool(false),
                _ => self.deserialize_any(visitor),
            },
            _ => self.deserialize_any(visitor),
        }
    }

    deserialize_integer!(
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
    );

    deserialize_float!(deserialize_f32 deserialize_f64);

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Null => visitor.visit_str(""),
            RowValues::Int(i) => visitor.visit_string(i.to_string()),
            RowValues::Float(f) => visitor.visit_string(f.to_string()),
            RowValues::Bool(b) => visitor.visit_string(b.to_string()),
            RowValues::JSON(JsonValue::String(s)) => visitor.visit_str(s),
            RowValues::JSON(json) => visitor.visit_string(json.to_string()),
            RowValues::Blob(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => visitor.visit_str(s),
                Err(_) => self.deserialize_any(visitor),
            },
            RowValues::Text(_) | RowValues::Timestamp(_) => self.deserialize_any(visitor),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Null => visitor.visit_bytes(&[]),
            RowValues::Text(s) => visitor.visit_bytes(s.as_bytes()),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.value.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Blob(bytes) => {
                SeqDeserializer::<_, FluentDbError>::new(bytes.iter().copied())
                    .deserialize_any(visitor)
            }
            RowValues::Null => {
                SeqDeserializer::<_, FluentDbError>::new(std::iter::empty::<u8>())
                    .deserialize_any(visitor)
            }
            _ => self.structured(visitor),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.structured(visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.structured(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.value {
            RowValues::Text(s) => {
                let access: StrDeserializer<'_, FluentDbError> = s.as_str().into_deserializer();
                visitor.visit_enum(access)
            }
            RowValues::Int(i) => {
                let index = u32::try_from(*i).map_err(|_| {
                    FluentDbError::Mapping(format!("{i} is not a variant index of {name}"))
                })?;
                let access: U32Deserializer<FluentDbError> = index.into_deserializer();
                visitor.visit_enum(access)
            }
            RowValues::JSON(json) => json
                .clone()
                .deserialize_enum(name, variants, visitor)
                .map_err(json_error),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        i128 u128 char
    }
}

/// Deserializer over a slice of columns from one row.
///
/// Structs match fields to columns by name (case-insensitive, underscores ignored);
/// unmatched columns are skipped and a repeated column name only feeds the first match.
/// Maps receive every column, tuples and sequences receive values positionally, and
/// scalar targets read the first column.
pub struct RowDeserializer<'a> {
    columns: &'a [String],
    values: &'a [RowValues],
}

impl<'a> RowDeserializer<'a> {
    #[must_use]
    pub fn new(columns: &'a [String], values: &'a [RowValues]) -> Self {
        Self { columns, values }
    }

    fn first(&self) -> Result<ValueDeserializer<'a>, FluentDbError> {
        self.values
            .first()
            .map(ValueDeserializer::new)
            .ok_or_else(|| FluentDbError::Mapping("row has no columns".into()))
    }
}

macro_rules! forward_to_first_column {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                self.first()?.$method(visitor)
            }
        )*
    };
}

impl<'de> Deserializer<'de> for RowDeserializer<'_> {
    type Error = FluentDbError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let keys = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| (idx, column.as_str()))
            .collect();
        visitor.visit_map(RowMapAccess::new(keys, self.values))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let field_keys: Vec<String> = fields.iter().map(|f| field_key(f)).collect();
        let mut claimed = vec![false; fields.len()];
        let mut keys = Vec::with_capacity(fields.len());
        for (idx, column) in self.columns.iter().enumerate() {
            let column_key = field_key(column);
            if let Some(pos) = field_keys.iter().position(|k| *k == column_key)
                && !claimed[pos]
            {
                claimed[pos] = true;
                keys.push((idx, fields[pos]));
            }
        }
        visitor.visit_map(RowMapAccess::new(keys, self.values))
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(RowSeqAccess {
            values: self.values.iter(),
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        // an outer-join miss arrives as a segment of NULLs
        if !self.values.is_empty() && self.values.iter().all(RowValues::is_null) {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.first()?.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    forward_to_first_column!(
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_i128 deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_u128 deserialize_f32 deserialize_f64 deserialize_char deserialize_str
        deserialize_string deserialize_bytes deserialize_byte_buf deserialize_identifier
    );
}

struct RowMapAccess<'a> {
    keys: std::vec::IntoIter<(usize, &'a str)>,
    values: &'a [RowValues],
    current: Option<usize>,
}

impl<'a> RowMapAccess<'a> {
    fn new(keys: Vec<(usize, &'a str)>, values: &'a [RowValues]) -> Self {
        Self {
            keys: keys.into_iter(),
            values,
            current: None,
        }
    }
}

impl<'de> MapAccess<'de> for RowMapAccess<'_> {
    type Error = FluentDbError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.keys.next() {
            Some((idx, key)) => {
                self.current = Some(idx);
                let key: StrDeserializer<'_, FluentDbError> = key.into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        let idx = self
            .current
            .take()
            .ok_or_else(|| FluentDbError::Mapping("column value requested before its name".into()))?;
        let value = self.values.get(idx).unwrap_or(&NULL_VALUE);
        seed.deserialize(ValueDeserializer::new(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.keys.len())
    }
}

struct RowSeqAccess<'a> {
    values: std::slice::Iter<'a, RowValues>,
}

impl<'de> SeqAccess<'de> for RowSeqAccess<'_> {
    type Error = FluentDbError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        match self.values.next() {
            Some(value) => seed.deserialize(ValueDeserializer::new(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.values.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use serde::Deserialize;
    use std::collections::HashMap;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Product {
        product_id: i64,
        product_name: String,
        unit_price: f64,
        discontinued: bool,
        category: Option<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Status {
        Active,
        Retired,
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn struct_fields_match_columns_loosely() {
        let cols = columns(&["ProductID", "ProductName", "UnitPrice", "Discontinued", "Extra"]);
        let vals = vec![
            RowValues::Int(7),
            RowValues::Text("Chai".into()),
            RowValues::Int(18),
            RowValues::Int(1),
            RowValues::Text("ignored".into()),
        ];
        let product = Product::deserialize(RowDeserializer::new(&cols, &vals)).unwrap();
        assert_eq!(
            product,
            Product {
                product_id: 7,
                product_name: "Chai".into(),
                unit_price: 18.0,
                discontinued: true,
                category: None,
            }
        );
    }

    #[test]
    fn nulls_become_zero_values() {
        let cols = columns(&["product_id", "product_name", "unit_price", "discontinued", "category"]);
        let vals = vec![RowValues::Null; 5];
        let product = Product::deserialize(RowDeserializer::new(&cols, &vals)).unwrap();
        assert_eq!(product.product_id, 0);
        assert_eq!(product.product_name, "");
        assert!(!product.discontinued);
        assert_eq!(product.category, None);
    }

    #[test]
    fn all_null_segment_is_none_for_option_targets() {
        let cols = columns(&["product_id", "product_name"]);
        let vals = vec![RowValues::Null, RowValues::Null];
        let product: Option<HashMap<String, Option<i64>>> =
            Option::deserialize(RowDeserializer::new(&cols, &vals)).unwrap();
        assert!(product.is_none());
    }

    #[test]
    fn duplicate_columns_feed_the_first_match() {
        #[derive(Deserialize)]
        struct Pair {
            id: i64,
        }
        let cols = columns(&["Id", "Id"]);
        let vals = vec![RowValues::Int(1), RowValues::Int(2)];
        let pair = Pair::deserialize(RowDeserializer::new(&cols, &vals)).unwrap();
        assert_eq!(pair.id, 1);
    }

    #[test]
    fn scalars_and_tuples_read_positionally() {
        let cols = columns(&["n", "label"]);
        let vals = vec![RowValues::Int(8), RowValues::Text("eight".into())];
        let n = i32::deserialize(RowDeserializer::new(&cols, &vals)).unwrap();
        assert_eq!(n, 8);
        let (n, label) = <(u8, String)>::deserialize(RowDeserializer::new(&cols, &vals)).unwrap();
        assert_eq!((n, label.as_str()), (8, "eight"));
    }

    #[test]
    fn values_convert_to_rich_types() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(13, 5, 9, 250)
            .unwrap();
        let parsed = NaiveDateTime::deserialize(ValueDeserializer::new(&RowValues::Timestamp(ts)))
            .unwrap();
        assert_eq!(parsed, ts);

        let blob = RowValues::Blob(vec![0xde, 0xad]);
        let bytes = Vec::<u8>::deserialize(ValueDeserializer::new(&blob)).unwrap();
        assert_eq!(bytes, vec![0xde, 0xad]);

        let status = Status::deserialize(ValueDeserializer::new(&RowValues::Text("Retired".into())))
            .unwrap();
        assert_eq!(status, Status::Retired);
        let status = Status::deserialize(ValueDeserializer::new(&RowValues::Int(0))).unwrap();
        assert_eq!(status, Status::Active);

        let tags = Vec::<String>::deserialize(ValueDeserializer::new(&RowValues::Text(
            r#"["a","b"]"#.into(),
        )))
        .unwrap();
        assert_eq!(tags, vec!["a", "b"]);
    }

    #[test]
    fn mismatched_types_report_mapping_errors() {
        let err = i64::deserialize(ValueDeserializer::new(&RowValues::Text("abc".into())))
            .unwrap_err();
        assert!(matches!(err, FluentDbError::Mapping(_)));
    }
}
