//! Contracts a Rust type satisfies to be populated from a result row.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::ScanError;
use crate::types::RowValues;

/// Decode a single column value into `Self`.
pub trait FromValue: Sized {
    /// Name used in decode error messages.
    const TARGET: &'static str;

    /// Convert the value found at column `index`.
    ///
    /// # Errors
    /// Returns [`ScanError`] when the value is NULL, of the wrong kind, or out of range.
    fn from_value(value: RowValues, index: usize) -> Result<Self, ScanError>;
}

/// Encode `self` as a positional query argument.
pub trait ToValue {
    fn to_value(&self) -> RowValues;
}

/// Object-safe view of a field that can be overwritten from a column value.
///
/// [`Row::ptr_fields`] hands these out in column order; the engine never sees the concrete
/// field types.
pub trait ScanTarget {
    /// # Errors
    /// Returns [`ScanError`] if `value` cannot be decoded into the field.
    fn scan_value(&mut self, value: RowValues, index: usize) -> Result<(), ScanError>;
}

impl<T: FromValue> ScanTarget for T {
    fn scan_value(&mut self, value: RowValues, index: usize) -> Result<(), ScanError> {
        *self = T::from_value(value, index)?;
        Ok(())
    }
}

/// A record type mapped from one database row.
///
/// Implementations return mutable references to their fields in exactly the order the query
/// selects columns. Use [`impl_row!`](crate::impl_row) rather than writing this by hand:
///
/// ```rust
/// use typed_dao::impl_row;
///
/// #[derive(Debug, Default)]
/// struct Like {
///     id: i64,
///     user_id: i64,
///     partner_id: i64,
/// }
///
/// impl_row!(Like { id, user_id, partner_id });
/// ```
pub trait Row: Default + Send + 'static {
    fn ptr_fields(&mut self) -> Vec<&mut dyn ScanTarget>;
}

/// A scalar usable as a whole single-column result or as an `IN (...)` argument.
///
/// Implemented for the primitive and temporal kinds the drivers marshal directly; named
/// wrappers opt in with [`column_newtype!`](crate::column_newtype).
pub trait Column: FromValue + ToValue + Default + Send + 'static {}

/// Populate a fresh `T::default()` from the raw values of one row.
pub(crate) fn scan_row<T: Row>(values: Vec<RowValues>) -> Result<T, ScanError> {
    let mut record = T::default();
    {
        let mut fields = record.ptr_fields();
        if fields.len() != values.len() {
            return Err(ScanError::ColumnCount {
                expected: fields.len(),
                found: values.len(),
            });
        }
        for (index, (field, value)) in fields.iter_mut().zip(values).enumerate() {
            field.scan_value(value, index)?;
        }
    }
    Ok(record)
}

/// Decode a single-column row into `S`.
pub(crate) fn scan_column<S: Column>(values: Vec<RowValues>) -> Result<S, ScanError> {
    let found = values.len();
    let mut iter = values.into_iter();
    match (iter.next(), found) {
        (Some(value), 1) => {
            let mut out = S::default();
            out.scan_value(value, 0)?;
            Ok(out)
        }
        _ => Err(ScanError::ColumnCount { expected: 1, found }),
    }
}

fn mismatch<T: FromValue>(value: &RowValues, index: usize) -> ScanError {
    if value.is_null() {
        ScanError::UnexpectedNull {
            index,
            target: T::TARGET,
        }
    } else {
        ScanError::TypeMismatch {
            index,
            target: T::TARGET,
            found: value.kind(),
        }
    }
}

impl FromValue for i64 {
    const TARGET: &'static str = "i64";

    fn from_value(value: RowValues, index: usize) -> Result<Self, ScanError> {
        match value {
            RowValues::Int(i) => Ok(i),
            RowValues::Bool(b) => Ok(i64::from(b)),
            other => Err(mismatch::<Self>(&other, index)),
        }
    }
}

macro_rules! narrow_int {
    ($($ty:ty),+) => {
        $(
            impl FromValue for $ty {
                const TARGET: &'static str = stringify!($ty);

                fn from_value(value: RowValues, index: usize) -> Result<Self, ScanError> {
                    let wide = i64::from_value(value, index).map_err(|err| match err {
                        ScanError::UnexpectedNull { index, .. } => ScanError::UnexpectedNull {
                            index,
                            target: Self::TARGET,
                        },
                        ScanError::TypeMismatch { index, found, .. } => ScanError::TypeMismatch {
                            index,
                            target: Self::TARGET,
                            found,
                        },
                        other => other,
                    })?;
                    <$ty>::try_from(wide).map_err(|_| ScanError::OutOfRange {
                        index,
                        target: Self::TARGET,
                        value: wide.to_string(),
                    })
                }
            }

            impl ToValue for $ty {
                fn to_value(&self) -> RowValues {
                    RowValues::Int(i64::from(*self))
                }
            }

            impl Column for $ty {}
        )+
    };
}

narrow_int!(u8, i16, i32);

impl ToValue for i64 {
    fn to_value(&self) -> RowValues {
        RowValues::Int(*self)
    }
}

impl Column for i64 {}

impl FromValue for f64 {
    const TARGET: &'static str = "f64";

    fn from_value(value: RowValues, index: usize) -> Result<Self, ScanError> {
        value
            .as_float()
            .ok_or_else(|| mismatch::<Self>(&value, index))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> RowValues {
        RowValues::Float(*self)
    }
}

impl Column for f64 {}

impl FromValue for String {
    const TARGET: &'static str = "String";

    fn from_value(value: RowValues, index: usize) -> Result<Self, ScanError> {
        match value {
            RowValues::Text(s) => Ok(s),
            other => Err(mismatch::<Self>(&other, index)),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> RowValues {
        RowValues::Text(self.clone())
    }
}

impl ToValue for str {
    fn to_value(&self) -> RowValues {
        RowValues::Text(self.to_owned())
    }
}

impl Column for String {}

impl FromValue for bool {
    const TARGET: &'static str = "bool";

    fn from_value(value: RowValues, index: usize) -> Result<Self, ScanError> {
        match value.as_bool() {
            Some(b) => Ok(b),
            None => match value {
                RowValues::Int(i) => Err(ScanError::OutOfRange {
                    index,
                    target: Self::TARGET,
                    value: i.to_string(),
                }),
                other => Err(mismatch::<Self>(&other, index)),
            },
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> RowValues {
        RowValues::Bool(*self)
    }
}

impl Column for bool {}

impl FromValue for NaiveDateTime {
    const TARGET: &'static str = "NaiveDateTime";

    fn from_value(value: RowValues, index: usize) -> Result<Self, ScanError> {
        if let Some(ts) = value.as_timestamp() {
            return Ok(ts);
        }
        match value {
            RowValues::Text(s) => Err(ScanError::InvalidTimestamp { index, value: s }),
            other => Err(mismatch::<Self>(&other, index)),
        }
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> RowValues {
        RowValues::Timestamp(*self)
    }
}

impl Column for NaiveDateTime {}

impl FromValue for DateTime<Utc> {
    const TARGET: &'static str = "DateTime<Utc>";

    fn from_value(value: RowValues, index: usize) -> Result<Self, ScanError> {
        NaiveDateTime::from_value(value, index)
            .map(|naive| naive.and_utc())
            .map_err(|err| match err {
                ScanError::UnexpectedNull { index, .. } => ScanError::UnexpectedNull {
                    index,
                    target: Self::TARGET,
                },
                ScanError::TypeMismatch { index, found, .. } => ScanError::TypeMismatch {
                    index,
                    target: Self::TARGET,
                    found,
                },
                other => other,
            })
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> RowValues {
        RowValues::Timestamp(self.naive_utc())
    }
}

impl Column for DateTime<Utc> {}

impl<T: FromValue> FromValue for Option<T> {
    const TARGET: &'static str = T::TARGET;

    fn from_value(value: RowValues, index: usize) -> Result<Self, ScanError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value, index).map(Some)
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> RowValues {
        self.as_ref().map_or(RowValues::Null, ToValue::to_value)
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> RowValues {
        (**self).to_value()
    }
}

impl ToValue for RowValues {
    fn to_value(&self) -> RowValues {
        self.clone()
    }
}
