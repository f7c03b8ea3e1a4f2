/// Implement [`Row`](crate::typed::Row) by listing fields in selected-column order.
///
/// ```rust
/// use typed_dao::impl_row;
///
/// #[derive(Debug, Default)]
/// struct User {
///     id: i64,
///     nickname: String,
///     bio: Option<String>,
/// }
///
/// impl_row!(User { id, nickname, bio });
/// ```
#[macro_export]
macro_rules! impl_row {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::typed::Row for $ty {
            fn ptr_fields(&mut self) -> ::std::vec::Vec<&mut dyn $crate::typed::ScanTarget> {
                ::std::vec![$(&mut self.$field as &mut dyn $crate::typed::ScanTarget),+]
            }
        }
    };
}

/// Let a single-field tuple struct act as a [`Column`](crate::typed::Column) by delegating to
/// the wrapped scalar. The wrapper must implement `Default`.
///
/// ```rust
/// use typed_dao::column_newtype;
///
/// #[derive(Debug, Default, Clone, Copy, PartialEq)]
/// pub struct UserId(pub i64);
///
/// column_newtype!(UserId => i64);
/// ```
#[macro_export]
macro_rules! column_newtype {
    ($name:ident => $inner:ty) => {
        impl $crate::typed::FromValue for $name {
            const TARGET: &'static str = ::std::stringify!($name);

            fn from_value(
                value: $crate::RowValues,
                index: usize,
            ) -> ::std::result::Result<Self, $crate::ScanError> {
                <$inner as $crate::typed::FromValue>::from_value(value, index).map($name)
            }
        }

        impl $crate::typed::ToValue for $name {
            fn to_value(&self) -> $crate::RowValues {
                <$inner as $crate::typed::ToValue>::to_value(&self.0)
            }
        }

        impl $crate::typed::Column for $name {}
    };
}
