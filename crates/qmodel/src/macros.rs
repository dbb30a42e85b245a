//! The `model!` macro: declarative table schemas.
//!
//! Generates the struct, the `Model` implementation, and per-field column
//! accessors for the query builders. Field kinds are the q kind names
//! (`Symbol`, `Float`, `Long`, …); `keyed [a, b]` marks primary-key fields.
//!
//! ```ignore
//! qmodel::model! {
//!     /// Executed trades.
//!     pub struct Trade: "trade" {
//!         sym: Symbol,
//!         price: Float,
//!         size: Long,
//!     }
//! }
//!
//! qmodel::model! {
//!     pub struct DailyPrice: "daily_price" keyed [sym, date] {
//!         sym: Symbol,
//!         date: Date,
//!         close: Float,
//!         volume: Long,
//!     }
//! }
//! ```

/// Declare a model struct bound to a table.
#[macro_export]
macro_rules! model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $table:literal $(keyed [$($key:ident),+ $(,)?])? {
            $( $(#[$fmeta:meta])* $fname:ident : $fkind:ident ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            $( $(#[$fmeta])* pub $fname : $crate::__qmodel_field_type!($fkind) ),+
        }

        impl $name {
            $(
                /// Column expression for query builders.
                pub fn $fname() -> $crate::query::Expr {
                    $crate::query::col(stringify!($fname))
                }
            )+
        }

        impl $crate::core::Model for $name {
            const TABLE_NAME: &'static str = $table;

            fn fields() -> &'static [$crate::core::FieldInfo] {
                static FIELDS: ::std::sync::OnceLock<Vec<$crate::core::FieldInfo>> =
                    ::std::sync::OnceLock::new();
                FIELDS
                    .get_or_init(|| {
                        let keys: &[&str] = <$name as $crate::core::Model>::key_fields();
                        vec![
                            $(
                                $crate::core::FieldInfo::new(
                                    stringify!($fname),
                                    $crate::__qmodel_field_kind!($fkind),
                                )
                                .primary_key(keys.contains(&stringify!($fname))),
                            )+
                        ]
                    })
                    .as_slice()
            }

            fn key_fields() -> &'static [&'static str] {
                &[$($(stringify!($key)),+)?]
            }

            fn to_row(&self) -> Vec<$crate::core::Value> {
                vec![ $( $crate::__qmodel_field_to_value!($fkind, self.$fname) ),+ ]
            }

            fn from_row(
                row: &$crate::core::RowView<'_>,
            ) -> $crate::core::Result<Self> {
                Ok(Self {
                    $( $fname: $crate::__qmodel_field_from_row!($fkind, row, stringify!($fname))? ),+
                })
            }
        }
    };
}

/// Rust storage type per q kind.
#[doc(hidden)]
#[macro_export]
macro_rules! __qmodel_field_type {
    (Boolean) => { bool };
    (Guid) => { [u8; 16] };
    (Byte) => { u8 };
    (Short) => { i16 };
    (Int) => { i32 };
    (Long) => { i64 };
    (Real) => { f32 };
    (Float) => { f64 };
    (Char) => { u8 };
    (Symbol) => { ::std::string::String };
    (Timestamp) => { i64 };
    (Month) => { i32 };
    (Date) => { i32 };
    (Datetime) => { f64 };
    (Timespan) => { i64 };
    (Minute) => { i32 };
    (Second) => { i32 };
    (Time) => { i32 };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __qmodel_field_kind {
    ($kind:ident) => {
        $crate::core::FieldKind::Atom($crate::core::QKind::$kind)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __qmodel_field_to_value {
    (Boolean, $e:expr) => { $crate::core::Value::Bool($e) };
    (Guid, $e:expr) => { $crate::core::Value::Guid($e) };
    (Byte, $e:expr) => { $crate::core::Value::Byte($e) };
    (Short, $e:expr) => { $crate::core::Value::Short($e) };
    (Int, $e:expr) => { $crate::core::Value::Int($e) };
    (Long, $e:expr) => { $crate::core::Value::Long($e) };
    (Real, $e:expr) => { $crate::core::Value::Real($e) };
    (Float, $e:expr) => { $crate::core::Value::Float($e) };
    (Char, $e:expr) => { $crate::core::Value::Char($e) };
    (Symbol, $e:expr) => {
        $crate::core::Value::Symbol(::std::clone::Clone::clone(&$e))
    };
    (Timestamp, $e:expr) => { $crate::core::Value::Timestamp($e) };
    (Month, $e:expr) => { $crate::core::Value::Month($e) };
    (Date, $e:expr) => { $crate::core::Value::Date($e) };
    (Datetime, $e:expr) => { $crate::core::Value::Datetime($e) };
    (Timespan, $e:expr) => { $crate::core::Value::Timespan($e) };
    (Minute, $e:expr) => { $crate::core::Value::Minute($e) };
    (Second, $e:expr) => { $crate::core::Value::Second($e) };
    (Time, $e:expr) => { $crate::core::Value::Time($e) };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __qmodel_field_from_row {
    (Boolean, $row:expr, $name:expr) => {
        $crate::core::model::get_bool($row, $name)
    };
    (Guid, $row:expr, $name:expr) => {
        $crate::core::model::get_guid($row, $name)
    };
    (Byte, $row:expr, $name:expr) => {
        $crate::core::model::get_byte($row, $name)
    };
    (Short, $row:expr, $name:expr) => {
        $crate::core::model::get_short($row, $name)
    };
    (Int, $row:expr, $name:expr) => {
        $crate::core::model::get_int($row, $name)
    };
    (Long, $row:expr, $name:expr) => {
        $crate::core::model::get_long($row, $name)
    };
    (Real, $row:expr, $name:expr) => {
        $crate::core::model::get_real($row, $name)
    };
    (Float, $row:expr, $name:expr) => {
        $crate::core::model::get_float($row, $name)
    };
    (Char, $row:expr, $name:expr) => {
        $crate::core::model::get_char($row, $name)
    };
    (Symbol, $row:expr, $name:expr) => {
        $crate::core::model::get_symbol($row, $name)
    };
    (Timestamp, $row:expr, $name:expr) => {
        $crate::core::model::get_temporal_i64($row, $name, $crate::core::QKind::Timestamp)
    };
    (Timespan, $row:expr, $name:expr) => {
        $crate::core::model::get_temporal_i64($row, $name, $crate::core::QKind::Timespan)
    };
    (Month, $row:expr, $name:expr) => {
        $crate::core::model::get_temporal_i32($row, $name, $crate::core::QKind::Month)
    };
    (Date, $row:expr, $name:expr) => {
        $crate::core::model::get_temporal_i32($row, $name, $crate::core::QKind::Date)
    };
    (Minute, $row:expr, $name:expr) => {
        $crate::core::model::get_temporal_i32($row, $name, $crate::core::QKind::Minute)
    };
    (Second, $row:expr, $name:expr) => {
        $crate::core::model::get_temporal_i32($row, $name, $crate::core::QKind::Second)
    };
    (Time, $row:expr, $name:expr) => {
        $crate::core::model::get_temporal_i32($row, $name, $crate::core::QKind::Time)
    };
    (Datetime, $row:expr, $name:expr) => {
        $crate::core::model::get_datetime($row, $name)
    };
}
