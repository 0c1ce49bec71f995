//! Declarative macros for step authoring
//!
//! Small helpers that cut the `String` conversion boilerplate when
//! building exec argument vectors and template variable maps.

/// Creates a `Vec<String>` argument vector from string-like expressions
#[macro_export]
macro_rules! argv {
    ($($arg:expr),* $(,)?) => {
        ::std::vec![$(::std::string::String::from($arg)),*]
    };
}

/// Creates a [`VariableMap`](crate::template::VariableMap) from `key => value` pairs
///
/// Values are anything `serde_json::Value` converts from.
#[macro_export]
macro_rules! vars {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let map = $crate::template::VariableMap::new();
        $(let map = map.set($key, ::serde_json::Value::from($value));)*
        map
    }};
}
