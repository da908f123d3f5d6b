use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::types::RowValues;

/// One entry of a parameter set: a single value, or a list that expands to one marker per element.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(RowValues),
    List(Vec<RowValues>),
}

impl ParamValue {
    /// Number of values this entry contributes once bound.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            ParamValue::Scalar(_) => 1,
            ParamValue::List(values) => values.len(),
        }
    }
}

macro_rules! scalar_param_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Scalar(RowValues::from(value))
                }
            }
        )*
    };
}

scalar_param_from!(i64, i32, u32, f64, bool, String, &str, NaiveDateTime, JsonValue);

impl From<RowValues> for ParamValue {
    fn from(value: RowValues) -> Self {
        ParamValue::Scalar(value)
    }
}

impl<T: Into<RowValues>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RowValues>, const N: usize> From<[T; N]> for ParamValue {
    fn from(values: [T; N]) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Parameters keyed by placeholder name (without the leading `:`).
pub type NamedParams = HashMap<String, ParamValue>;

/// A normalized parameter set, ready for the placeholder rewriter.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Bound to `?` markers by position.
    Positional(Vec<ParamValue>),
    /// Bound to `:name` markers by key.
    Named(NamedParams),
    /// One positional row per execution of a batch insert.
    Batch(Vec<Vec<RowValues>>),
}

impl Params {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(map) => map.len(),
            Params::Batch(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Conversion from call arguments into a parameter set.
///
/// Tuples become positional sequences, `()` is the empty sequence, and a lone scalar is wrapped
/// into a one-element sequence.
pub trait IntoParams {
    fn into_params(self) -> Params;
}

impl IntoParams for Params {
    fn into_params(self) -> Params {
        self
    }
}

impl IntoParams for NamedParams {
    fn into_params(self) -> Params {
        Params::Named(self)
    }
}

impl IntoParams for Vec<ParamValue> {
    fn into_params(self) -> Params {
        Params::Positional(self)
    }
}

impl IntoParams for Vec<Vec<RowValues>> {
    fn into_params(self) -> Params {
        Params::Batch(self)
    }
}

impl IntoParams for () {
    fn into_params(self) -> Params {
        Params::Positional(Vec::new())
    }
}

macro_rules! scalar_into_params {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoParams for $ty {
                fn into_params(self) -> Params {
                    Params::Positional(vec![ParamValue::from(self)])
                }
            }
        )*
    };
}

scalar_into_params!(i64, i32, u32, f64, bool, String, &str, RowValues, ParamValue);

macro_rules! tuple_into_params {
    ($($name:ident),+) => {
        impl<$($name: Into<ParamValue>),+> IntoParams for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_params(self) -> Params {
                let ($($name,)+) = self;
                Params::Positional(vec![$($name.into()),+])
            }
        }
    };
}

tuple_into_params!(A);
tuple_into_params!(A, B);
tuple_into_params!(A, B, C);
tuple_into_params!(A, B, C, D);
tuple_into_params!(A, B, C, D, E);
tuple_into_params!(A, B, C, D, E, F);
tuple_into_params!(A, B, C, D, E, F, G);
tuple_into_params!(A, B, C, D, E, F, G, H);
tuple_into_params!(A, B, C, D, E, F, G, H, I);
tuple_into_params!(A, B, C, D, E, F, G, H, I, J);

/// Build a positional parameter set.
///
/// ```rust
/// use sql_decorate::params;
///
/// let p = params!["x", vec!["a", "b"], 1];
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::Positional(::std::vec::Vec::new())
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Params::Positional(::std::vec![$($crate::ParamValue::from($value)),+])
    };
}

/// Build a named parameter set.
///
/// ```rust
/// use sql_decorate::named_params;
///
/// let p = named_params! { "name" => vec!["a", "b"], "cnt" => 3 };
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! named_params {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::NamedParams::new();
        $(
            map.insert(::std::string::String::from($key), $crate::ParamValue::from($value));
        )*
        $crate::Params::Named(map)
    }};
}

type ConvertFn<A> = dyn Fn(&A) -> Params + Send + Sync;
type ReturnValueFn<A> = dyn Fn(&A) -> Option<Params> + Send + Sync;

/// How a query turns its call arguments into parameters.
pub enum ParamBinder<A> {
    /// Use the call arguments as-is.
    Args(fn(A) -> Params),
    /// An explicit converter from arguments to parameters.
    Converter(Arc<ConvertFn<A>>),
    /// A body whose `Some` return value supplies the parameters; `None` falls back to the arguments.
    ReturnValue {
        body: Arc<ReturnValueFn<A>>,
        fallback: fn(A) -> Params,
    },
}

impl<A: IntoParams> ParamBinder<A> {
    #[must_use]
    pub fn args() -> Self {
        ParamBinder::Args(A::into_params)
    }

    pub fn return_value<F>(body: F) -> Self
    where
        F: Fn(&A) -> Option<Params> + Send + Sync + 'static,
    {
        ParamBinder::ReturnValue {
            body: Arc::new(body),
            fallback: A::into_params,
        }
    }
}

impl<A> ParamBinder<A> {
    pub fn converter<F>(convert: F) -> Self
    where
        F: Fn(&A) -> Params + Send + Sync + 'static,
    {
        ParamBinder::Converter(Arc::new(convert))
    }

    #[must_use]
    pub fn normalize(&self, args: A) -> Params {
        match self {
            ParamBinder::Args(into_params) => into_params(args),
            ParamBinder::Converter(convert) => convert(&args),
            ParamBinder::ReturnValue { body, fallback } => match body(&args) {
                Some(params) => params,
                None => fallback(args),
            },
        }
    }
}

impl<A> Clone for ParamBinder<A> {
    fn clone(&self) -> Self {
        match self {
            ParamBinder::Args(into_params) => ParamBinder::Args(*into_params),
            ParamBinder::Converter(f) => ParamBinder::Converter(Arc::clone(f)),
            ParamBinder::ReturnValue { body, fallback } => ParamBinder::ReturnValue {
                body: Arc::clone(body),
                fallback: *fallback,
            },
        }
    }
}

impl<A> fmt::Debug for ParamBinder<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamBinder::Args(_) => f.write_str("Args"),
            ParamBinder::Converter(_) => f.write_str("Converter(<fn>)"),
            ParamBinder::ReturnValue { .. } => f.write_str("ReturnValue(<fn>)"),
        }
    }
}
