//! Convenient imports for common functionality.

pub use crate::config::PoolConfig;
pub use crate::error::{BindingError, SqlDecorateError};
pub use crate::params::{IntoParams, NamedParams, ParamValue, Params};
pub use crate::pool::Database;
pub use crate::query::{Query, QueryDefinition, QueryKind, QueryOutput};
pub use crate::results::{MappedRow, Row};
pub use crate::transaction::{in_transaction, transactional};
pub use crate::types::RowValues;
pub use crate::{named_params, params};
