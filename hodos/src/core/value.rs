use serde::de::DeserializeOwned;
use serde::Serialize;

/// Boxed error returned by user transforms.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Bound on the values that flow between steps.
///
/// Values are cloned when one parent feeds several children, serialized when
/// they are cached, and moved across threads when transforms run on the
/// blocking pool.
pub trait Value: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}
