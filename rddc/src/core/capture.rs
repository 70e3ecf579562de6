//! Functions shipped inside task descriptors.
//!
//! A captured function is an *entry* function pointer plus an explicit, named
//! environment of captured values. Entries are plain `fn` items (usually a
//! generic instantiated for the dataset's element types) which read the user
//! function and its parameters back out of the environment on the worker.
//! Every bound value is serialized at bind time, so later changes to the
//! caller's locals never reach a descriptor.

use std::{collections::BTreeMap, fmt};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_fp::{FunctionPointer, Fp};
use serde_json::Value;

use crate::error::{CaptureError, TaskError};

/// Full, ordered contents of one partition as they travel between workers.
pub type Partition = Vec<Value>;

/// `creator(args[i])` populates partition `i` of a CREATE descriptor.
pub type CreatorFn = fn(&Env, Value) -> Result<Partition, TaskError>;
/// Replaces the contents of one partition (MAP).
pub type PartitionFn = fn(&Env, Partition) -> Result<Partition, TaskError>;
/// Picks the target partition of a single element (REPARTITION).
pub type AssignFn = fn(&Env, &Value) -> Result<usize, TaskError>;
/// Turns a partition (or the ordered partials) into one value (REDUCE).
pub type ReduceFn = fn(&Env, Partition) -> Result<Value, TaskError>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Env(BTreeMap<String, Value>);

impl Env {
    pub fn get<D: DeserializeOwned>(&self, name: &str) -> Result<D, TaskError> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| TaskError::Unbound(name.to_string()))?;
        D::deserialize(value).map_err(|source| TaskError::BadBinding {
            name: name.to_string(),
            source,
        })
    }

    /// Reads back a function pointer bound with [`Capture::bind_fn`].
    pub fn get_fn<F: FunctionPointer>(&self, name: &str) -> Result<F, TaskError> {
        self.get::<Fp<F>>(name).map(|Fp(f)| f)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CapturedFn<F: FunctionPointer> {
    #[serde(with = "serde_fp")]
    entry: F,
    env: Env,
}

impl<F: FunctionPointer> CapturedFn<F> {
    pub fn entry(&self) -> F {
        self.entry
    }

    pub fn env(&self) -> &Env {
        &self.env
    }
}

impl<F: FunctionPointer> fmt::Debug for CapturedFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedFn")
            .field("entry", &Fp(self.entry))
            .field("env", &self.env)
            .finish()
    }
}

impl CapturedFn<CreatorFn> {
    pub fn call(&self, arg: Value) -> Result<Partition, TaskError> {
        (self.entry)(&self.env, arg)
    }
}

impl CapturedFn<PartitionFn> {
    pub fn call(&self, partition: Partition) -> Result<Partition, TaskError> {
        (self.entry)(&self.env, partition)
    }
}

impl CapturedFn<AssignFn> {
    pub fn call(&self, element: &Value) -> Result<usize, TaskError> {
        (self.entry)(&self.env, element)
    }
}

impl CapturedFn<ReduceFn> {
    pub fn call(&self, values: Partition) -> Result<Value, TaskError> {
        (self.entry)(&self.env, values)
    }
}

/// Builder for [`CapturedFn`].
///
/// ```ignore
/// let func = Capture::new(scale_entry as PartitionFn)
///     .bind("factor", &factor)
///     .seal(&["factor"])?;
/// ```
pub struct Capture<F> {
    entry: F,
    env: BTreeMap<String, Value>,
    failure: Option<CaptureError>,
}

impl<F: FunctionPointer> Capture<F> {
    pub fn new(entry: F) -> Self {
        Self {
            entry,
            env: BTreeMap::new(),
            failure: None,
        }
    }

    /// Snapshots `value` under `name`. The first failure is kept and reported
    /// by [`Capture::seal`].
    pub fn bind<S: Serialize + ?Sized>(mut self, name: &str, value: &S) -> Self {
        if self.failure.is_some() {
            return self;
        }
        match serde_json::to_value(value) {
            Ok(value) => {
                self.env.insert(name.to_string(), value);
            }
            Err(source) => {
                self.failure = Some(CaptureError::Uncapturable {
                    name: name.to_string(),
                    source,
                })
            }
        }
        self
    }

    pub fn bind_fn<P: FunctionPointer>(self, name: &str, f: P) -> Self {
        self.bind(name, &Fp(f))
    }

    /// Fails if any binding failed or any of `required` was never bound.
    pub fn seal(self, required: &[&str]) -> Result<CapturedFn<F>, CaptureError> {
        if let Some(failure) = self.failure {
            return Err(failure);
        }
        let env = Env(self.env);
        if let Some(missing) = required.iter().find(|name| !env.contains(name)) {
            return Err(CaptureError::MissingBinding(missing.to_string()));
        }
        Ok(CapturedFn {
            entry: self.entry,
            env,
        })
    }
}
