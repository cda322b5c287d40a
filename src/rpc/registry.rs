//! Write-once service registry.
//!
//! [`ServiceRegistry`] maps a service name to a [`ServiceEntry`], which maps
//! method names to [`MethodEntry`]s. Each entry carries a strongly-typed
//! handler fixed at registration time: the handler decodes the raw parameter
//! payload into the method's declared argument type, calls the method on the
//! shared receiver, and encodes the result.
//!
//! # Concurrency
//!
//! Registration takes `&mut self` and therefore completes before the
//! registry is moved into the [`super::Dispatcher`]. From then on it is only
//! reachable through shared references, so lookups need no locking.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::error::{LookupError, ParamsError, RegisterError};

/// Boxed future returned by a bound method.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Outcome of invoking a method: the encoded result on success, the
/// failure description otherwise.
pub type Outcome = Result<Box<RawValue>, String>;

type Handler = dyn Fn(Option<&RawValue>) -> Result<BoxFuture<Outcome>, ParamsError> + Send + Sync;

/// A type whose methods can be exposed through the registry.
///
/// Implementors list their callable methods in [`RpcService::methods`].
/// Each method takes the shared receiver and at most one argument
/// structure, and returns one result structure or an error.
///
/// ```ignore
/// struct Arith;
///
/// impl Arith {
///     async fn add(self: Arc<Self>, args: AddArgs) -> Result<i64, Infallible> {
///         Ok(args.a + args.b)
///     }
/// }
///
/// impl RpcService for Arith {
///     fn methods(set: &mut MethodSet<Self>) {
///         set.with_params("Add", Self::add);
///     }
/// }
/// ```
pub trait RpcService: Send + Sync + Sized + 'static {
    /// Declares the methods this receiver exposes.
    fn methods(set: &mut MethodSet<Self>);
}

/// One callable method of a service.
pub struct MethodEntry {
    name: String,
    params_type: Option<&'static str>,
    result_type: &'static str,
    handler: Box<Handler>,
}

impl MethodEntry {
    /// Method name, unique within its service.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type name of the declared argument structure, if any.
    #[must_use]
    pub fn params_type(&self) -> Option<&'static str> {
        self.params_type
    }

    /// Type name of the declared result structure.
    #[must_use]
    pub fn result_type(&self) -> &'static str {
        self.result_type
    }

    /// Returns `true` if the method declares an argument structure.
    #[must_use]
    pub fn accepts_params(&self) -> bool {
        self.params_type.is_some()
    }

    /// Decodes `params` against the declared argument type and returns the
    /// pending invocation.
    ///
    /// Methods without an argument structure ignore `params`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::Missing`] if the method needs parameters and
    /// none were given, or [`ParamsError::Malformed`] if they do not decode.
    pub fn bind(&self, params: Option<&RawValue>) -> Result<BoxFuture<Outcome>, ParamsError> {
        (self.handler)(params)
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("params_type", &self.params_type)
            .field("result_type", &self.result_type)
            .finish_non_exhaustive()
    }
}

/// A named group of methods sharing one receiver.
#[derive(Debug)]
pub struct ServiceEntry {
    name: String,
    receiver_type: &'static str,
    methods: HashMap<String, MethodEntry>,
}

impl ServiceEntry {
    /// Service name as registered.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type name of the receiver backing this service.
    #[must_use]
    pub fn receiver_type(&self) -> &'static str {
        self.receiver_type
    }

    /// Looks up a method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.get(name)
    }

    /// Iterates over all methods of this service.
    pub fn methods(&self) -> impl Iterator<Item = &MethodEntry> {
        self.methods.values()
    }
}

/// Collects the methods of one receiver during registration.
pub struct MethodSet<S> {
    receiver: Arc<S>,
    methods: HashMap<String, MethodEntry>,
}

impl<S: RpcService> MethodSet<S> {
    fn new(receiver: Arc<S>) -> Self {
        Self {
            receiver,
            methods: HashMap::new(),
        }
    }

    /// Exposes a method taking one argument structure `P`.
    pub fn with_params<P, R, E, F, Fut>(&mut self, name: &str, method: F) -> &mut Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(Arc<S>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let receiver = Arc::clone(&self.receiver);
        let handler: Box<Handler> = Box::new(
            move |params: Option<&RawValue>| -> Result<BoxFuture<Outcome>, ParamsError> {
                let raw = params.ok_or(ParamsError::Missing)?;
                let args: P = serde_json::from_str(raw.get()).map_err(ParamsError::Malformed)?;
                let pending = method(Arc::clone(&receiver), args);
                let invocation: BoxFuture<Outcome> =
                    Box::pin(async move { into_outcome(pending.await) });
                Ok(invocation)
            },
        );
        self.insert(name, Some(type_name::<P>()), type_name::<R>(), handler)
    }

    /// Exposes a method taking no argument structure. Any supplied
    /// parameters are ignored.
    pub fn without_params<R, E, F, Fut>(&mut self, name: &str, method: F) -> &mut Self
    where
        R: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let receiver = Arc::clone(&self.receiver);
        let handler: Box<Handler> = Box::new(
            move |_params: Option<&RawValue>| -> Result<BoxFuture<Outcome>, ParamsError> {
                let pending = method(Arc::clone(&receiver));
                let invocation: BoxFuture<Outcome> =
                    Box::pin(async move { into_outcome(pending.await) });
                Ok(invocation)
            },
        );
        self.insert(name, None, type_name::<R>(), handler)
    }

    fn insert(
        &mut self,
        name: &str,
        params_type: Option<&'static str>,
        result_type: &'static str,
        handler: Box<Handler>,
    ) -> &mut Self {
        let entry = MethodEntry {
            name: name.to_string(),
            params_type,
            result_type,
            handler,
        };
        if self.methods.insert(name.to_string(), entry).is_some() {
            tracing::debug!(method = name, "method redefined, keeping the last definition");
        }
        self
    }
}

impl<S> fmt::Debug for MethodSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSet")
            .field("receiver", &type_name::<S>())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Failure message for a method whose value encodes as JSON `null`.
const NULL_RESULT: &str = "result is null";

/// Encodes a method's return value. The result holder is dropped on failure.
///
/// A value encoding to `null` (`None`, `()`) is a failure: a success
/// envelope must carry a non-null `result`.
fn into_outcome<R: Serialize, E: fmt::Display>(returned: Result<R, E>) -> Outcome {
    match returned {
        Ok(result) => {
            let raw = serde_json::value::to_raw_value(&result)
                .map_err(|err| format!("failed to encode result: {err}"))?;
            if raw.get() == "null" {
                return Err(NULL_RESULT.to_string());
            }
            Ok(raw)
        }
        Err(err) => Err(format!("{err:#}")),
    }
}

/// Splits a combined method identifier into `(service, method)`.
///
/// The first `.` separates the parts; identifiers without a dot fall back to
/// the first `_`.
///
/// # Errors
///
/// Returns [`LookupError::IllFormed`] when no separator is present or
/// either part is empty.
pub fn split_method_name(identifier: &str) -> Result<(&str, &str), LookupError> {
    let parts = identifier
        .split_once('.')
        .or_else(|| identifier.split_once('_'));
    match parts {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => {
            Ok((service, method))
        }
        _ => Err(LookupError::IllFormed(identifier.to_string())),
    }
}

/// Map from service name to its methods.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceEntry>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every method `receiver` declares under `service_name`.
    ///
    /// An empty `service_name` falls back to the receiver's type name.
    /// Registering an existing name replaces the previous service.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoMethods`] if the receiver declares no
    /// methods.
    pub fn register<S: RpcService>(
        &mut self,
        receiver: S,
        service_name: &str,
    ) -> Result<&mut Self, RegisterError> {
        let receiver_type = type_name::<S>();
        let name = if service_name.is_empty() {
            short_type_name(receiver_type).to_string()
        } else {
            service_name.to_string()
        };

        let mut set = MethodSet::new(Arc::new(receiver));
        S::methods(&mut set);
        if set.methods.is_empty() {
            return Err(RegisterError::NoMethods(name));
        }

        let entry = ServiceEntry {
            name: name.clone(),
            receiver_type,
            methods: set.methods,
        };
        if self.services.insert(name.clone(), entry).is_some() {
            tracing::warn!(service = %name, "service re-registered, replacing previous entry");
        }
        Ok(self)
    }

    /// Finds a method by service and method name.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::ServiceNotFound`] or
    /// [`LookupError::MethodNotFound`].
    pub fn lookup(
        &self,
        service: &str,
        method: &str,
    ) -> Result<(&ServiceEntry, &MethodEntry), LookupError> {
        let entry = self
            .services
            .get(service)
            .ok_or_else(|| LookupError::ServiceNotFound(service.to_string()))?;
        let method_entry = entry
            .methods
            .get(method)
            .ok_or_else(|| LookupError::MethodNotFound {
                service: service.to_string(),
                method: method.to_string(),
            })?;
        Ok((entry, method_entry))
    }

    /// Parses a combined identifier and looks the method up.
    ///
    /// # Errors
    ///
    /// Returns any [`LookupError`], including [`LookupError::IllFormed`]
    /// for identifiers without a separator.
    pub fn resolve(&self, identifier: &str) -> Result<(&ServiceEntry, &MethodEntry), LookupError> {
        let (service, method) = split_method_name(identifier)?;
        self.lookup(service, method)
    }

    /// Sorted names of all registered services.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.services.keys().cloned().collect();
        names.sort();
        names
    }

    /// Sorted `"<service>.<method>"` identifiers of all registered methods.
    #[must_use]
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .services
            .values()
            .flat_map(|svc| svc.methods().map(move |m| format!("{}.{}", svc.name, m.name)))
            .collect();
        names.sort();
        names
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no service is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    full.rsplit("::").next().unwrap_or(full)
}
