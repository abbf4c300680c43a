//! Method hooks, route handlers, and the per-method hook registry.
//!
//! This is the policy core of the layer: **hook overrides, default
//! underlies**. Each built-in route consults the [`HookRegistry`] for the
//! request's method before doing anything itself. An installed
//! [`RequestHook`] can claim the request by returning
//! [`HookOutcome::Handled`], or wave it through with
//! [`HookOutcome::NotHandled`], in which case the builtin route table runs
//! exactly as if no hook existed.
//!
//! At most one hook exists per method. Registering a new one replaces the
//! previous one atomically; request workers never observe a torn entry, and
//! their lookups never block on a concurrent registration.
//!
//! # Examples
//!
//! ```
//! use hookwire_core::prelude::*;
//! use http::StatusCode;
//!
//! let registry = HookRegistry::new();
//!
//! // Intercept every GET, whatever its path.
//! registry.set(
//!     Method::Get,
//!     Some(hook(|_req: Request| async {
//!         Ok(HookOutcome::Handled(
//!             Response::new(StatusCode::CREATED).with_body("hooked"),
//!         ))
//!     })),
//! );
//!
//! // Remove it again; GETs fall back to default behavior.
//! registry.set(Method::Get, None);
//! ```

use crate::error::Result;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// What a [`RequestHook`] decided to do with a request.
#[derive(Debug)]
pub enum HookOutcome {
    /// The hook produced the response; default behavior is skipped.
    Handled(Response),
    /// The hook declined; the builtin route for this request runs instead.
    NotHandled,
}

/// An externally supplied handler that intercepts requests of one method.
///
/// Implementations receive the request by reference and must not assume
/// anything about the connection beyond producing (or declining to produce)
/// a response.
#[async_trait]
pub trait RequestHook: Send + Sync + 'static {
    /// Offers the request to the hook.
    ///
    /// Returning `Ok(HookOutcome::NotHandled)` is the sentinel that re-enables
    /// default behavior. Returning `Err` yields a well-formed 500 to the
    /// client; it never unwinds past the dispatch boundary.
    async fn handle(&self, req: &Request) -> Result<HookOutcome>;
}

struct FnHook<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> RequestHook for FnHook<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookOutcome>> + Send + 'static,
{
    async fn handle(&self, req: &Request) -> Result<HookOutcome> {
        (self.f)(req.clone()).await
    }
}

/// Wraps an async function as a [`RequestHook`].
///
/// # Examples
///
/// ```
/// use hookwire_core::prelude::*;
///
/// let h = hook(|req: Request| async move {
///     if req.path() == "/intercepted" {
///         Ok(HookOutcome::Handled(Response::text("mine")))
///     } else {
///         Ok(HookOutcome::NotHandled)
///     }
/// });
/// ```
pub fn hook<F, Fut>(f: F) -> Arc<dyn RequestHook>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookOutcome>> + Send + 'static,
{
    Arc::new(FnHook { f })
}

/// A builtin route handler: always produces a response for its route.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handles one request routed to this handler.
    async fn call(&self, req: Request) -> Result<Response>;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    async fn call(&self, req: Request) -> Result<Response> {
        (self.f)(req).await
    }
}

/// Wraps an async function as a route [`Handler`].
///
/// # Examples
///
/// ```
/// use hookwire_core::prelude::*;
///
/// let h = handler(|_req: Request| async { Ok(Response::text("pong")) });
/// ```
pub fn handler<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Maps each supported method to at most one [`RequestHook`].
///
/// Backed by a [`DashMap`] keyed on [`Method`], so lookups from request
/// workers are O(1) and never block while another thread replaces an entry.
///
/// # Examples
///
/// ```
/// use hookwire_core::prelude::*;
///
/// let registry = HookRegistry::new();
/// assert!(registry.get(Method::Post).is_none());
///
/// registry.set(Method::Post, Some(hook(|_req: Request| async {
///     Ok(HookOutcome::NotHandled)
/// })));
/// assert!(registry.get(Method::Post).is_some());
/// ```
pub struct HookRegistry {
    hooks: DashMap<Method, Arc<dyn RequestHook>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            hooks: DashMap::new(),
        }
    }

    /// Installs, replaces, or removes the hook for a method.
    ///
    /// `Some(h)` replaces any previous hook for the method; `None` removes
    /// it, restoring default behavior for subsequent requests.
    pub fn set(&self, method: Method, hook: Option<Arc<dyn RequestHook>>) {
        match hook {
            Some(h) => {
                self.hooks.insert(method, h);
                debug!("hook installed for {}", method);
            }
            None => {
                self.hooks.remove(&method);
                debug!("hook removed for {}", method);
            }
        }
    }

    /// Returns the hook currently installed for a method, if any.
    pub fn get(&self, method: Method) -> Option<Arc<dyn RequestHook>> {
        self.hooks.get(&method).map(|e| e.value().clone())
    }

    /// Removes every installed hook.
    pub fn clear(&self) {
        self.hooks.clear();
    }

    /// The number of methods with a hook installed.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are installed.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn get_request() -> Request {
        Request::new(Method::Get, "/", vec![], "")
    }

    #[tokio::test]
    async fn test_set_and_invoke_hook() {
        let registry = HookRegistry::new();
        registry.set(
            Method::Get,
            Some(hook(|_req: Request| async {
                Ok(HookOutcome::Handled(
                    Response::new(StatusCode::CREATED).with_body("hooked"),
                ))
            })),
        );

        let h = registry.get(Method::Get).unwrap();
        match h.handle(&get_request()).await.unwrap() {
            HookOutcome::Handled(resp) => assert_eq!(resp.status(), StatusCode::CREATED),
            HookOutcome::NotHandled => panic!("hook should have handled the request"),
        }
    }

    #[tokio::test]
    async fn test_replace_hook_last_write_wins() {
        let registry = HookRegistry::new();
        registry.set(
            Method::Put,
            Some(hook(|_req: Request| async {
                Ok(HookOutcome::Handled(Response::text("first")))
            })),
        );
        registry.set(
            Method::Put,
            Some(hook(|_req: Request| async {
                Ok(HookOutcome::Handled(Response::text("second")))
            })),
        );

        let h = registry.get(Method::Put).unwrap();
        match h.handle(&get_request()).await.unwrap() {
            HookOutcome::Handled(resp) => assert_eq!(resp.body().as_ref(), b"second"),
            HookOutcome::NotHandled => panic!("hook should have handled the request"),
        }
    }

    #[tokio::test]
    async fn test_none_removes_hook() {
        let registry = HookRegistry::new();
        registry.set(
            Method::Delete,
            Some(hook(|_req: Request| async { Ok(HookOutcome::NotHandled) })),
        );
        assert_eq!(registry.len(), 1);

        registry.set(Method::Delete, None);
        assert!(registry.get(Method::Delete).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_miss_for_other_methods() {
        let registry = HookRegistry::new();
        registry.set(
            Method::Get,
            Some(hook(|_req: Request| async { Ok(HookOutcome::NotHandled) })),
        );
        for m in Method::ALL {
            assert_eq!(registry.get(m).is_some(), m == Method::Get);
        }
    }

    #[tokio::test]
    async fn test_handler_adaptor() {
        let h = handler(|req: Request| async move {
            Ok(Response::text(format!("echo {}", req.path())))
        });
        let resp = h.call(get_request()).await.unwrap();
        assert_eq!(resp.body().as_ref(), b"echo /");
    }
}
