//! Probe trait and observation type
//!
//! A probe is whatever reads the current state of the remote resource. The
//! waiter calls it once per poll and never retries it; retrying transient
//! failures is the probe's own business.

use std::future::Future;

use async_trait::async_trait;

use crate::error::ProbeError;

/// Result of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation<T> {
    /// Resource snapshot, `None` when the resource was not found
    pub payload: Option<T>,
    /// State label reported for the resource
    pub state: String,
}

impl<T> Observation<T> {
    /// Resource found in `state`
    pub fn found(payload: T, state: impl Into<String>) -> Self {
        Self {
            payload: Some(payload),
            state: state.into(),
        }
    }

    /// Resource not found
    #[must_use]
    pub fn absent() -> Self {
        Self {
            payload: None,
            state: String::new(),
        }
    }

    /// Check if the resource was not found
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.payload.is_none()
    }
}

/// Status check invoked once per poll
#[async_trait]
pub trait Probe: Send + Sync {
    /// Resource snapshot returned to the caller
    type Payload: Send;

    /// Read the current state of the resource
    async fn probe(&self) -> Result<Observation<Self::Payload>, ProbeError>;
}

#[async_trait]
impl<P: Probe + ?Sized> Probe for &P {
    type Payload = P::Payload;

    async fn probe(&self) -> Result<Observation<Self::Payload>, ProbeError> {
        (**self).probe().await
    }
}

#[async_trait]
impl<P: Probe + ?Sized> Probe for Box<P> {
    type Payload = P::Payload;

    async fn probe(&self) -> Result<Observation<Self::Payload>, ProbeError> {
        (**self).probe().await
    }
}

/// Probe backed by a closure, see [`probe_fn`]
#[derive(Debug, Clone)]
pub struct FnProbe<F> {
    f: F,
}

/// Wrap an async closure as a [`Probe`]
///
/// The closure typically captures a client and a resource identifier. The
/// future it returns must own what it uses, so clone shared handles into an
/// `async move` block:
///
/// ```
/// use settle_core::{Observation, ProbeError, probe_fn};
///
/// let probe = probe_fn(|| async { Ok::<_, ProbeError>(Observation::found((), "ACTIVE")) });
/// # let _ = probe;
/// ```
pub fn probe_fn<F, Fut, T>(f: F) -> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Observation<T>, ProbeError>> + Send + 'static,
    T: Send,
{
    FnProbe { f }
}

#[async_trait]
impl<F, Fut, T> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Observation<T>, ProbeError>> + Send + 'static,
    T: Send,
{
    type Payload = T;

    async fn probe(&self) -> Result<Observation<T>, ProbeError> {
        (self.f)().await
    }
}
