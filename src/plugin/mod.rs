//! Interception of pipeline calls.
//!
//! An [`Interceptor`] declares [`Signature`]s; they are resolved against the
//! method tables when the interceptor is registered. Pipeline objects built
//! by the configuration are then wrapped in [`Proxy`] layers that route the
//! declared methods through the interceptor and pass everything else
//! straight to the target.

pub mod chain;
pub mod invocation;
pub mod proxy;
pub mod signature;

pub use chain::InterceptorChain;
pub use invocation::{
    Arg, ArgReader, Callee, FromArg, FromReply, Interceptor, Invocation, Reply, Target,
};
pub use proxy::{Capabilities, Pluggable, Plugged, Plugin, Proxy};
pub use signature::{methods, Capability, MethodId, ProxyBinding, Signature};
