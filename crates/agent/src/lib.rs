//! Agent action envelopes over plain HTTP routes.
//!
//! An agent caller POSTs a JSON envelope describing an API call (path, method,
//! parameters, body) to one well-known path. The middleware here rewrites that
//! into the request the envelope describes, lets the normal router handle it,
//! and wraps the result back into the envelope shape the caller expects.

pub mod envelope;
pub mod middleware;
pub mod rewrite;

pub use envelope::{ActionInvocation, ActionResponse, ActionResponseEnvelope, Parameter};
pub use middleware::{agent_envelope, envelope_router, AgentConfig};
pub use rewrite::RewriteError;
