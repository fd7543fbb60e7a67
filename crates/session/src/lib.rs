//! Status tracking for one upload session.
//!
//! - [`poller::StatusPoller`] polls a job's status with adaptive backoff,
//!   counts transient failures, and pauses/resumes on request.
//! - [`events::PollEvent`] is what the poller reports back.
//! - [`collaborators::Collaborators`] is the narrow UI capability set the
//!   session drives; [`collaborators::WakeLockGuard`] scopes the keep-awake
//!   resource.
//! - [`controller::LifecycleController`] ties submission, polling, and the
//!   collaborators together.

pub mod collaborators;
pub mod controller;
pub mod events;
pub mod poller;
