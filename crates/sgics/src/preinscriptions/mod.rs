//! Course preinscriptions and their review workflow.
//!
//! A preinscription starts as a draft and moves through
//! `draft → submitted → in_review → validated → confirmed`, with `rejected` and
//! `cancelled` as the other terminal states. Confirmation consumes a course seat.

pub mod domain;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    workflow, Preinscription, PreinscriptionStatus, StatusChange, TransitionError, WorkflowStep,
};
pub use router::preinscription_router;
pub use service::{
    NewPreinscription, PreinscriptionError, PreinscriptionFilter, PreinscriptionService,
    TransitionRequest,
};
