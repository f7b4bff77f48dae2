//! Course administration backend for Scout adult training: catalogs, people, courses,
//! preinscriptions, payments and document uploads behind a REST API.

pub mod accounts;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod courses;
pub mod dashboard;
pub mod error;
pub mod notifications;
pub mod payments;
pub mod people;
pub mod preinscriptions;
pub mod records;
pub mod rut;
pub mod telemetry;
pub mod uploads;

pub use backend::{Backend, BackendOptions};
