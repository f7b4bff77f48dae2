//! Course fee payments recorded against preinscriptions.

pub mod domain;
pub mod router;
pub mod service;

pub use domain::{
    Balance, NewPayment, Payment, PaymentMethod, PaymentStatus, VoidRequest, MAX_PAYMENT_AMOUNT,
};
pub use router::payment_router;
pub use service::{PaymentError, PaymentService};
