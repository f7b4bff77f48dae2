use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{Balance, NewPayment, Payment, PaymentStatus, MAX_PAYMENT_AMOUNT};
use crate::courses::Course;
use crate::error::ApiError;
use crate::notifications::{format_clp, EmailTemplate, Notifier};
use crate::people::Person;
use crate::preinscriptions::{Preinscription, PreinscriptionStatus};
use crate::records::{RecordId, Repository, RepositoryError, ValidationError};

/// Registers and voids payments and keeps fee balances per preinscription.
pub struct PaymentService {
    payments: Arc<dyn Repository<Payment>>,
    preinscriptions: Arc<dyn Repository<Preinscription>>,
    people: Arc<dyn Repository<Person>>,
    courses: Arc<dyn Repository<Course>>,
    notifier: Notifier,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn Repository<Payment>>,
        preinscriptions: Arc<dyn Repository<Preinscription>>,
        people: Arc<dyn Repository<Person>>,
        courses: Arc<dyn Repository<Course>>,
        notifier: Notifier,
    ) -> Self {
        Self {
            payments,
            preinscriptions,
            people,
            courses,
            notifier,
        }
    }

    pub fn register(&self, request: NewPayment) -> Result<Payment, PaymentError> {
        if request.amount == 0 {
            return Err(PaymentError::Invalid(ValidationError::new(
                "amount",
                "amount must be greater than zero",
            )));
        }
        if request.amount > MAX_PAYMENT_AMOUNT {
            return Err(PaymentError::Invalid(ValidationError::new(
                "amount",
                format!("amount must not exceed {}", format_clp(MAX_PAYMENT_AMOUNT)),
            )));
        }

        let preinscription = self.preinscription(request.preinscription_id)?;
        if !preinscription.status.is_active() {
            return Err(PaymentError::InactivePreinscription {
                id: preinscription.id,
                status: preinscription.status,
            });
        }

        let balance = self
            .balance_of(&preinscription)?
            .after_payment(request.amount)
            .ok_or_else(|| {
                PaymentError::Invalid(ValidationError::new(
                    "amount",
                    format!(
                        "payments for preinscription {} would exceed the accountable total",
                        preinscription.id
                    ),
                ))
            })?;

        let payment = Payment {
            id: 0,
            preinscription_id: preinscription.id,
            amount: request.amount,
            method: request.method,
            paid_on: request
                .paid_on
                .unwrap_or_else(|| Utc::now().date_naive()),
            reference: request
                .reference
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            status: PaymentStatus::Registered,
            void_reason: None,
            registered_at: Utc::now(),
        };
        let stored = self.payments.insert(payment)?;
        info!(
            payment_id = stored.id,
            preinscription_id = stored.preinscription_id,
            amount = stored.amount,
            method = stored.method.label(),
            "payment registered"
        );

        self.send_receipt(&preinscription, &stored, &balance);
        Ok(stored)
    }

    pub fn void(&self, id: RecordId, reason: &str) -> Result<Payment, PaymentError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PaymentError::Invalid(ValidationError::new(
                "reason",
                "a reason is required to void a payment",
            )));
        }

        let mut payment = self.get(id)?;
        if payment.status == PaymentStatus::Voided {
            return Err(PaymentError::AlreadyVoided(id));
        }
        payment.status = PaymentStatus::Voided;
        payment.void_reason = Some(reason.to_string());

        let stored = self.payments.update(payment)?;
        info!(payment_id = id, reason, "payment voided");
        Ok(stored)
    }

    pub fn get(&self, id: RecordId) -> Result<Payment, PaymentError> {
        self.payments.fetch(id)?.ok_or(PaymentError::NotFound(id))
    }

    pub fn list(&self, preinscription_id: Option<RecordId>) -> Result<Vec<Payment>, PaymentError> {
        Ok(self
            .payments
            .list()?
            .into_iter()
            .filter(|payment| preinscription_id.map_or(true, |id| payment.preinscription_id == id))
            .collect())
    }

    pub fn balance(&self, preinscription_id: RecordId) -> Result<Balance, PaymentError> {
        let preinscription = self.preinscription(preinscription_id)?;
        self.balance_of(&preinscription)
    }

    fn balance_of(&self, preinscription: &Preinscription) -> Result<Balance, PaymentError> {
        let fee = self.course_fee(preinscription.course_id)?;
        Ok(Balance::compute(
            preinscription.id,
            fee,
            &self.payments.list()?,
        ))
    }

    fn preinscription(&self, id: RecordId) -> Result<Preinscription, PaymentError> {
        self.preinscriptions
            .fetch(id)?
            .ok_or(PaymentError::PreinscriptionNotFound(id))
    }

    fn course_fee(&self, course_id: RecordId) -> Result<u64, PaymentError> {
        Ok(self
            .courses
            .fetch(course_id)?
            .map(|course| course.fee)
            .unwrap_or_default())
    }

    fn send_receipt(
        &self,
        preinscription: &Preinscription,
        payment: &Payment,
        balance: &Balance,
    ) {
        let (Ok(Some(person)), Ok(Some(course))) = (
            self.people.fetch(preinscription.person_id),
            self.courses.fetch(preinscription.course_id),
        ) else {
            return;
        };
        let outstanding = if balance.settled() {
            format!("{} (curso pagado)", format_clp(balance.outstanding))
        } else {
            format_clp(balance.outstanding)
        };

        let mut context = BTreeMap::new();
        context.insert("person_name".to_string(), person.full_name());
        context.insert("course_name".to_string(), course.name.clone());
        context.insert("course_code".to_string(), course.code.clone());
        context.insert("amount".to_string(), format_clp(payment.amount));
        context.insert("outstanding".to_string(), outstanding);

        self.notifier.notify(
            EmailTemplate::PaymentReceived,
            person.email.as_deref(),
            &context,
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment {0} not found")]
    NotFound(RecordId),
    #[error("preinscription {0} does not exist")]
    PreinscriptionNotFound(RecordId),
    #[error("preinscription {id} is {status}; payments are not accepted")]
    InactivePreinscription {
        id: RecordId,
        status: PreinscriptionStatus,
    },
    #[error("payment {0} is already voided")]
    AlreadyVoided(RecordId),
    #[error(transparent)]
    Invalid(ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<PaymentError> for ApiError {
    fn from(value: PaymentError) -> Self {
        match value {
            PaymentError::NotFound(id) => ApiError::not_found("payment", id),
            PaymentError::PreinscriptionNotFound(_) => {
                ValidationError::new("preinscription_id", value.to_string()).into()
            }
            PaymentError::InactivePreinscription { .. } | PaymentError::AlreadyVoided(_) => {
                ApiError::Rule(value.to_string())
            }
            PaymentError::Invalid(err) => ApiError::Validation(err),
            PaymentError::Repository(err) => ApiError::Repository(err),
        }
    }
}
