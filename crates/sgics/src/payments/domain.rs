use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::records::{Record, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Card,
    Voucher,
}

impl PaymentMethod {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cash => "Efectivo",
            Self::Transfer => "Transferencia",
            Self::Card => "Tarjeta",
            Self::Voucher => "Vale",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Registered,
    Voided,
}

/// Money received for a preinscription, in CLP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub id: RecordId,
    pub preinscription_id: RecordId,
    pub amount: u64,
    pub method: PaymentMethod,
    pub paid_on: NaiveDate,
    #[serde(default)]
    pub reference: Option<String>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub void_reason: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl Payment {
    pub fn counts(&self) -> bool {
        self.status == PaymentStatus::Registered
    }
}

impl Record for Payment {
    const RESOURCE: &'static str = "payment";

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

/// Largest single payment accepted, in CLP.
pub const MAX_PAYMENT_AMOUNT: u64 = 100_000_000;

/// Payload for registering a payment. `paid_on` defaults to today.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    pub preinscription_id: RecordId,
    pub amount: u64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub paid_on: Option<NaiveDate>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoidRequest {
    pub reason: String,
}

/// Fee position of one preinscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub preinscription_id: RecordId,
    pub fee: u64,
    pub paid: u64,
    pub outstanding: u64,
    pub overpaid: u64,
}

impl Balance {
    pub fn compute(preinscription_id: RecordId, fee: u64, payments: &[Payment]) -> Self {
        let paid = payments
            .iter()
            .filter(|payment| payment.preinscription_id == preinscription_id && payment.counts())
            .fold(0u64, |total, payment| total.saturating_add(payment.amount));
        Self::with_paid(preinscription_id, fee, paid)
    }

    fn with_paid(preinscription_id: RecordId, fee: u64, paid: u64) -> Self {
        Self {
            preinscription_id,
            fee,
            paid,
            outstanding: fee.saturating_sub(paid),
            overpaid: paid.saturating_sub(fee),
        }
    }

    /// Balance once `amount` more is paid, or `None` if the total no longer fits.
    pub fn after_payment(&self, amount: u64) -> Option<Self> {
        let paid = self.paid.checked_add(amount)?;
        Some(Self::with_paid(self.preinscription_id, self.fee, paid))
    }

    pub fn settled(&self) -> bool {
        self.outstanding == 0
    }
}
