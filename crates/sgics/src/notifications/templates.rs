use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// E-mails sent to participants as their preinscription moves through the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    PreinscriptionSubmitted,
    PreinscriptionValidated,
    PreinscriptionConfirmed,
    PreinscriptionRejected,
    PaymentReceived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template variable '{0}' has no value")]
    MissingVariable(String),
    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

impl EmailTemplate {
    pub const fn key(self) -> &'static str {
        match self {
            Self::PreinscriptionSubmitted => "preinscription_submitted",
            Self::PreinscriptionValidated => "preinscription_validated",
            Self::PreinscriptionConfirmed => "preinscription_confirmed",
            Self::PreinscriptionRejected => "preinscription_rejected",
            Self::PaymentReceived => "payment_received",
        }
    }

    const fn subject_source(self) -> &'static str {
        match self {
            Self::PreinscriptionSubmitted => "Preinscripción recibida: {{course_name}}",
            Self::PreinscriptionValidated => "Preinscripción validada: {{course_name}}",
            Self::PreinscriptionConfirmed => "Cupo confirmado: {{course_name}}",
            Self::PreinscriptionRejected => "Preinscripción rechazada: {{course_name}}",
            Self::PaymentReceived => "Pago recibido: {{course_name}}",
        }
    }

    const fn body_source(self) -> &'static str {
        match self {
            Self::PreinscriptionSubmitted => {
                "Hola {{person_name}},\n\n\
                 Recibimos tu preinscripción al curso {{course_name}} ({{course_code}}), \
                 que comienza el {{start_date}}. Te avisaremos cuando sea revisada.\n\n\
                 Equipo de Formación"
            }
            Self::PreinscriptionValidated => {
                "Hola {{person_name}},\n\n\
                 Tu preinscripción al curso {{course_name}} ({{course_code}}) fue validada. \
                 Para confirmar tu cupo completa el pago de {{fee}}.\n\n\
                 Equipo de Formación"
            }
            Self::PreinscriptionConfirmed => {
                "Hola {{person_name}},\n\n\
                 Tu cupo en el curso {{course_name}} ({{course_code}}) está confirmado. \
                 Nos vemos el {{start_date}}.\n\n\
                 Equipo de Formación"
            }
            Self::PreinscriptionRejected => {
                "Hola {{person_name}},\n\n\
                 Tu preinscripción al curso {{course_name}} ({{course_code}}) fue rechazada.\n\
                 Motivo: {{reason}}\n\n\
                 Equipo de Formación"
            }
            Self::PaymentReceived => {
                "Hola {{person_name}},\n\n\
                 Registramos un pago de {{amount}} para el curso {{course_name}} \
                 ({{course_code}}). \
                 Saldo pendiente: {{outstanding}}.\n\n\
                 Equipo de Formación"
            }
        }
    }

    pub fn render(
        self,
        context: &BTreeMap<String, String>,
    ) -> Result<RenderedEmail, TemplateError> {
        Ok(RenderedEmail {
            subject: render_text(self.subject_source(), context)?,
            body: render_text(self.body_source(), context)?,
        })
    }
}

/// Substitute `{{name}}` placeholders from `context`.
pub fn render_text(
    source: &str,
    context: &BTreeMap<String, String>,
) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(source.len());
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(TemplateError::Unterminated(offset + start))?;
        let name = after_open[..end].trim();
        let value = context
            .get(name)
            .ok_or_else(|| TemplateError::MissingVariable(name.to_string()))?;
        output.push_str(value);

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }

    output.push_str(rest);
    Ok(output)
}

/// `45000` → `$45.000` (CLP has no decimals).
pub fn format_clp(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    grouped.push('$');
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    grouped
}
