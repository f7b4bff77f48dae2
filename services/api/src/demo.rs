use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use sgics::catalog::import_geography;
use sgics::courses::{Course, CourseStatus};
use sgics::error::AppError;
use sgics::payments::{NewPayment, PaymentMethod};
use sgics::people::Person;
use sgics::preinscriptions::{NewPreinscription, PreinscriptionStatus, TransitionRequest};
use sgics::records::Repository;
use sgics::rut::Rut;
use sgics::uploads::LocalFileStore;
use sgics::Backend;
use std::error::Error;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_GEOGRAPHY: &str = "region_code,region_name,province,commune\n\
    RM,Metropolitana de Santiago,Santiago,Ñuñoa\n\
    RM,Metropolitana de Santiago,Santiago,Providencia\n\
    V,Valparaíso,Valparaíso,Viña del Mar\n";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Course start date (YYYY-MM-DD). Defaults to 30 days from today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) course_start: Option<NaiveDate>,
    /// Directory for the demo upload. Defaults to the system temp directory.
    #[arg(long)]
    pub(crate) upload_dir: Option<PathBuf>,
    /// Stop after confirmation and skip the payment portion of the demo.
    #[arg(long)]
    pub(crate) skip_payments: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let course_start = args
        .course_start
        .unwrap_or_else(|| Local::now().date_naive() + Duration::days(30));
    let upload_dir = args
        .upload_dir
        .unwrap_or_else(|| std::env::temp_dir().join("sgics-demo"));

    let (backend, outbox) =
        Backend::with_outbox(Arc::new(LocalFileStore::new(&upload_dir)), 1024 * 1024);

    println!("SGICS course administration demo");
    if let Err(err) = walkthrough(&backend, course_start, args.skip_payments) {
        println!("  Demo stopped: {err}");
        return Ok(());
    }

    let sent = outbox.sent();
    if sent.is_empty() {
        println!("\nE-mails: none dispatched");
    } else {
        println!("\nE-mails dispatched");
        for email in sent {
            println!("  - [{}] {} -> {}", email.template.key(), email.subject, email.to);
        }
    }

    Ok(())
}

fn walkthrough(
    backend: &Backend,
    course_start: NaiveDate,
    skip_payments: bool,
) -> Result<(), Box<dyn Error>> {
    let geography = import_geography(&backend.catalog, Cursor::new(DEMO_GEOGRAPHY))?;
    println!(
        "- Geography seeded: {} regions, {} provinces, {} communes",
        geography.regions_created, geography.provinces_created, geography.communes_created
    );
    let commune_id = backend.catalog.communes.list()?.first().map(|commune| commune.id);

    let coordinator = backend
        .people
        .insert(person(Rut::parse("10.000.013-K")?, "Inés", "Carrera", None))?;
    let participant = backend.people.insert(Person {
        commune_id,
        ..person(
            Rut::parse("12.345.678-5")?,
            "Javiera",
            "Muñoz Rojas",
            Some("javiera.munoz@example.cl"),
        )
    })?;
    println!(
        "- Participant {} ({}) registered",
        participant.full_name(),
        participant.rut
    );

    let course = backend.courses.insert(Course {
        id: 0,
        code: "CMB-DEMO".to_string(),
        name: "Curso Medio Básico".to_string(),
        description: "Formación inicial para dirigentes de unidad".to_string(),
        start_date: course_start,
        end_date: course_start + Duration::days(4),
        capacity: 24,
        fee: 45_000,
        status: CourseStatus::Published,
        coordinator_id: Some(coordinator.id),
    })?;
    println!(
        "- Course {} '{}' published ({} seats, fee {})",
        course.code,
        course.name,
        course.capacity,
        sgics::notifications::format_clp(course.fee)
    );

    let preinscription = backend.preinscriptions.create(NewPreinscription {
        person_id: participant.id,
        course_id: course.id,
        notes: Some("Primera vez en un curso de formación".to_string()),
    })?;
    println!(
        "\nPreinscription {} opened as {}",
        preinscription.id, preinscription.status
    );

    let steps = [
        (PreinscriptionStatus::Submitted, Some(participant.id), None),
        (PreinscriptionStatus::InReview, Some(coordinator.id), None),
        (
            PreinscriptionStatus::Validated,
            Some(coordinator.id),
            Some("Ficha médica y autorización recibidas"),
        ),
        (PreinscriptionStatus::Confirmed, Some(coordinator.id), None),
    ];
    for (to, actor_id, note) in steps {
        let updated = backend.preinscriptions.transition(
            preinscription.id,
            TransitionRequest {
                to,
                actor_id,
                note: note.map(str::to_string),
            },
        )?;
        println!("  -> {} ({})", updated.status, updated.status.label());
    }

    let history = backend.preinscriptions.history(preinscription.id)?;
    println!("  History:");
    for change in &history {
        println!(
            "    - {} -> {} by {}",
            change.from,
            change.to,
            change
                .actor_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "system".to_string())
        );
    }

    if skip_payments {
        return Ok(());
    }

    println!("\nPayments");
    for (amount, method) in [(20_000, PaymentMethod::Transfer), (25_000, PaymentMethod::Cash)] {
        let payment = backend.payments.register(NewPayment {
            preinscription_id: preinscription.id,
            amount,
            method,
            paid_on: None,
            reference: None,
        })?;
        println!(
            "- Payment {} registered: {} by {}",
            payment.id,
            sgics::notifications::format_clp(payment.amount),
            payment.method.label()
        );
    }
    let balance = backend.payments.balance(preinscription.id)?;
    println!(
        "  Balance: paid {} of {} | outstanding {}",
        sgics::notifications::format_clp(balance.paid),
        sgics::notifications::format_clp(balance.fee),
        sgics::notifications::format_clp(balance.outstanding)
    );

    let voucher = backend.uploads.store(
        "comprobante-transferencia.pdf",
        b"%PDF-1.4 demo voucher",
        Some(participant.id),
    )?;
    println!(
        "- Voucher stored as {} ({}, {} bytes)",
        voucher.stored_name, voucher.content_type, voucher.size_bytes
    );
    backend.uploads.remove(voucher.id)?;

    let summary = backend.dashboard.summary()?;
    println!("\nDashboard");
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn person(rut: Rut, first_names: &str, last_names: &str, email: Option<&str>) -> Person {
    Person {
        id: 0,
        rut,
        first_names: first_names.to_string(),
        last_names: last_names.to_string(),
        email: email.map(str::to_string),
        phone: None,
        birth_date: None,
        commune_id: None,
        group_id: None,
        branch_id: None,
        active: true,
    }
}
