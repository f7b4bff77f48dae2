use std::sync::Arc;

use axum::Router;

use crate::accounts::{accounts_router, User};
use crate::catalog::{catalog_router, Catalog};
use crate::config::AppConfig;
use crate::courses::{courses_router, Course};
use crate::dashboard::{dashboard_router, Dashboard};
use crate::notifications::{InMemoryMailer, Mailer, Notifier};
use crate::payments::{payment_router, Payment, PaymentService};
use crate::people::{people_router, Person};
use crate::preinscriptions::{preinscription_router, Preinscription, PreinscriptionService};
use crate::records::{InMemoryRepository, Repository};
use crate::uploads::{upload_router, FileStore, LocalFileStore, UploadRecord, UploadService};

/// Collaborators that differ between the server, the CLI demo and tests.
pub struct BackendOptions {
    pub mailer: Arc<dyn Mailer>,
    pub mail_from: String,
    pub file_store: Arc<dyn FileStore>,
    pub upload_max_bytes: u64,
}

impl BackendOptions {
    pub fn from_config(config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer,
            mail_from: config.mail.from_address.clone(),
            file_store: Arc::new(LocalFileStore::new(&config.uploads.directory)),
            upload_max_bytes: config.uploads.max_bytes,
        }
    }
}

/// Every repository and service of the application, wired together.
#[derive(Clone)]
pub struct Backend {
    pub catalog: Catalog,
    pub users: Arc<dyn Repository<User>>,
    pub people: Arc<dyn Repository<Person>>,
    pub courses: Arc<dyn Repository<Course>>,
    pub preinscriptions: Arc<PreinscriptionService>,
    pub payments: Arc<PaymentService>,
    pub uploads: Arc<UploadService>,
    pub dashboard: Dashboard,
}

impl Backend {
    /// Build the application over process-local repositories.
    pub fn in_memory(options: BackendOptions) -> Self {
        let catalog = Catalog::in_memory();
        let users: Arc<dyn Repository<User>> = Arc::new(InMemoryRepository::<User>::new());
        let people: Arc<dyn Repository<Person>> = Arc::new(InMemoryRepository::<Person>::new());
        let courses: Arc<dyn Repository<Course>> = Arc::new(InMemoryRepository::<Course>::new());
        let preinscription_store: Arc<dyn Repository<Preinscription>> =
            Arc::new(InMemoryRepository::<Preinscription>::new());
        let payment_store: Arc<dyn Repository<Payment>> =
            Arc::new(InMemoryRepository::<Payment>::new());
        let upload_store: Arc<dyn Repository<UploadRecord>> =
            Arc::new(InMemoryRepository::<UploadRecord>::new());

        let notifier = Notifier::new(options.mailer, options.mail_from);

        let preinscriptions = Arc::new(PreinscriptionService::new(
            Arc::clone(&preinscription_store),
            Arc::clone(&people),
            Arc::clone(&courses),
            notifier.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            Arc::clone(&payment_store),
            Arc::clone(&preinscription_store),
            Arc::clone(&people),
            Arc::clone(&courses),
            notifier,
        ));
        let uploads = Arc::new(UploadService::new(
            upload_store,
            Arc::clone(&people),
            options.file_store,
            options.upload_max_bytes,
        ));
        let dashboard = Dashboard::new(
            Arc::clone(&people),
            Arc::clone(&users),
            Arc::clone(&courses),
            preinscription_store,
            payment_store,
        );

        Self {
            catalog,
            users,
            people,
            courses,
            preinscriptions,
            payments,
            uploads,
            dashboard,
        }
    }

    /// In-memory backend with an in-memory outbox, for demos and tests.
    pub fn with_outbox(
        file_store: Arc<dyn FileStore>,
        upload_max_bytes: u64,
    ) -> (Self, InMemoryMailer) {
        let mailer = InMemoryMailer::default();
        let backend = Self::in_memory(BackendOptions {
            mailer: Arc::new(mailer.clone()),
            mail_from: "cursos@scouts.cl".to_string(),
            file_store,
            upload_max_bytes,
        });
        (backend, mailer)
    }

    /// All domain routes under `/api/v1`.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(catalog_router(&self.catalog))
            .merge(accounts_router(
                Arc::clone(&self.users),
                Arc::clone(&self.people),
            ))
            .merge(people_router(Arc::clone(&self.people), &self.catalog))
            .merge(courses_router(
                Arc::clone(&self.courses),
                Arc::clone(&self.people),
            ))
            .merge(preinscription_router(Arc::clone(&self.preinscriptions)))
            .merge(payment_router(Arc::clone(&self.payments)))
            .merge(upload_router(Arc::clone(&self.uploads)))
            .merge(dashboard_router(self.dashboard.clone()))
    }
}
