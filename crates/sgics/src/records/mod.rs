//! Storage seam and generic REST routes shared by every catalog-like resource.

pub mod repository;
pub mod router;

pub use repository::{
    require_text, InMemoryRepository, Record, RecordId, Repository, RepositoryError,
    ValidationError,
};
pub use router::{crud_router, CrossCheck, CrudResource, Page, PageParams};

/// Fail validation when an optional reference points at a missing record.
pub fn ensure_exists<T: Record>(
    repository: &dyn Repository<T>,
    field: &'static str,
    id: Option<RecordId>,
) -> Result<(), ValidationError> {
    let Some(id) = id else {
        return Ok(());
    };
    match repository.fetch(id) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(ValidationError::new(
            field,
            format!("{} {id} does not exist", T::RESOURCE),
        )),
        Err(err) => Err(ValidationError::new(field, err.to_string())),
    }
}
