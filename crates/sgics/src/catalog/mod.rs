//! Geography (region → province → commune) and Scout organization
//! (zone → district → group, branches, positions) catalogs.

mod import;

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::records::{
    crud_router, ensure_exists, require_text, CrudResource, InMemoryRepository, Record, RecordId,
    Repository, ValidationError,
};

pub use import::{
    import_geography, import_geography_path, GeographyImportError, GeographyImportSummary,
};

macro_rules! catalog_record {
    (
        $ty:ty, $resource:literal,
        key = |$k:ident| $key:expr,
        validate = |$v:ident| $validate:expr
    ) => {
        impl Record for $ty {
            const RESOURCE: &'static str = $resource;

            fn id(&self) -> RecordId {
                self.id
            }

            fn set_id(&mut self, id: RecordId) {
                self.id = id;
            }

            fn unique_key(&self) -> Option<String> {
                let $k = self;
                $key
            }

            fn validate(&self) -> Result<(), ValidationError> {
                let $v = self;
                $validate
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub id: RecordId,
    pub code: String,
    pub name: String,
}

catalog_record!(Region, "region",
    key = |r| Some(r.code.trim().to_string()),
    validate = |r| {
        require_text("code", &r.code)?;
        require_text("name", &r.name)
    }
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    #[serde(default)]
    pub id: RecordId,
    pub region_id: RecordId,
    pub name: String,
}

catalog_record!(Province, "province",
    key = |p| Some(format!("{}/{}", p.region_id, p.name.trim())),
    validate = |p| require_text("name", &p.name)
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commune {
    #[serde(default)]
    pub id: RecordId,
    pub province_id: RecordId,
    pub name: String,
}

catalog_record!(Commune, "commune",
    key = |c| Some(format!("{}/{}", c.province_id, c.name.trim())),
    validate = |c| require_text("name", &c.name)
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
}

catalog_record!(Zone, "zone",
    key = |z| Some(z.name.trim().to_string()),
    validate = |z| require_text("name", &z.name)
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    #[serde(default)]
    pub id: RecordId,
    pub zone_id: RecordId,
    pub name: String,
}

catalog_record!(District, "district",
    key = |d| Some(format!("{}/{}", d.zone_id, d.name.trim())),
    validate = |d| require_text("name", &d.name)
);

/// Scout group, numbered within its district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub id: RecordId,
    pub district_id: RecordId,
    pub number: u32,
    pub name: String,
}

catalog_record!(Group, "group",
    key = |g| Some(format!("{}/{}", g.district_id, g.number)),
    validate = |g| {
        if g.number == 0 {
            return Err(ValidationError::new("number", "must be greater than zero"));
        }
        require_text("name", &g.name)
    }
);

/// Age branch (rama), e.g. cubs or rovers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    pub min_age: u8,
    pub max_age: u8,
}

catalog_record!(Branch, "branch",
    key = |b| Some(b.name.trim().to_string()),
    validate = |b| {
        require_text("name", &b.name)?;
        if b.min_age > b.max_age {
            return Err(ValidationError::new("max_age", "must not be lower than min_age"));
        }
        Ok(())
    }
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
}

catalog_record!(Position, "position",
    key = |p| Some(p.name.trim().to_string()),
    validate = |p| require_text("name", &p.name)
);

/// Repositories for every catalog table.
#[derive(Clone)]
pub struct Catalog {
    pub regions: Arc<dyn Repository<Region>>,
    pub provinces: Arc<dyn Repository<Province>>,
    pub communes: Arc<dyn Repository<Commune>>,
    pub zones: Arc<dyn Repository<Zone>>,
    pub districts: Arc<dyn Repository<District>>,
    pub groups: Arc<dyn Repository<Group>>,
    pub branches: Arc<dyn Repository<Branch>>,
    pub positions: Arc<dyn Repository<Position>>,
}

impl Catalog {
    pub fn in_memory() -> Self {
        Self {
            regions: Arc::new(InMemoryRepository::<Region>::new()),
            provinces: Arc::new(InMemoryRepository::<Province>::new()),
            communes: Arc::new(InMemoryRepository::<Commune>::new()),
            zones: Arc::new(InMemoryRepository::<Zone>::new()),
            districts: Arc::new(InMemoryRepository::<District>::new()),
            groups: Arc::new(InMemoryRepository::<Group>::new()),
            branches: Arc::new(InMemoryRepository::<Branch>::new()),
            positions: Arc::new(InMemoryRepository::<Position>::new()),
        }
    }
}

/// CRUD routes for every catalog plus the geography CSV import.
pub fn catalog_router(catalog: &Catalog) -> Router {
    let regions = Arc::clone(&catalog.regions);
    let provinces = CrudResource::new(Arc::clone(&catalog.provinces)).with_cross_check(
        move |province: &Province| {
            ensure_exists(regions.as_ref(), "region_id", Some(province.region_id))
        },
    );

    let parent_provinces = Arc::clone(&catalog.provinces);
    let communes = CrudResource::new(Arc::clone(&catalog.communes)).with_cross_check(
        move |commune: &Commune| {
            ensure_exists(
                parent_provinces.as_ref(),
                "province_id",
                Some(commune.province_id),
            )
        },
    );

    let zones = Arc::clone(&catalog.zones);
    let districts = CrudResource::new(Arc::clone(&catalog.districts)).with_cross_check(
        move |district: &District| ensure_exists(zones.as_ref(), "zone_id", Some(district.zone_id)),
    );

    let parent_districts = Arc::clone(&catalog.districts);
    let groups = CrudResource::new(Arc::clone(&catalog.groups)).with_cross_check(
        move |group: &Group| {
            ensure_exists(
                parent_districts.as_ref(),
                "district_id",
                Some(group.district_id),
            )
        },
    );

    let import_routes = Router::new()
        .route("/api/v1/catalog/geography/import", post(import_handler))
        .with_state(catalog.clone());

    Router::new()
        .merge(crud_router(
            "/api/v1/catalog/regions",
            CrudResource::new(Arc::clone(&catalog.regions)),
        ))
        .merge(crud_router("/api/v1/catalog/provinces", provinces))
        .merge(crud_router("/api/v1/catalog/communes", communes))
        .merge(crud_router(
            "/api/v1/catalog/zones",
            CrudResource::new(Arc::clone(&catalog.zones)),
        ))
        .merge(crud_router("/api/v1/catalog/districts", districts))
        .merge(crud_router("/api/v1/catalog/groups", groups))
        .merge(crud_router(
            "/api/v1/catalog/branches",
            CrudResource::new(Arc::clone(&catalog.branches)),
        ))
        .merge(crud_router(
            "/api/v1/catalog/positions",
            CrudResource::new(Arc::clone(&catalog.positions)),
        ))
        .merge(import_routes)
}

async fn import_handler(
    State(catalog): State<Catalog>,
    body: String,
) -> Result<Json<GeographyImportSummary>, ApiError> {
    let summary = import_geography(&catalog, body.as_bytes())?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_ages_must_be_ordered() {
        let branch = Branch {
            id: 0,
            name: "Lobatos".to_string(),
            min_age: 11,
            max_age: 7,
        };
        assert_eq!(branch.validate().expect_err("invalid").field, "max_age");
    }

    #[test]
    fn groups_are_unique_per_district() {
        let catalog = Catalog::in_memory();
        let group = Group {
            id: 0,
            district_id: 1,
            number: 12,
            name: "Grupo Scout San Jorge".to_string(),
        };
        catalog.groups.insert(group.clone()).expect("first insert");

        let mut other_district = group.clone();
        other_district.district_id = 2;
        catalog
            .groups
            .insert(other_district)
            .expect("same number in another district");

        assert!(catalog.groups.insert(group).is_err());
    }

    #[test]
    fn provinces_require_existing_region() {
        let catalog = Catalog::in_memory();
        let regions = Arc::clone(&catalog.regions);
        let resource = CrudResource::new(Arc::clone(&catalog.provinces)).with_cross_check(
            move |province: &Province| {
                ensure_exists(regions.as_ref(), "region_id", Some(province.region_id))
            },
        );

        let orphan = Province {
            id: 0,
            region_id: 42,
            name: "Cordillera".to_string(),
        };
        match resource.create(orphan) {
            Err(ApiError::Validation(err)) => assert_eq!(err.field, "region_id"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
