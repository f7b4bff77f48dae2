use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Catalog, Commune, Province, Region};
use crate::error::ApiError;
use crate::records::{RecordId, RepositoryError, ValidationError};

/// Counts reported after a geography import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeographyImportSummary {
    pub rows: usize,
    pub regions_created: usize,
    pub provinces_created: usize,
    pub communes_created: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum GeographyImportError {
    #[error("unable to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed geography CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {source}")]
    Row {
        row: usize,
        source: ValidationError,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<GeographyImportError> for ApiError {
    fn from(value: GeographyImportError) -> Self {
        match value {
            GeographyImportError::Repository(err) => ApiError::Repository(err),
            other => ApiError::Payload(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeographyRow {
    region_code: String,
    region_name: String,
    province: String,
    commune: String,
}

impl GeographyRow {
    fn check(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("region_code", &self.region_code),
            ("region_name", &self.region_name),
            ("province", &self.province),
            ("commune", &self.commune),
        ] {
            if value.is_empty() {
                return Err(ValidationError::new(field, "must not be blank"));
            }
        }
        Ok(())
    }
}

/// Load `region_code,region_name,province,commune` rows, creating only what is missing.
///
/// Every row is read and checked before anything is written, so a malformed file leaves the
/// catalog untouched.
pub fn import_geography<R: Read>(
    catalog: &Catalog,
    reader: R,
) -> Result<GeographyImportSummary, GeographyImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.deserialize::<GeographyRow>().enumerate() {
        let row = record?;
        row.check().map_err(|source| GeographyImportError::Row {
            row: index + 1,
            source,
        })?;
        rows.push(row);
    }

    let mut regions: HashMap<String, RecordId> = catalog
        .regions
        .list()?
        .into_iter()
        .map(|region| (region.code.to_lowercase(), region.id))
        .collect();
    let mut provinces: HashMap<(RecordId, String), RecordId> = catalog
        .provinces
        .list()?
        .into_iter()
        .map(|province| ((province.region_id, province.name.to_lowercase()), province.id))
        .collect();
    let mut communes: HashMap<(RecordId, String), RecordId> = catalog
        .communes
        .list()?
        .into_iter()
        .map(|commune| ((commune.province_id, commune.name.to_lowercase()), commune.id))
        .collect();

    let mut summary = GeographyImportSummary {
        rows: rows.len(),
        ..GeographyImportSummary::default()
    };

    for row in &rows {
        let region_id = match regions.get(&row.region_code.to_lowercase()) {
            Some(id) => *id,
            None => {
                let region = catalog.regions.insert(Region {
                    id: 0,
                    code: row.region_code.clone(),
                    name: row.region_name.clone(),
                })?;
                summary.regions_created += 1;
                regions.insert(row.region_code.to_lowercase(), region.id);
                region.id
            }
        };

        let province_key = (region_id, row.province.to_lowercase());
        let province_id = match provinces.get(&province_key) {
            Some(id) => *id,
            None => {
                let province = catalog.provinces.insert(Province {
                    id: 0,
                    region_id,
                    name: row.province.clone(),
                })?;
                summary.provinces_created += 1;
                provinces.insert(province_key, province.id);
                province.id
            }
        };

        let commune_key = (province_id, row.commune.to_lowercase());
        if !communes.contains_key(&commune_key) {
            let commune = catalog.communes.insert(Commune {
                id: 0,
                province_id,
                name: row.commune.clone(),
            })?;
            summary.communes_created += 1;
            communes.insert(commune_key, commune.id);
        }
    }

    info!(
        rows = summary.rows,
        regions = summary.regions_created,
        provinces = summary.provinces_created,
        communes = summary.communes_created,
        "geography catalog imported"
    );
    Ok(summary)
}

pub fn import_geography_path<P: AsRef<Path>>(
    catalog: &Catalog,
    path: P,
) -> Result<GeographyImportSummary, GeographyImportError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| GeographyImportError::Open {
        path: path.display().to_string(),
        source,
    })?;
    import_geography(catalog, file)
}
