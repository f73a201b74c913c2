//! Model catalog for the MLP collection
//!
//! Hierarchy (owner → owned):
//!
//! ```text
//! projects ───────────────┐
//! surveyors → surveys → survey_seasons → stations → historic_visits → historic_captures
//!                                                 → modern_visits → locations → modern_captures
//! captures → capture_images
//! ```

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{ColumnDefinition, ModelKind, ModelSchema, PgType};

/// Processing stage of a capture image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageState {
    Raw,
    Master,
    Interim,
    Gridded,
    Misc,
}

impl ImageState {
    pub const ALL: [ImageState; 5] = [
        ImageState::Raw,
        ImageState::Master,
        ImageState::Interim,
        ImageState::Gridded,
        ImageState::Misc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageState::Raw => "raw",
            ImageState::Master => "master",
            ImageState::Interim => "interim",
            ImageState::Gridded => "gridded",
            ImageState::Misc => "misc",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageState::Raw => "Raw",
            ImageState::Master => "Master",
            ImageState::Interim => "Interim",
            ImageState::Gridded => "Gridded",
            ImageState::Misc => "Miscellaneous",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

/// All declared models
pub struct Catalog {
    models: Vec<ModelSchema>,
}

impl Catalog {
    pub fn new(models: Vec<ModelSchema>) -> Self {
        Self { models }
    }

    /// Look up a model by name
    pub fn get(&self, name: &str) -> Option<&ModelSchema> {
        self.models.iter().find(|m| m.name == name)
    }

    /// All models in declaration order (owners before owned)
    pub fn models(&self) -> &[ModelSchema] {
        &self.models
    }

    pub fn of_kind(&self, kind: ModelKind) -> impl Iterator<Item = &ModelSchema> {
        self.models.iter().filter(move |m| m.kind == kind)
    }

    /// Node type names
    pub fn node_types(&self) -> Vec<&str> {
        self.of_kind(ModelKind::Node).map(|m| m.name.as_str()).collect()
    }

    /// File type names
    pub fn file_types(&self) -> Vec<&str> {
        self.of_kind(ModelKind::File).map(|m| m.name.as_str()).collect()
    }

    /// Model types that may be owned by `owner_type`
    pub fn children_of(&self, owner_type: &str) -> Vec<&str> {
        self.models
            .iter()
            .filter(|m| m.accepts_owner(owner_type))
            .map(|m| m.name.as_str())
            .collect()
    }

    /// `CREATE OR REPLACE VIEW files` over every file model
    pub fn files_view_sql(&self) -> String {
        let selects: Vec<String> = self
            .of_kind(ModelKind::File)
            .map(|m| {
                format!(
                    "SELECT id, '{name}'::varchar AS file_type, owner_id, owner_type, \
                     filename, fs_path, mimetype, file_size, created_at, updated_at FROM {name}",
                    name = m.name
                )
            })
            .collect();
        format!("CREATE OR REPLACE VIEW files AS\n{}", selects.join("\nUNION ALL\n"))
    }
}

/// The collection catalog
pub static CATALOG: Lazy<Catalog> = Lazy::new(|| Catalog::new(collection_models()));

const CAPTURE_OWNERS: &[&str] = &["historic_captures", "modern_captures"];

const SUPPLEMENT_OWNERS: &[&str] = &[
    "projects",
    "surveyors",
    "surveys",
    "survey_seasons",
    "stations",
    "historic_visits",
    "modern_visits",
    "locations",
];

fn text(name: &str) -> ColumnDefinition {
    ColumnDefinition::new(name, PgType::Text)
}

fn integer(name: &str) -> ColumnDefinition {
    ColumnDefinition::new(name, PgType::Integer)
}

fn double(name: &str) -> ColumnDefinition {
    ColumnDefinition::new(name, PgType::Double)
}

/// Camera settings shared by historic and modern captures
fn capture_columns(schema: ModelSchema) -> ModelSchema {
    schema
        .column(text("fn_photo_reference").label("Field Notes Photo Reference"))
        .column(double("f_stop").label("F-stop"))
        .column(text("shutter_speed"))
        .column(integer("focal_length"))
        .column(integer("cameras_id").label("Camera").references("cameras"))
        .column(integer("lens_id").label("Lens").references("lens"))
        .column(text("comments"))
}

fn coordinates(schema: ModelSchema) -> ModelSchema {
    schema
        .column(double("lat").label("Latitude"))
        .column(double("lng").label("Longitude"))
        .column(double("elev").label("Elevation"))
}

fn collection_models() -> Vec<ModelSchema> {
    vec![
        // Reference models come first: captures point at cameras and lens
        ModelSchema::new("participants", "Participants", ModelKind::Reference)
            .column(text("last_name").not_null())
            .column(text("given_names"))
            .timestamps(),
        ModelSchema::new("cameras", "Cameras", ModelKind::Reference)
            .column(text("make"))
            .column(text("model"))
            .column(text("unit"))
            .column(text("format"))
            .timestamps(),
        ModelSchema::new("lens", "Lenses", ModelKind::Reference)
            .column(text("brand"))
            .column(integer("focal_length"))
            .column(double("max_aperture"))
            .timestamps(),
        // Nodes
        ModelSchema::new("projects", "Projects", ModelKind::Node)
            .column(text("name").not_null())
            .column(text("description"))
            .timestamps(),
        ModelSchema::new("surveyors", "Surveyors", ModelKind::Node)
            .column(text("given_names"))
            .column(text("last_name").not_null())
            .column(text("short_name"))
            .column(text("affiliation"))
            .timestamps(),
        ModelSchema::new("surveys", "Surveys", ModelKind::Node)
            .owned_by(&["surveyors"])
            .column(text("name").not_null())
            .column(text("historical_map_sheet"))
            .timestamps(),
        ModelSchema::new("survey_seasons", "Survey Seasons", ModelKind::Node)
            .owned_by(&["surveys"])
            .column(integer("year").not_null())
            .column(text("geographic_coverage"))
            .column(text("jurisdiction"))
            .column(text("affiliation"))
            .column(text("archive"))
            .column(text("collection"))
            .column(text("location"))
            .column(text("sources"))
            .column(text("notes"))
            .timestamps(),
        coordinates(
            ModelSchema::new("stations", "Stations", ModelKind::Node)
                .owned_by(&["survey_seasons", "projects"])
                .column(text("name").not_null())
                .column(text("nts_sheet").label("NTS Sheet")),
        )
        .column(ColumnDefinition::new("published", PgType::Boolean).default("false"))
        .timestamps(),
        ModelSchema::new("historic_visits", "Historic Visits", ModelKind::Node)
            .owned_by(&["stations"])
            .column(ColumnDefinition::new("date", PgType::Date))
            .column(text("comments"))
            .timestamps(),
        ModelSchema::new("modern_visits", "Modern Visits", ModelKind::Node)
            .owned_by(&["stations"])
            .column(ColumnDefinition::new("date", PgType::Date))
            .column(ColumnDefinition::new("start_time", PgType::Time))
            .column(ColumnDefinition::new("finish_time", PgType::Time))
            .column(text("pilot"))
            .column(text("rw_call_sign").label("RW Call Sign"))
            .column(text("visit_narrative"))
            .column(ColumnDefinition::new("illustration", PgType::Boolean).default("false"))
            .column(text("weather_narrative"))
            .column(double("weather_temp").label("Temperature"))
            .column(text("fn_physical_location").label("Field Notes Physical Location"))
            .timestamps(),
        coordinates(
            ModelSchema::new("locations", "Locations", ModelKind::Node)
                .owned_by(&["modern_visits"])
                .column(text("location_identity").not_null())
                .column(text("location_narrative"))
                .column(integer("legacy_photos_start"))
                .column(integer("legacy_photos_end")),
        )
        .timestamps(),
        capture_columns(
            ModelSchema::new("historic_captures", "Historic Captures", ModelKind::Node)
                .owned_by(&["historic_visits", "survey_seasons", "surveys", "projects"]),
        )
        .column(text("digitization_location"))
        .column(ColumnDefinition::new("digitization_datetime", PgType::Timestamp))
        .column(text("lac_ecopy").label("LAC e-Copy"))
        .column(text("lac_wo").label("LAC WO"))
        .column(text("lac_collection").label("LAC Collection"))
        .column(text("lac_box").label("LAC Box"))
        .column(text("lac_catalogue").label("LAC Catalogue"))
        .column(text("condition"))
        .column(text("plate_id").label("Plate ID"))
        .timestamps(),
        coordinates(capture_columns(
            ModelSchema::new("modern_captures", "Modern Captures", ModelKind::Node)
                .owned_by(&["modern_visits", "locations", "stations"]),
        ))
        .column(ColumnDefinition::new("capture_datetime", PgType::Timestamp))
        .column(integer("azimuth"))
        .column(ColumnDefinition::new("alternate", PgType::Boolean).default("false"))
        .timestamps(),
        // Reference rows owned by a survey season
        ModelSchema::new("glass_plate_listings", "Glass Plate Listings", ModelKind::Reference)
            .owned_by(&["survey_seasons"])
            .column(text("container"))
            .column(text("plates"))
            .column(text("notes"))
            .timestamps(),
        ModelSchema::new("maps", "Maps", ModelKind::Reference)
            .owned_by(&["survey_seasons"])
            .column(text("nts_map").label("NTS Map"))
            .column(text("historic_map"))
            .column(text("links"))
            .timestamps(),
        // Files
        ModelSchema::new("capture_images", "Capture Images", ModelKind::File)
            .owned_by(CAPTURE_OWNERS)
            .column(
                ColumnDefinition::new("image_state", PgType::Varchar)
                    .not_null()
                    .references_key("image_states", "name")
                    .choices(&ImageState::names()),
            )
            .file_columns()
            .column(integer("x_dim").label("Width"))
            .column(integer("y_dim").label("Height"))
            .column(integer("bit_depth"))
            .column(text("comments"))
            .timestamps(),
        ModelSchema::new("supplemental_images", "Supplemental Images", ModelKind::File)
            .owned_by(SUPPLEMENT_OWNERS)
            .column(
                ColumnDefinition::new("image_type", PgType::Varchar)
                    .choices(&["scenic", "location", "field_notes", "other"]),
            )
            .file_columns()
            .column(text("caption"))
            .timestamps(),
        ModelSchema::new("metadata_files", "Metadata Files", ModelKind::File)
            .owned_by(SUPPLEMENT_OWNERS)
            .column(
                ColumnDefinition::new("metadata_type", PgType::Varchar)
                    .choices(&["field_notes", "ancillary"]),
            )
            .file_columns()
            .timestamps(),
    ]
}
