//! Manifest column taxonomy.

use std::fmt;

/// A column of the entity table other than the identifier.
///
/// The identifier (usually `component_name`) is the table index and is
/// always present, so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    /// Time step between samples, in seconds.
    Resolution,
    NormalizationFactor,
    Category,
    Simulation,
    /// Name of the quantity the series describes (e.g. `max_active_power`).
    Name,
    /// Path to the time-series CSV for this entity.
    DataFile,
    /// Series module, e.g. `InfrastructureSystems`.
    Module,
    /// Series type, e.g. `Deterministic`.
    Type,
    ScalingFactorMultiplier,
    ScalingFactorMultiplierModule,
}

impl Column {
    /// Columns every exported row must carry.
    pub const REQUIRED: [Column; 6] = [
        Column::Resolution,
        Column::NormalizationFactor,
        Column::Category,
        Column::Simulation,
        Column::Name,
        Column::DataFile,
    ];

    /// Columns emitted when present.
    pub const OPTIONAL: [Column; 4] = [
        Column::Module,
        Column::Type,
        Column::ScalingFactorMultiplier,
        Column::ScalingFactorMultiplierModule,
    ];

    /// Returns the manifest key for this column.
    pub fn as_str(self) -> &'static str {
        match self {
            Column::Resolution => "resolution",
            Column::NormalizationFactor => "normalization_factor",
            Column::Category => "category",
            Column::Simulation => "simulation",
            Column::Name => "name",
            Column::DataFile => "data_file",
            Column::Module => "module",
            Column::Type => "type",
            Column::ScalingFactorMultiplier => "scaling_factor_multiplier",
            Column::ScalingFactorMultiplierModule => "scaling_factor_multiplier_module",
        }
    }

    /// Looks up a column by its manifest key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::REQUIRED
            .into_iter()
            .chain(Self::OPTIONAL)
            .find(|c| c.as_str() == key)
    }

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
