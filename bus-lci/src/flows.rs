//! Resolution of semantic flows to technosphere matrix indices.
//!
//! All label pattern matching happens here, once per run: [`FlowTable::build`]
//! resolves every supply, treatment, emission and activity label the assembly
//! engine writes to, and the engine itself only ever sees integer indices.
//! Any label the registry cannot resolve fails the build loudly, before a
//! single coefficient is written.

use std::collections::BTreeMap;

use lci_core::ActivityRegistry;

use crate::error::FlowTableError;
use crate::scope::{VehicleConfig, VehicleScope};

/// Exhaust pollutants written by the engine, as
/// (attribute parameter name, biosphere row label) pairs.
///
/// Methane is deliberately absent: the `Methane, fossil` row is owned by the
/// CNG pump-to-tank leakage step.
pub const EXHAUST_POLLUTANTS: &[(&str, &str)] = &[
    ("Carbon dioxide direct emissions", "Carbon dioxide, fossil"),
    ("Carbon monoxide direct emissions", "Carbon monoxide, fossil"),
    ("Nitrogen oxides direct emissions", "Nitrogen oxides"),
    (
        "NMVOC direct emissions",
        "NMVOC, non-methane volatile organic compounds, unspecified origin",
    ),
    (
        "Particulate matter direct emissions",
        "Particulate Matter, < 2.5 um",
    ),
    ("Sulfur dioxide direct emissions", "Sulfur dioxide"),
    ("Dinitrogen oxide direct emissions", "Dinitrogen monoxide"),
    ("Ammonia direct emissions", "Ammonia"),
];

pub const NOISE_COMPARTMENTS: &[&str] = &["urban", "suburban", "rural"];
pub const NOISE_OCTAVES: std::ops::RangeInclusive<usize> = 1..=8;

/// Noise flows use the same string as row label and parameter name.
pub fn noise_flow_name(octave: usize, compartment: &str) -> String {
    format!("noise, octave {octave}, day time, {compartment}")
}

/// Canonical label of a vehicle activity.
pub fn vehicle_activity_label(config: &VehicleConfig) -> String {
    format!(
        "Bus, {}, {}, {}",
        config.size.token(),
        config.powertrain.token(),
        config.year
    )
}

/// Canonical label of a transport-service activity.
pub fn transport_activity_label(config: &VehicleConfig) -> String {
    format!(
        "transport, bus, {}, {}, {}",
        config.size.token(),
        config.powertrain.token(),
        config.year
    )
}

/// Precomputed, injective mapping from the semantic flows of the bus
/// inventory to integer registry indices.
///
/// Per-config activity columns are aligned with `scope.configs()`; per-year
/// energy supply rows are keyed by calendar year.
#[derive(Debug, Clone)]
pub struct FlowTable {
    /// Total number of registry labels; the matrix must be square over this.
    pub activity_count: usize,

    // Vehicle-level supply rows
    pub assembly: usize,
    pub frame: usize,
    pub suspension: usize,
    pub tires_and_wheels: usize,
    pub exhaust_system: usize,
    pub power_electronics: usize,
    pub transmission: usize,
    pub gearbox: usize,
    pub retarder: usize,
    pub other_components_hybrid: usize,
    pub other_components_electric: usize,
    pub glider_lightweighting: usize,
    pub maintenance: usize,
    pub converter: usize,
    pub electric_motor: usize,
    pub inverter: usize,
    pub power_distribution_unit: usize,
    pub combustion_engine: usize,
    pub fuel_cell_stack: usize,
    pub fuel_cell_bop: usize,
    pub hydrogen_tank: usize,
    pub battery_cell: usize,
    pub battery_bop: usize,
    pub lead_acid_battery: usize,
    pub diesel_fuel_tank: usize,
    pub cng_tank: usize,
    pub used_vehicle_treatment: usize,

    // Transport-level rows
    pub generator_diesel: usize,
    pub charger_plugin: usize,
    pub charger_pantograph: usize,
    pub overhead_lines: usize,
    pub road: usize,
    pub road_maintenance: usize,
    pub tyre_wear: usize,
    pub brake_wear: usize,
    pub road_wear: usize,
    pub road_dust: usize,
    pub methane_fossil: usize,
    pub refrigerant_supply: usize,
    pub refrigerant_emission: usize,

    // Per-year energy supply rows
    pub diesel_supply: BTreeMap<u16, usize>,
    pub cng_supply: BTreeMap<u16, usize>,
    pub electricity_supply: BTreeMap<u16, usize>,
    pub hydrogen_supply: BTreeMap<u16, usize>,

    /// Biosphere rows aligned with [`EXHAUST_POLLUTANTS`].
    pub exhaust: Vec<usize>,
    /// Noise rows, octave-major over [`NOISE_COMPARTMENTS`].
    pub noise: Vec<usize>,

    /// Vehicle activity column per config, aligned with `scope.configs()`.
    pub vehicle_cols: Vec<usize>,
    /// Transport activity column per config, aligned with `scope.configs()`.
    pub transport_cols: Vec<usize>,
}

impl FlowTable {
    pub fn build(
        registry: &ActivityRegistry,
        scope: &VehicleScope,
    ) -> Result<Self, FlowTableError> {
        if scope.powertrains().is_empty() {
            return Err(FlowTableError::EmptyScope("powertrains"));
        }
        if scope.sizes().is_empty() {
            return Err(FlowTableError::EmptyScope("size classes"));
        }
        if scope.years().is_empty() {
            return Err(FlowTableError::EmptyScope("years"));
        }

        log::debug!(
            "Resolving flow table against {} registry labels",
            registry.len()
        );

        let single = |pattern: &str| registry.find_index(&[pattern], &[]);
        let yearly = |base: &str| -> Result<BTreeMap<u16, usize>, FlowTableError> {
            let mut rows = BTreeMap::new();
            for &year in scope.years() {
                let year_token = year.to_string();
                rows.insert(year, registry.find_index(&[base, &year_token], &[])?);
            }
            Ok(rows)
        };

        let mut exhaust = Vec::with_capacity(EXHAUST_POLLUTANTS.len());
        for (_, label) in EXHAUST_POLLUTANTS {
            exhaust.push(single(label)?);
        }

        let mut noise = Vec::with_capacity(NOISE_OCTAVES.count() * NOISE_COMPARTMENTS.len());
        for octave in NOISE_OCTAVES {
            for compartment in NOISE_COMPARTMENTS {
                noise.push(single(&noise_flow_name(octave, compartment))?);
            }
        }

        let mut vehicle_cols = Vec::with_capacity(scope.len());
        let mut transport_cols = Vec::with_capacity(scope.len());
        for config in scope.configs() {
            // Comma-delimited tokens keep "13m-city" from capturing
            // "13m-city-double" and "HEV-d" from capturing "PHEV-d".
            let size_token = format!(", {}, ", config.size.token());
            let powertrain_token = format!(", {}, ", config.powertrain.token());
            let year_token = format!(", {}", config.year);
            vehicle_cols.push(
                registry
                    .find_index(
                        &["Bus, ", &size_token, &powertrain_token, &year_token],
                        &[],
                    )
                    .map_err(|source| FlowTableError::VehicleActivity {
                        config: vehicle_activity_label(config),
                        source,
                    })?,
            );
            transport_cols.push(
                registry
                    .find_index(
                        &["transport, bus, ", &size_token, &powertrain_token, &year_token],
                        &[],
                    )
                    .map_err(|source| FlowTableError::TransportActivity {
                        config: transport_activity_label(config),
                        source,
                    })?,
            );
        }

        Ok(Self {
            activity_count: registry.len(),

            assembly: single("assembly operation, for lorry")?,
            frame: single("frame, blanks and saddle, for lorry")?,
            suspension: single("suspension, for lorry")?,
            tires_and_wheels: single("tires and wheels, for lorry")?,
            exhaust_system: single("exhaust system, for lorry")?,
            power_electronics: single("power electronics, for lorry")?,
            transmission: single("transmission, for lorry")?,
            gearbox: single("gearbox, for lorry")?,
            retarder: single("retarder, for lorry")?,
            other_components_hybrid: single("other components, for hybrid electric lorry")?,
            other_components_electric: single("other components, for electric lorry")?,
            glider_lightweighting: single("Glider lightweighting")?,
            maintenance: single("maintenance, bus")?,
            converter: single("market for converter, for electric passenger car")?,
            electric_motor: single("market for electric motor, electric passenger car")?,
            inverter: single("market for inverter, for electric passenger car")?,
            power_distribution_unit: single(
                "market for power distribution unit, for electric passenger car",
            )?,
            combustion_engine: single("internal combustion engine, for lorry")?,
            fuel_cell_stack: single("fuel cell stack")?,
            fuel_cell_bop: single("fuel cell balance of plant")?,
            hydrogen_tank: single("fuel tank, compressed hydrogen gas, 700bar")?,
            battery_cell: single("market for battery cell, Li-ion")?,
            battery_bop: single("market for battery, Li-ion, rechargeable, prismatic")?,
            lead_acid_battery: single("lead acid battery, for lorry")?,
            diesel_fuel_tank: single("fuel tank, for diesel vehicle")?,
            cng_tank: single("fuel tank, compressed natural gas, 200 bar")?,
            used_vehicle_treatment: single("treatment of used bus")?,

            generator_diesel: registry.find_index(
                &["diesel, burned in diesel-electric generating set, 18.5kW"],
                &["market for"],
            )?,
            charger_plugin: single("EV charger, level 3, plugin, 200 kW")?,
            charger_pantograph: single("EV charger, level 3, with pantograph, 450 kW")?,
            overhead_lines: single("Overhead lines")?,
            road: registry.find_index(&["market for road"], &["maintenance"])?,
            road_maintenance: single("market for road maintenance")?,
            tyre_wear: single("treatment of tyre wear emissions, lorry")?,
            brake_wear: single("treatment of brake wear emissions, lorry")?,
            road_wear: single("treatment of road wear emissions, lorry")?,
            road_dust: single("treatment of road dust emissions, lorry")?,
            methane_fossil: single("Methane, fossil")?,
            refrigerant_supply: single("market for refrigerant R134a")?,
            refrigerant_emission: single("Ethane, 1,1,1,2-tetrafluoro-, HFC-134a")?,

            diesel_supply: yearly("fuel supply for diesel vehicles")?,
            cng_supply: yearly("fuel supply for cng vehicles")?,
            electricity_supply: yearly("electricity supply for electric vehicles")?,
            hydrogen_supply: yearly("fuel supply for hydrogen vehicles")?,

            exhaust,
            noise,
            vehicle_cols,
            transport_cols,
        })
    }
}

/// Builds the full flow catalogue a registry is expected to carry for a
/// scope, in a stable order: the shared supply/treatment/emission rows first,
/// then per-year energy rows, then one vehicle and one transport activity per
/// config.
pub fn flow_catalogue(scope: &VehicleScope) -> Vec<String> {
    let mut labels: Vec<String> = [
        "assembly operation, for lorry",
        "frame, blanks and saddle, for lorry",
        "suspension, for lorry",
        "tires and wheels, for lorry",
        "exhaust system, for lorry",
        "power electronics, for lorry",
        "transmission, for lorry",
        "gearbox, for lorry",
        "retarder, for lorry",
        "other components, for hybrid electric lorry",
        "other components, for electric lorry",
        "Glider lightweighting",
        "maintenance, bus",
        "market for converter, for electric passenger car",
        "market for electric motor, electric passenger car",
        "market for inverter, for electric passenger car",
        "market for power distribution unit, for electric passenger car",
        "internal combustion engine, for lorry",
        "fuel cell stack",
        "fuel cell balance of plant",
        "fuel tank, compressed hydrogen gas, 700bar",
        "market for battery cell, Li-ion",
        "market for battery, Li-ion, rechargeable, prismatic",
        "lead acid battery, for lorry",
        "fuel tank, for diesel vehicle",
        "fuel tank, compressed natural gas, 200 bar",
        "treatment of used bus",
        "diesel, burned in diesel-electric generating set, 18.5kW",
        "market for diesel, burned in diesel-electric generating set, 18.5kW",
        "EV charger, level 3, plugin, 200 kW",
        "EV charger, level 3, with pantograph, 450 kW",
        "Overhead lines",
        "market for road",
        "market for road maintenance",
        "treatment of tyre wear emissions, lorry",
        "treatment of brake wear emissions, lorry",
        "treatment of road wear emissions, lorry",
        "treatment of road dust emissions, lorry",
        "Methane, fossil",
        "market for refrigerant R134a",
        "Ethane, 1,1,1,2-tetrafluoro-, HFC-134a",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    for (_, label) in EXHAUST_POLLUTANTS {
        labels.push(label.to_string());
    }
    for octave in NOISE_OCTAVES {
        for compartment in NOISE_COMPARTMENTS {
            labels.push(noise_flow_name(octave, compartment));
        }
    }
    for &year in scope.years() {
        labels.push(format!("fuel supply for diesel vehicles, {year}"));
        labels.push(format!("fuel supply for cng vehicles, {year}"));
        labels.push(format!("electricity supply for electric vehicles, {year}"));
        labels.push(format!("fuel supply for hydrogen vehicles, {year}"));
    }
    for config in scope.configs() {
        labels.push(vehicle_activity_label(config));
        labels.push(transport_activity_label(config));
    }
    labels
}
