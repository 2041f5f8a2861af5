//! The matrix assembly engine.
//!
//! [`InventoryBuilder::fill_in_a_matrix`] translates the vehicle attribute
//! array into technosphere coefficients, one semantic flow at a time. Every
//! step reads only the attribute array and contributes a [`ContributionSet`]
//! of exchanges; the full ledger is computed first and then reduced into the
//! matrix by summation, so a failing step never leaves the matrix
//! half-written and the "who writes what" relationship stays auditable.

use lci_core::{Exchange, TechnosphereMatrix, VehicleAttributeArray};

use crate::error::{BusLciError, Result};
use crate::flows::{
    EXHAUST_POLLUTANTS, FlowTable, NOISE_COMPARTMENTS, NOISE_OCTAVES, noise_flow_name,
};
use crate::particulates::{ParticulatesEmissionsModel, WearCategory};
use crate::scope::{Powertrain, VariantQuery, VehicleScope};

/// Maintenance and disposal event frequencies are normalized against a 19 t
/// reference gross mass.
const REFERENCE_GROSS_MASS_KG: f64 = 19_000.0;

// Transmission mass partition: shaft / gearbox / retarder. Must sum to 1.
const TRANSMISSION_SHAFT_SHARE: f64 = 0.52;
const GEARBOX_SHARE: f64 = 0.36;
const RETARDER_SHARE: f64 = 0.12;

// Road infrastructure demand per vehicle-kilometre.
const ROAD_CONSTRUCTION_PER_KG_KM: f64 = 5.37e-7;
const ROAD_MAINTENANCE_PER_KM: f64 = 1.29e-3;

// Vehicles sharing one infrastructure unit x unit service years.
const PLUGIN_CHARGER_SHARE: f64 = 2.0 * 24.0;
const PANTOGRAPH_CHARGER_SHARE: f64 = 10.0 * 24.0;
const OVERHEAD_LINE_SHARE: f64 = 60.0 * 40.0;

const COMBUSTION_VARIANTS: &[Powertrain] =
    &[Powertrain::IcevD, Powertrain::HevD, Powertrain::IcevG];
const ELECTRIC_VARIANTS: &[Powertrain] = &[
    Powertrain::BevOpp,
    Powertrain::BevDepot,
    Powertrain::BevMotion,
    Powertrain::Fcev,
];
const LITHIUM_BATTERY_VARIANTS: &[Powertrain] = &[
    Powertrain::BevOpp,
    Powertrain::BevDepot,
    Powertrain::BevMotion,
    Powertrain::Fcev,
    Powertrain::HevD,
    Powertrain::PhevD,
];
const LEAD_ACID_VARIANTS: &[Powertrain] = &[Powertrain::IcevD, Powertrain::IcevG];
const DIESEL_TANK_VARIANTS: &[Powertrain] = &[Powertrain::IcevD, Powertrain::HevD];
const DIESEL_FUEL_VARIANTS: &[Powertrain] =
    &[Powertrain::IcevD, Powertrain::PhevD, Powertrain::HevD];
const GRID_ELECTRIC_VARIANTS: &[Powertrain] = &[
    Powertrain::BevOpp,
    Powertrain::BevDepot,
    Powertrain::BevMotion,
    Powertrain::PhevD,
];
const PLUGIN_CHARGING_VARIANTS: &[Powertrain] = &[Powertrain::BevDepot, Powertrain::PhevD];

/// Exchanges contributed by one named assembly step.
#[derive(Debug, Clone)]
pub struct ContributionSet {
    pub step: &'static str,
    pub exchanges: Vec<Exchange>,
}

/// Every attribute parameter name the engine reads. The upstream producer can
/// validate attribute-array coverage against this list; the engine itself
/// still fails loudly on the first missing name.
pub fn required_parameters() -> Vec<String> {
    let mut names: Vec<String> = [
        "curb mass",
        "gross mass",
        "driving mass",
        "glider base mass",
        "suspension mass",
        "braking system mass",
        "wheels and tires mass",
        "exhaust system mass",
        "electrical system mass",
        "transmission mass",
        "other components mass",
        "lightweighting",
        "converter mass",
        "electric engine mass",
        "inverter mass",
        "power distribution unit mass",
        "combustion engine mass",
        "fuel cell stack mass",
        "fuel cell lifetime replacements",
        "fuel cell essential BoP mass",
        "fuel cell ancillary BoP mass",
        "battery cell mass",
        "battery BoP mass",
        "battery lifetime replacements",
        "fuel tank mass",
        "fuel mass",
        "range",
        "electricity consumption",
        "oxidation energy stored",
        "daily distance",
        "kilometers per year",
        "lifetime kilometers",
        "CNG pump-to-tank leakage",
        "refrigerant mass",
        "refrigerant leakage rate",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    for (parameter, _) in EXHAUST_POLLUTANTS {
        names.push(parameter.to_string());
    }
    for octave in NOISE_OCTAVES {
        for compartment in NOISE_COMPARTMENTS {
            names.push(noise_flow_name(octave, compartment));
        }
    }
    names
}

/// Assembles the technosphere matrix for one inventory run.
pub struct InventoryBuilder<'a> {
    array: &'a VehicleAttributeArray,
    scope: &'a VehicleScope,
    flows: &'a FlowTable,
}

impl<'a> InventoryBuilder<'a> {
    pub fn new(
        array: &'a VehicleAttributeArray,
        scope: &'a VehicleScope,
        flows: &'a FlowTable,
    ) -> Result<Self> {
        if array.configs() != scope.len() {
            return Err(BusLciError::DimensionError(format!(
                "Attribute array config axis ({}) must match scope ({} configurations)",
                array.configs(),
                scope.len()
            )));
        }
        if array.samples() == 0 {
            return Err(BusLciError::DimensionError(
                "Attribute array holds zero samples".to_string(),
            ));
        }
        if flows.vehicle_cols.len() != scope.len() {
            return Err(BusLciError::DimensionError(format!(
                "Flow table covers {} configurations, scope declares {}",
                flows.vehicle_cols.len(),
                scope.len()
            )));
        }
        Ok(Self {
            array,
            scope,
            flows,
        })
    }

    /// Fill in the A matrix. Modifies `a` in place and returns the
    /// contribution ledger that was applied.
    pub fn fill_in_a_matrix(
        &self,
        a: &mut TechnosphereMatrix,
    ) -> Result<Vec<ContributionSet>> {
        let (samples, rows, cols) = a.dims();
        if samples != self.array.samples() {
            return Err(BusLciError::DimensionError(format!(
                "Matrix sample axis ({}) must match attribute array ({})",
                samples,
                self.array.samples()
            )));
        }
        if rows != self.flows.activity_count || cols != self.flows.activity_count {
            return Err(BusLciError::DimensionError(format!(
                "Matrix must be square over the {} registry labels, got {} x {}",
                self.flows.activity_count, rows, cols
            )));
        }

        let sets = self.contributions()?;
        for set in &sets {
            a.apply(&set.exchanges)?;
        }
        log::info!(
            "Assembled technosphere matrix: {} steps, {} exchanges",
            sets.len(),
            sets.iter().map(|s| s.exchanges.len()).sum::<usize>()
        );
        Ok(sets)
    }

    /// Computes the full contribution ledger without touching any matrix.
    /// Steps whose variant selection is empty are omitted.
    pub fn contributions(&self) -> Result<Vec<ContributionSet>> {
        log::info!(
            "Computing inventory contributions for {} configurations x {} samples",
            self.scope.len(),
            self.array.samples()
        );

        let mut sets = Vec::new();
        let mut push = |set: ContributionSet| {
            if !set.exchanges.is_empty() {
                log::debug!("step '{}': {} exchange(s)", set.step, set.exchanges.len());
                sets.push(set);
            } else {
                log::debug!("step '{}' skipped: no matching configurations", set.step);
            }
        };

        // Vehicle build.
        push(self.assembly()?);
        push(self.glider_frame()?);
        push(self.suspension()?);
        push(self.wheels_and_tires()?);
        push(self.exhaust_system()?);
        push(self.electrical_system()?);
        push(self.transmission()?);
        push(self.other_components()?);
        push(self.lightweighting()?);
        push(self.maintenance()?);
        push(self.electric_powertrain()?);
        push(self.combustion_engine()?);
        push(self.fuel_cell_system()?);
        push(self.hydrogen_tank()?);
        push(self.traction_battery()?);
        push(self.lead_acid_battery()?);
        push(self.diesel_fuel_tank()?);
        push(self.cng_tank()?);
        push(self.end_of_life()?);

        // The vehicle dataset must be composed into the transport dataset
        // before any step that targets transport-level columns.
        push(self.vehicle_to_transport()?);

        push(self.electricity_supply()?);
        push(self.hydrogen_supply()?);
        push(self.generator_diesel()?);
        push(self.cng_fuel()?);
        push(self.diesel_fuel()?);
        push(self.abrasion()?);
        push(self.road_construction()?);
        push(self.road_maintenance()?);
        push(self.exhaust_emissions()?);
        push(self.noise_emissions()?);
        push(self.refrigerant_emissions()?);

        // Charging infrastructure amortization.
        push(self.plugin_chargers()?);
        push(self.pantograph_chargers()?);
        push(self.overhead_lines()?);

        Ok(sets)
    }

    fn all_configs(&self) -> Vec<usize> {
        (0..self.scope.len()).collect()
    }

    fn select(&self, powertrains: &[Powertrain]) -> Vec<usize> {
        self.scope.select(&VariantQuery::any(powertrains))
    }

    fn select_year(&self, powertrains: &[Powertrain], year: u16) -> Vec<usize> {
        self.scope.select(&VariantQuery::all(powertrains, year))
    }

    /// One exchange per (sample, selected config), at `row` and the config's
    /// column from `cols`.
    fn exchanges_for(
        &self,
        row: usize,
        configs: &[usize],
        cols: &[usize],
        mut value: impl FnMut(usize, usize) -> Result<f64>,
    ) -> Result<Vec<Exchange>> {
        let mut exchanges = Vec::with_capacity(self.array.samples() * configs.len());
        for sample in 0..self.array.samples() {
            for &config in configs {
                exchanges.push(Exchange::new(
                    sample,
                    row,
                    cols[config],
                    value(sample, config)?,
                ));
            }
        }
        Ok(exchanges)
    }

    /// Mass-proportional supply input: `-parameter` at the vehicle columns of
    /// the selected configs.
    fn mass_input(
        &self,
        step: &'static str,
        row: usize,
        parameter: &str,
        configs: &[usize],
    ) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(row, configs, &self.flows.vehicle_cols, |s, c| {
            Ok(-self.array.value(parameter, s, c)?)
        })?;
        Ok(ContributionSet { step, exchanges })
    }

    fn assembly(&self) -> Result<ContributionSet> {
        self.mass_input(
            "assembly",
            self.flows.assembly,
            "curb mass",
            &self.all_configs(),
        )
    }

    fn glider_frame(&self) -> Result<ContributionSet> {
        self.mass_input(
            "glider frame",
            self.flows.frame,
            "glider base mass",
            &self.all_configs(),
        )
    }

    fn suspension(&self) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(
            self.flows.suspension,
            &self.all_configs(),
            &self.flows.vehicle_cols,
            |s, c| {
                Ok(-(self.array.value("suspension mass", s, c)?
                    + self.array.value("braking system mass", s, c)?))
            },
        )?;
        Ok(ContributionSet {
            step: "suspension and brakes",
            exchanges,
        })
    }

    fn wheels_and_tires(&self) -> Result<ContributionSet> {
        self.mass_input(
            "wheels and tires",
            self.flows.tires_and_wheels,
            "wheels and tires mass",
            &self.all_configs(),
        )
    }

    fn exhaust_system(&self) -> Result<ContributionSet> {
        self.mass_input(
            "exhaust system",
            self.flows.exhaust_system,
            "exhaust system mass",
            &self.all_configs(),
        )
    }

    fn electrical_system(&self) -> Result<ContributionSet> {
        self.mass_input(
            "electrical system",
            self.flows.power_electronics,
            "electrical system mass",
            &self.all_configs(),
        )
    }

    /// Transmission mass split across shaft, gearbox and retarder.
    fn transmission(&self) -> Result<ContributionSet> {
        let configs = self.all_configs();
        let mut exchanges = Vec::new();
        for (row, share) in [
            (self.flows.transmission, TRANSMISSION_SHAFT_SHARE),
            (self.flows.gearbox, GEARBOX_SHARE),
            (self.flows.retarder, RETARDER_SHARE),
        ] {
            exchanges.extend(self.exchanges_for(
                row,
                &configs,
                &self.flows.vehicle_cols,
                |s, c| Ok(-(self.array.value("transmission mass", s, c)? * share)),
            )?);
        }
        Ok(ContributionSet {
            step: "transmission",
            exchanges,
        })
    }

    /// "Other components" differ between combustion/hybrid and
    /// electric/fuel-cell drivelines.
    fn other_components(&self) -> Result<ContributionSet> {
        let mut exchanges = self.exchanges_for(
            self.flows.other_components_hybrid,
            &self.select(COMBUSTION_VARIANTS),
            &self.flows.vehicle_cols,
            |s, c| Ok(-self.array.value("other components mass", s, c)?),
        )?;
        exchanges.extend(self.exchanges_for(
            self.flows.other_components_electric,
            &self.select(ELECTRIC_VARIANTS),
            &self.flows.vehicle_cols,
            |s, c| Ok(-self.array.value("other components mass", s, c)?),
        )?);
        Ok(ContributionSet {
            step: "other components",
            exchanges,
        })
    }

    fn lightweighting(&self) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(
            self.flows.glider_lightweighting,
            &self.all_configs(),
            &self.flows.vehicle_cols,
            |s, c| {
                Ok(-(self.array.value("lightweighting", s, c)?
                    * self.array.value("glider base mass", s, c)?))
            },
        )?;
        Ok(ContributionSet {
            step: "glider lightweighting",
            exchanges,
        })
    }

    fn maintenance(&self) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(
            self.flows.maintenance,
            &self.all_configs(),
            &self.flows.vehicle_cols,
            |s, c| Ok(-(self.array.value("gross mass", s, c)? / REFERENCE_GROSS_MASS_KG)),
        )?;
        Ok(ContributionSet {
            step: "maintenance",
            exchanges,
        })
    }

    fn electric_powertrain(&self) -> Result<ContributionSet> {
        let configs = self.all_configs();
        let mut exchanges = Vec::new();
        for (row, parameter) in [
            (self.flows.converter, "converter mass"),
            (self.flows.electric_motor, "electric engine mass"),
            (self.flows.inverter, "inverter mass"),
            (
                self.flows.power_distribution_unit,
                "power distribution unit mass",
            ),
        ] {
            exchanges.extend(self.exchanges_for(
                row,
                &configs,
                &self.flows.vehicle_cols,
                |s, c| Ok(-self.array.value(parameter, s, c)?),
            )?);
        }
        Ok(ContributionSet {
            step: "electric powertrain components",
            exchanges,
        })
    }

    fn combustion_engine(&self) -> Result<ContributionSet> {
        self.mass_input(
            "combustion engine",
            self.flows.combustion_engine,
            "combustion engine mass",
            &self.all_configs(),
        )
    }

    /// Stack requirement covers in-service replacements over the vehicle
    /// life.
    fn fuel_cell_system(&self) -> Result<ContributionSet> {
        let configs = self.select(&[Powertrain::Fcev]);
        let mut exchanges = self.exchanges_for(
            self.flows.fuel_cell_stack,
            &configs,
            &self.flows.vehicle_cols,
            |s, c| {
                Ok(-(self.array.value("fuel cell stack mass", s, c)?
                    * (1.0 + self.array.value("fuel cell lifetime replacements", s, c)?)))
            },
        )?;
        exchanges.extend(self.exchanges_for(
            self.flows.fuel_cell_bop,
            &configs,
            &self.flows.vehicle_cols,
            |s, c| {
                Ok(-(self.array.value("fuel cell essential BoP mass", s, c)?
                    + self.array.value("fuel cell ancillary BoP mass", s, c)?))
            },
        )?);
        Ok(ContributionSet {
            step: "fuel cell system",
            exchanges,
        })
    }

    fn hydrogen_tank(&self) -> Result<ContributionSet> {
        let configs = self.select(&[Powertrain::Fcev]);
        self.mass_input(
            "hydrogen tank",
            self.flows.hydrogen_tank,
            "fuel tank mass",
            &configs,
        )
    }

    /// Total battery requirement is the installed mass times one plus the
    /// expected replacements over the vehicle life.
    fn traction_battery(&self) -> Result<ContributionSet> {
        let configs = self.select(LITHIUM_BATTERY_VARIANTS);
        let mut exchanges = self.exchanges_for(
            self.flows.battery_cell,
            &configs,
            &self.flows.vehicle_cols,
            |s, c| {
                Ok(-(self.array.value("battery cell mass", s, c)?
                    * (1.0 + self.array.value("battery lifetime replacements", s, c)?)))
            },
        )?;
        exchanges.extend(self.exchanges_for(
            self.flows.battery_bop,
            &configs,
            &self.flows.vehicle_cols,
            |s, c| Ok(-self.array.value("battery BoP mass", s, c)?),
        )?);
        Ok(ContributionSet {
            step: "traction battery",
            exchanges,
        })
    }

    fn lead_acid_battery(&self) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(
            self.flows.lead_acid_battery,
            &self.select(LEAD_ACID_VARIANTS),
            &self.flows.vehicle_cols,
            |s, c| {
                Ok(-((self.array.value("battery BoP mass", s, c)?
                    + self.array.value("battery cell mass", s, c)?)
                    * (1.0 + self.array.value("battery lifetime replacements", s, c)?)))
            },
        )?;
        Ok(ContributionSet {
            step: "lead acid battery",
            exchanges,
        })
    }

    fn diesel_fuel_tank(&self) -> Result<ContributionSet> {
        let configs = self.select(DIESEL_TANK_VARIANTS);
        self.mass_input(
            "diesel fuel tank",
            self.flows.diesel_fuel_tank,
            "fuel tank mass",
            &configs,
        )
    }

    fn cng_tank(&self) -> Result<ContributionSet> {
        let configs = self.select(&[Powertrain::IcevG]);
        self.mass_input("cng tank", self.flows.cng_tank, "fuel tank mass", &configs)
    }

    fn end_of_life(&self) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(
            self.flows.used_vehicle_treatment,
            &self.all_configs(),
            &self.flows.vehicle_cols,
            |s, c| Ok(self.array.value("gross mass", s, c)? / REFERENCE_GROSS_MASS_KG),
        )?;
        Ok(ContributionSet {
            step: "end-of-life treatment",
            exchanges,
        })
    }

    /// Composes the vehicle dataset into the transport-service dataset: one
    /// vehicle amortized over its lifetime mileage per vehicle-kilometre.
    fn vehicle_to_transport(&self) -> Result<ContributionSet> {
        let mut exchanges = Vec::with_capacity(self.array.samples() * self.scope.len());
        for sample in 0..self.array.samples() {
            for config in 0..self.scope.len() {
                let lifetime = self.array.value("lifetime kilometers", sample, config)?;
                exchanges.push(Exchange::new(
                    sample,
                    self.flows.vehicle_cols[config],
                    self.flows.transport_cols[config],
                    -1.0 / lifetime,
                ));
            }
        }
        Ok(ContributionSet {
            step: "vehicle to transport",
            exchanges,
        })
    }

    fn electricity_supply(&self) -> Result<ContributionSet> {
        let mut exchanges = Vec::new();
        for (&year, &row) in &self.flows.electricity_supply {
            let configs = self.select_year(GRID_ELECTRIC_VARIANTS, year);
            exchanges.extend(self.exchanges_for(
                row,
                &configs,
                &self.flows.transport_cols,
                |s, c| Ok(-self.array.value("electricity consumption", s, c)?),
            )?);
        }
        Ok(ContributionSet {
            step: "electricity supply",
            exchanges,
        })
    }

    fn hydrogen_supply(&self) -> Result<ContributionSet> {
        let mut exchanges = Vec::new();
        for (&year, &row) in &self.flows.hydrogen_supply {
            let configs = self.select_year(&[Powertrain::Fcev], year);
            exchanges.extend(self.exchanges_for(
                row,
                &configs,
                &self.flows.transport_cols,
                |s, c| {
                    Ok(-(self.array.value("fuel mass", s, c)?
                        / self.array.value("range", s, c)?))
                },
            )?);
        }
        Ok(ContributionSet {
            step: "hydrogen supply",
            exchanges,
        })
    }

    /// Diesel burned in the onboard generating set of in-motion charging
    /// buses. Skipped entirely when BEV-motion is outside the declared scope.
    fn generator_diesel(&self) -> Result<ContributionSet> {
        if !self.scope.contains_powertrain(Powertrain::BevMotion) {
            return Ok(ContributionSet {
                step: "generator diesel",
                exchanges: Vec::new(),
            });
        }
        let configs = self.select(&[Powertrain::BevMotion]);
        let exchanges = self.exchanges_for(
            self.flows.generator_diesel,
            &configs,
            &self.flows.transport_cols,
            |s, c| {
                Ok(-(self.array.value("oxidation energy stored", s, c)?
                    / self.array.value("daily distance", s, c)?))
            },
        )?;
        Ok(ContributionSet {
            step: "generator diesel",
            exchanges,
        })
    }

    /// CNG supply with pump-to-tank leakage: extra fuel is purchased to cover
    /// the leaked share, and the leaked share escapes as fugitive methane.
    /// Leakage rates vary by year, so the correction is applied per year.
    fn cng_fuel(&self) -> Result<ContributionSet> {
        let mut exchanges = Vec::new();
        for (&year, &row) in &self.flows.cng_supply {
            let configs = self.select_year(&[Powertrain::IcevG], year);
            for sample in 0..self.array.samples() {
                for &config in &configs {
                    let amount = self.array.value("fuel mass", sample, config)?
                        / self.array.value("range", sample, config)?;
                    let leakage =
                        self.array.value("CNG pump-to-tank leakage", sample, config)?;
                    let col = self.flows.transport_cols[config];
                    exchanges.push(Exchange::new(
                        sample,
                        row,
                        col,
                        -(amount * (1.0 + leakage)),
                    ));
                    exchanges.push(Exchange::new(
                        sample,
                        self.flows.methane_fossil,
                        col,
                        amount * leakage,
                    ));
                }
            }
        }
        Ok(ContributionSet {
            step: "cng fuel",
            exchanges,
        })
    }

    fn diesel_fuel(&self) -> Result<ContributionSet> {
        let mut exchanges = Vec::new();
        for (&year, &row) in &self.flows.diesel_supply {
            let configs = self.select_year(DIESEL_FUEL_VARIANTS, year);
            exchanges.extend(self.exchanges_for(
                row,
                &configs,
                &self.flows.transport_cols,
                |s, c| {
                    Ok(-(self.array.value("fuel mass", s, c)?
                        / self.array.value("range", s, c)?))
                },
            )?);
        }
        Ok(ContributionSet {
            step: "diesel fuel",
            exchanges,
        })
    }

    /// Tire, brake, road wear and re-suspended dust from the particulates
    /// model, as inputs to their treatment flows.
    fn abrasion(&self) -> Result<ContributionSet> {
        let samples = self.array.samples();
        let sizes: Vec<_> = self.scope.configs().iter().map(|c| c.size).collect();
        let mut mass = Vec::with_capacity(samples * self.scope.len());
        for sample in 0..samples {
            for config in 0..self.scope.len() {
                mass.push(self.array.value("driving mass", sample, config)?);
            }
        }
        let emissions =
            ParticulatesEmissionsModel::new(&sizes, &mass, samples)?.get_abrasion_emissions();

        let configs = self.all_configs();
        let mut exchanges = Vec::new();
        for (category, row) in [
            (WearCategory::Tire, self.flows.tyre_wear),
            (WearCategory::Brake, self.flows.brake_wear),
            (WearCategory::Road, self.flows.road_wear),
            (WearCategory::Dust, self.flows.road_dust),
        ] {
            exchanges.extend(self.exchanges_for(
                row,
                &configs,
                &self.flows.transport_cols,
                |s, c| Ok(-emissions.get(s, c, category)),
            )?);
        }
        Ok(ContributionSet {
            step: "abrasion emissions",
            exchanges,
        })
    }

    fn road_construction(&self) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(
            self.flows.road,
            &self.all_configs(),
            &self.flows.transport_cols,
            |s, c| {
                Ok(-(ROAD_CONSTRUCTION_PER_KG_KM * self.array.value("gross mass", s, c)?))
            },
        )?;
        Ok(ContributionSet {
            step: "road construction",
            exchanges,
        })
    }

    fn road_maintenance(&self) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(
            self.flows.road_maintenance,
            &self.all_configs(),
            &self.flows.transport_cols,
            |s, c| {
                Ok(-(ROAD_MAINTENANCE_PER_KM * self.array.value("gross mass", s, c)?
                    / REFERENCE_GROSS_MASS_KG))
            },
        )?;
        Ok(ContributionSet {
            step: "road maintenance",
            exchanges,
        })
    }

    fn exhaust_emissions(&self) -> Result<ContributionSet> {
        let configs = self.all_configs();
        let mut exchanges = Vec::new();
        for (i, (parameter, _)) in EXHAUST_POLLUTANTS.iter().enumerate() {
            exchanges.extend(self.exchanges_for(
                self.flows.exhaust[i],
                &configs,
                &self.flows.transport_cols,
                |s, c| self.array.value(parameter, s, c).map_err(Into::into),
            )?);
        }
        Ok(ContributionSet {
            step: "exhaust emissions",
            exchanges,
        })
    }

    fn noise_emissions(&self) -> Result<ContributionSet> {
        let configs = self.all_configs();
        let mut exchanges = Vec::new();
        let mut flow = 0;
        for octave in NOISE_OCTAVES {
            for compartment in NOISE_COMPARTMENTS {
                let parameter = noise_flow_name(octave, compartment);
                exchanges.extend(self.exchanges_for(
                    self.flows.noise[flow],
                    &configs,
                    &self.flows.transport_cols,
                    |s, c| self.array.value(&parameter, s, c).map_err(Into::into),
                )?);
                flow += 1;
            }
        }
        Ok(ContributionSet {
            step: "noise emissions",
            exchanges,
        })
    }

    /// Refrigerant: the initial charge is amortized over lifetime mileage,
    /// the annual leakage is re-purchased and escapes as HFC-134a.
    fn refrigerant_emissions(&self) -> Result<ContributionSet> {
        let configs = self.all_configs();
        let mut exchanges = self.exchanges_for(
            self.flows.refrigerant_emission,
            &configs,
            &self.flows.transport_cols,
            |s, c| {
                Ok(self.array.value("refrigerant mass", s, c)?
                    * self.array.value("refrigerant leakage rate", s, c)?
                    / self.array.value("kilometers per year", s, c)?)
            },
        )?;
        exchanges.extend(self.exchanges_for(
            self.flows.refrigerant_supply,
            &configs,
            &self.flows.transport_cols,
            |s, c| {
                let mass = self.array.value("refrigerant mass", s, c)?;
                let leakage = mass * self.array.value("refrigerant leakage rate", s, c)?
                    / self.array.value("kilometers per year", s, c)?;
                let charge = mass / self.array.value("lifetime kilometers", s, c)?;
                Ok(-(charge + leakage))
            },
        )?);
        Ok(ContributionSet {
            step: "refrigerant",
            exchanges,
        })
    }

    /// Depot charging stations serve 2 vehicles for 24 years.
    fn plugin_chargers(&self) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(
            self.flows.charger_plugin,
            &self.select(PLUGIN_CHARGING_VARIANTS),
            &self.flows.vehicle_cols,
            |s, c| {
                Ok(-1.0
                    / (self.array.value("kilometers per year", s, c)? * PLUGIN_CHARGER_SHARE))
            },
        )?;
        Ok(ContributionSet {
            step: "plugin chargers",
            exchanges,
        })
    }

    /// Pantograph charging stations serve 10 vehicles for 24 years.
    fn pantograph_chargers(&self) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(
            self.flows.charger_pantograph,
            &self.select(&[Powertrain::BevOpp]),
            &self.flows.vehicle_cols,
            |s, c| {
                Ok(-1.0
                    / (self.array.value("kilometers per year", s, c)?
                        * PANTOGRAPH_CHARGER_SHARE))
            },
        )?;
        Ok(ContributionSet {
            step: "pantograph chargers",
            exchanges,
        })
    }

    /// Overhead lines serve 60 vehicles for 40 years; the share is taken on
    /// lifetime mileage rather than annual mileage.
    fn overhead_lines(&self) -> Result<ContributionSet> {
        let exchanges = self.exchanges_for(
            self.flows.overhead_lines,
            &self.select(&[Powertrain::BevMotion]),
            &self.flows.vehicle_cols,
            |s, c| {
                Ok(-1.0
                    / (self.array.value("lifetime kilometers", s, c)? * OVERHEAD_LINE_SHARE))
            },
        )?;
        Ok(ContributionSet {
            step: "overhead lines",
            exchanges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::flow_catalogue;
    use crate::scope::SizeClass;
    use lci_core::ActivityRegistry;

    const TOLERANCE: f64 = 1e-12;

    // Keeps every divisor away from zero; masses default to zero and are set
    // per test.
    fn array_for(scope: &VehicleScope, samples: usize) -> VehicleAttributeArray {
        let mut array =
            VehicleAttributeArray::new(required_parameters(), samples, scope.len()).unwrap();
        array.fill("range", 400.0).unwrap();
        array.fill("daily distance", 250.0).unwrap();
        array.fill("kilometers per year", 60_000.0).unwrap();
        array.fill("lifetime kilometers", 800_000.0).unwrap();
        array
    }

    fn assemble(
        scope: &VehicleScope,
        array: &VehicleAttributeArray,
    ) -> (ActivityRegistry, TechnosphereMatrix, Vec<ContributionSet>) {
        let registry = ActivityRegistry::new(flow_catalogue(scope)).unwrap();
        let flows = FlowTable::build(&registry, scope).unwrap();
        let builder = InventoryBuilder::new(array, scope, &flows).unwrap();
        let mut a = TechnosphereMatrix::new(array.samples(), registry.len(), registry.len());
        let sets = builder.fill_in_a_matrix(&mut a).unwrap();
        (registry, a, sets)
    }

    // Helper to read a cell by row/column label, like the string-ID lookups
    // used elsewhere in the test suite.
    fn cell(registry: &ActivityRegistry, a: &TechnosphereMatrix, row: &str, col: &str) -> f64 {
        a.get(
            0,
            registry.index_of(row).unwrap(),
            registry.index_of(col).unwrap(),
        )
        .unwrap()
    }

    fn diesel_scope() -> VehicleScope {
        VehicleScope::new(
            vec![Powertrain::IcevD],
            vec![SizeClass::Coach13m],
            vec![2020],
        )
    }

    const DIESEL_BUS: &str = "Bus, 13m-coach, ICEV-d, 2020";
    const DIESEL_TRANSPORT: &str = "transport, bus, 13m-coach, ICEV-d, 2020";

    #[test]
    fn test_maintenance_and_end_of_life_at_reference_mass() {
        let scope = diesel_scope();
        let mut array = array_for(&scope, 1);
        array.set("curb mass", 0, 0, 12_000.0).unwrap();
        array.set("gross mass", 0, 0, 19_000.0).unwrap();
        let (registry, a, _) = assemble(&scope, &array);

        // 19000 kg gross mass is exactly the reference weight class.
        assert_eq!(cell(&registry, &a, "maintenance, bus", DIESEL_BUS), -1.0);
        assert_eq!(cell(&registry, &a, "treatment of used bus", DIESEL_BUS), 1.0);
        assert_eq!(
            cell(&registry, &a, "assembly operation, for lorry", DIESEL_BUS),
            -12_000.0
        );
    }

    #[test]
    fn test_transmission_split_partitions_full_mass() {
        let scope = diesel_scope();
        let mut array = array_for(&scope, 1);
        array.set("transmission mass", 0, 0, 1_000.0).unwrap();
        let (registry, a, _) = assemble(&scope, &array);

        let shaft = cell(&registry, &a, "transmission, for lorry", DIESEL_BUS);
        let gearbox = cell(&registry, &a, "gearbox, for lorry", DIESEL_BUS);
        let retarder = cell(&registry, &a, "retarder, for lorry", DIESEL_BUS);
        assert!((shaft - -520.0).abs() < TOLERANCE);
        assert!((gearbox - -360.0).abs() < TOLERANCE);
        assert!((retarder - -120.0).abs() < TOLERANCE);
        assert!((shaft + gearbox + retarder - -1_000.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_vehicle_composed_into_transport_dataset() {
        let scope = diesel_scope();
        let array = array_for(&scope, 1);
        let (registry, a, _) = assemble(&scope, &array);

        let coefficient = cell(&registry, &a, DIESEL_BUS, DIESEL_TRANSPORT);
        assert!((coefficient - -1.0 / 800_000.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_skipped_variants_leave_exclusive_rows_at_zero() {
        let scope = diesel_scope();
        let mut array = array_for(&scope, 1);
        // Nonzero masses everywhere a skipped variant would read from.
        array.set("battery cell mass", 0, 0, 300.0).unwrap();
        array.set("fuel cell stack mass", 0, 0, 100.0).unwrap();
        array.set("fuel tank mass", 0, 0, 120.0).unwrap();
        let (registry, a, _) = assemble(&scope, &array);

        let exclusive_rows = [
            "market for battery cell, Li-ion",
            "market for battery, Li-ion, rechargeable, prismatic",
            "fuel cell stack",
            "fuel cell balance of plant",
            "fuel tank, compressed hydrogen gas, 700bar",
            "fuel tank, compressed natural gas, 200 bar",
            "EV charger, level 3, plugin, 200 kW",
            "EV charger, level 3, with pantograph, 450 kW",
            "Overhead lines",
            "diesel, burned in diesel-electric generating set, 18.5kW",
            "electricity supply for electric vehicles, 2020",
            "fuel supply for hydrogen vehicles, 2020",
            "fuel supply for cng vehicles, 2020",
            "Methane, fossil",
        ];
        let forbidden: Vec<usize> = exclusive_rows
            .iter()
            .map(|label| registry.index_of(label).unwrap())
            .collect();
        for exchange in a.iter_nonzero() {
            assert!(
                !forbidden.contains(&exchange.row()),
                "stray write in row '{}'",
                registry.label(exchange.row()).unwrap()
            );
        }
        // The ICEV-d lead-acid battery, by contrast, is present.
        assert!(cell(&registry, &a, "lead acid battery, for lorry", DIESEL_BUS) < 0.0);
        assert!(cell(&registry, &a, "fuel tank, for diesel vehicle", DIESEL_BUS) < 0.0);
    }

    #[test]
    fn test_cng_leakage_scales_supply_and_fugitive_methane() {
        let scope = VehicleScope::new(
            vec![Powertrain::IcevG],
            vec![SizeClass::Coach13m],
            vec![2020],
        );
        let gas_bus = "Bus, 13m-coach, ICEV-g, 2020";
        let gas_transport = "transport, bus, 13m-coach, ICEV-g, 2020";

        // Zero-leakage baseline: 40 kg tank over 400 km range = 0.1 kg/km.
        let mut array = array_for(&scope, 1);
        array.set("fuel mass", 0, 0, 40.0).unwrap();
        let (registry, baseline, _) = assemble(&scope, &array);
        let base_supply = cell(
            &registry,
            &baseline,
            "fuel supply for cng vehicles, 2020",
            gas_transport,
        );
        assert!((base_supply - -0.1).abs() < TOLERANCE);
        assert_eq!(
            cell(&registry, &baseline, "Methane, fossil", gas_transport),
            0.0
        );

        array.set("CNG pump-to-tank leakage", 0, 0, 0.02).unwrap();
        let (registry, leaking, _) = assemble(&scope, &array);
        let supply = cell(
            &registry,
            &leaking,
            "fuel supply for cng vehicles, 2020",
            gas_transport,
        );
        let methane = cell(&registry, &leaking, "Methane, fossil", gas_transport);
        assert!((supply - base_supply * 1.02).abs() < TOLERANCE);
        assert!((methane - 0.1 * 0.02).abs() < TOLERANCE);
        // No leakage correction leaks onto the vehicle-level column.
        assert_eq!(cell(&registry, &leaking, "Methane, fossil", gas_bus), 0.0);
    }

    #[test]
    fn test_infrastructure_amortization_shares() {
        let scope = VehicleScope::new(
            vec![
                Powertrain::BevDepot,
                Powertrain::BevOpp,
                Powertrain::BevMotion,
            ],
            vec![SizeClass::City13m],
            vec![2020],
        );
        let array = array_for(&scope, 1);
        let (registry, a, _) = assemble(&scope, &array);

        let depot = "Bus, 13m-city, BEV-depot, 2020";
        let opp = "Bus, 13m-city, BEV-opp, 2020";
        let motion = "Bus, 13m-city, BEV-motion, 2020";

        let plugin = cell(&registry, &a, "EV charger, level 3, plugin, 200 kW", depot);
        let pantograph = cell(
            &registry,
            &a,
            "EV charger, level 3, with pantograph, 450 kW",
            opp,
        );
        let overhead = cell(&registry, &a, "Overhead lines", motion);

        // Plug-in: 2 vehicles x 24 years on annual mileage.
        assert!((plugin - -1.0 / (60_000.0 * 2.0 * 24.0)).abs() < TOLERANCE);
        // Pantograph: 10 vehicles x 24 years on annual mileage.
        assert!((pantograph - -1.0 / (60_000.0 * 10.0 * 24.0)).abs() < TOLERANCE);
        // Overhead lines: 60 vehicles x 40 years on lifetime mileage.
        assert!((overhead - -1.0 / (800_000.0 * 60.0 * 40.0)).abs() < TOLERANCE);
        assert!(plugin < 0.0 && pantograph < 0.0 && overhead < 0.0);

        // No cross-technology writes.
        assert_eq!(
            cell(&registry, &a, "EV charger, level 3, plugin, 200 kW", opp),
            0.0
        );
        assert_eq!(cell(&registry, &a, "Overhead lines", depot), 0.0);
    }

    #[test]
    fn test_amortization_scales_inversely_with_mileage() {
        let scope = VehicleScope::new(
            vec![Powertrain::BevDepot],
            vec![SizeClass::City13m],
            vec![2020],
        );
        let depot = "Bus, 13m-city, BEV-depot, 2020";
        let array = array_for(&scope, 1);
        let (registry, a, _) = assemble(&scope, &array);
        let mut doubled = array_for(&scope, 1);
        doubled.fill("kilometers per year", 120_000.0).unwrap();
        let (_, a_doubled, _) = assemble(&scope, &doubled);

        let single = cell(&registry, &a, "EV charger, level 3, plugin, 200 kW", depot);
        let halved = cell(
            &registry,
            &a_doubled,
            "EV charger, level 3, plugin, 200 kW",
            depot,
        );
        assert!((halved - single / 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_generator_diesel_for_in_motion_charging() {
        let scope = VehicleScope::new(
            vec![Powertrain::BevMotion],
            vec![SizeClass::Articulated18m],
            vec![2020],
        );
        let mut array = array_for(&scope, 1);
        array.set("oxidation energy stored", 0, 0, 90.0).unwrap();
        let (registry, a, sets) = assemble(&scope, &array);

        let coefficient = cell(
            &registry,
            &a,
            "diesel, burned in diesel-electric generating set, 18.5kW",
            "transport, bus, 18m, BEV-motion, 2020",
        );
        assert!((coefficient - -90.0 / 250.0).abs() < TOLERANCE);
        assert!(sets.iter().any(|s| s.step == "generator diesel"));
    }

    #[test]
    fn test_other_components_split_by_driveline() {
        let scope = VehicleScope::new(
            vec![Powertrain::IcevD, Powertrain::BevDepot],
            vec![SizeClass::City13m],
            vec![2020],
        );
        let mut array = array_for(&scope, 1);
        array.fill("other components mass", 500.0).unwrap();
        let (registry, a, _) = assemble(&scope, &array);

        let icev = "Bus, 13m-city, ICEV-d, 2020";
        let bev = "Bus, 13m-city, BEV-depot, 2020";
        let hybrid_row = "other components, for hybrid electric lorry";
        let electric_row = "other components, for electric lorry";

        assert_eq!(cell(&registry, &a, hybrid_row, icev), -500.0);
        assert_eq!(cell(&registry, &a, hybrid_row, bev), 0.0);
        assert_eq!(cell(&registry, &a, electric_row, bev), -500.0);
        assert_eq!(cell(&registry, &a, electric_row, icev), 0.0);
    }

    #[test]
    fn test_battery_lifetime_replacement_multiplier() {
        let scope = VehicleScope::new(
            vec![Powertrain::BevDepot],
            vec![SizeClass::City13m],
            vec![2020],
        );
        let mut array = array_for(&scope, 1);
        array.set("battery cell mass", 0, 0, 400.0).unwrap();
        array.set("battery BoP mass", 0, 0, 100.0).unwrap();
        array.set("battery lifetime replacements", 0, 0, 1.5).unwrap();
        let (registry, a, _) = assemble(&scope, &array);

        let bev = "Bus, 13m-city, BEV-depot, 2020";
        assert_eq!(
            cell(&registry, &a, "market for battery cell, Li-ion", bev),
            -400.0 * 2.5
        );
        // The balance-of-plant is installed once.
        assert_eq!(
            cell(
                &registry,
                &a,
                "market for battery, Li-ion, rechargeable, prismatic",
                bev
            ),
            -100.0
        );
    }

    #[test]
    fn test_missing_parameter_fails_before_any_write() {
        let scope = diesel_scope();
        let mut parameters = required_parameters();
        parameters.retain(|p| p != "gross mass");
        let array = VehicleAttributeArray::new(parameters, 1, scope.len()).unwrap();

        let registry = ActivityRegistry::new(flow_catalogue(&scope)).unwrap();
        let flows = FlowTable::build(&registry, &scope).unwrap();
        let builder = InventoryBuilder::new(&array, &scope, &flows).unwrap();
        let mut a = TechnosphereMatrix::new(1, registry.len(), registry.len());
        let result = builder.fill_in_a_matrix(&mut a);
        assert!(result.is_err());
        assert_eq!(a.nnz(), 0, "matrix must not be half-written");
    }

    #[test]
    fn test_matrix_shape_mismatch_rejected() {
        let scope = diesel_scope();
        let array = array_for(&scope, 1);
        let registry = ActivityRegistry::new(flow_catalogue(&scope)).unwrap();
        let flows = FlowTable::build(&registry, &scope).unwrap();
        let builder = InventoryBuilder::new(&array, &scope, &flows).unwrap();

        let mut wrong_samples = TechnosphereMatrix::new(2, registry.len(), registry.len());
        assert!(builder.fill_in_a_matrix(&mut wrong_samples).is_err());
        let mut wrong_size = TechnosphereMatrix::new(1, registry.len(), registry.len() - 1);
        assert!(builder.fill_in_a_matrix(&mut wrong_size).is_err());
    }
}
