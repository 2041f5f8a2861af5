//! Non-exhaust particulate emissions from tire wear, brake wear, road wear
//! and re-suspended road dust.
//!
//! Emission rates follow the allometric (power-law) method of the EEA air
//! pollutant emission inventory guidebook, as disaggregated by driving
//! situation in <https://doi.org/10.1016/j.atmosenv.2020.117886>: each rate
//! scales with vehicle mass as `coefficient * mass^(1/exponent)`, with fixed
//! coefficients per pollutant fraction (PM10, PM2.5) and situation (urban,
//! rural, motorway).

use crate::error::{BusLciError, Result};
use crate::scope::SizeClass;

/// One emission rate per driving situation, in kg per vehicle-kilometre.
///
/// Rural rates are always computed even though the current situation
/// weighting only reads urban and motorway; rural driving is folded into
/// that split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SituationRates {
    pub urban: f64,
    pub rural: f64,
    pub motorway: f64,
}

/// Tire wear PM10, kg per vkm, for a vehicle mass in metric tons.
pub fn tire_wear_pm10(mass_tons: f64) -> SituationRates {
    SituationRates {
        urban: 5.8 * mass_tons.powf(1.0 / 2.3) / 1e6,
        rural: 4.5 * mass_tons.powf(1.0 / 2.3) / 1e6,
        motorway: 3.8 * mass_tons.powf(1.0 / 2.3) / 1e6,
    }
}

/// Tire wear PM2.5, kg per vkm.
pub fn tire_wear_pm25(mass_tons: f64) -> SituationRates {
    SituationRates {
        urban: 8.2 * mass_tons.powf(1.0 / 2.3) / 1e6,
        rural: 6.4 * mass_tons.powf(1.0 / 2.3) / 1e6,
        motorway: 5.5 * mass_tons.powf(1.0 / 2.3) / 1e6,
    }
}

/// Brake wear PM10, kg per vkm. The mass exponent differs per situation.
pub fn brake_wear_pm10(mass_tons: f64) -> SituationRates {
    SituationRates {
        urban: 4.2 * mass_tons.powf(1.0 / 1.9) / 1e6,
        rural: 1.8 * mass_tons.powf(1.0 / 1.5) / 1e6,
        motorway: 0.4 * mass_tons.powf(1.0 / 1.3) / 1e6,
    }
}

/// Brake wear PM2.5, kg per vkm.
pub fn brake_wear_pm25(mass_tons: f64) -> SituationRates {
    SituationRates {
        urban: 11.0 * mass_tons.powf(1.0 / 1.9) / 1e6,
        rural: 4.5 * mass_tons.powf(1.0 / 1.5) / 1e6,
        motorway: 1.0 * mass_tons.powf(1.0 / 1.3) / 1e6,
    }
}

/// Road wear (PM10, PM2.5), kg per vkm; situation-independent.
pub fn road_wear(mass_tons: f64) -> (f64, f64) {
    (
        2.8 * mass_tons.powf(1.0 / 1.5) / 1e6,
        5.1 * mass_tons.powf(1.0 / 1.5) / 1e6,
    )
}

/// Re-suspended road dust (PM10, PM2.5), kg per vkm; situation-independent.
pub fn resuspended_road_dust(mass_tons: f64) -> (f64, f64) {
    (
        2.0 * mass_tons.powf(1.0 / 1.1) / 1e6,
        8.2 * mass_tons.powf(1.0 / 1.1) / 1e6,
    )
}

/// Wear categories in the order they are stacked in [`AbrasionEmissions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WearCategory {
    Tire,
    Brake,
    Road,
    Dust,
}

impl WearCategory {
    pub const ALL: [WearCategory; 4] = [
        WearCategory::Tire,
        WearCategory::Brake,
        WearCategory::Road,
        WearCategory::Dust,
    ];

    fn index(&self) -> usize {
        match self {
            WearCategory::Tire => 0,
            WearCategory::Brake => 1,
            WearCategory::Road => 2,
            WearCategory::Dust => 3,
        }
    }
}

/// Aggregated abrasion emission rates, kg per vkm, indexed by
/// (sample, vehicle slot, wear category).
#[derive(Debug, Clone)]
pub struct AbrasionEmissions {
    samples: usize,
    slots: usize,
    data: Vec<f64>,
}

impl AbrasionEmissions {
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn get(&self, sample: usize, slot: usize, category: WearCategory) -> f64 {
        self.data[(sample * self.slots + slot) * WearCategory::ALL.len() + category.index()]
    }
}

/// Aggregates the allometric rates per vehicle slot, applying the situation
/// weighting: urban-profile size classes use the urban rate alone, all other
/// classes blend 27% urban with 73% motorway driving for tire and brake wear.
/// Road wear and dust carry no situation split.
pub struct ParticulatesEmissionsModel {
    sizes: Vec<SizeClass>,
    mass_tons: Vec<f64>,
    samples: usize,
}

const URBAN_SHARE: f64 = 0.27;
const MOTORWAY_SHARE: f64 = 0.73;

impl ParticulatesEmissionsModel {
    /// `mass_kg` holds one driving mass per (sample, slot), sample-major,
    /// with `sizes` giving the size class of each slot.
    pub fn new(sizes: &[SizeClass], mass_kg: &[f64], samples: usize) -> Result<Self> {
        if mass_kg.len() != samples * sizes.len() {
            return Err(BusLciError::DimensionError(format!(
                "Mass tensor length ({}) must match samples ({}) x slots ({})",
                mass_kg.len(),
                samples,
                sizes.len()
            )));
        }
        Ok(Self {
            sizes: sizes.to_vec(),
            mass_tons: mass_kg.iter().map(|m| m / 1000.0).collect(),
            samples,
        })
    }

    /// Returns the aggregated emission tensor, with the same sample and slot
    /// cardinality as the input mass tensor and the fixed category order
    /// [tire, brake, road, dust].
    pub fn get_abrasion_emissions(&self) -> AbrasionEmissions {
        let slots = self.sizes.len();
        let mut data = Vec::with_capacity(self.samples * slots * WearCategory::ALL.len());

        for sample in 0..self.samples {
            for (slot, size) in self.sizes.iter().enumerate() {
                let mass = self.mass_tons[sample * slots + slot];

                let tire_pm10 = tire_wear_pm10(mass);
                let tire_pm25 = tire_wear_pm25(mass);
                let brake_pm10 = brake_wear_pm10(mass);
                let brake_pm25 = brake_wear_pm25(mass);

                let (tire, brake) = if size.is_urban_profile() {
                    (
                        tire_pm10.urban + tire_pm25.urban,
                        brake_pm10.urban + brake_pm25.urban,
                    )
                } else {
                    (
                        (tire_pm10.urban + tire_pm25.urban) * URBAN_SHARE
                            + (tire_pm10.motorway + tire_pm25.motorway) * MOTORWAY_SHARE,
                        (brake_pm10.urban + brake_pm25.urban) * URBAN_SHARE
                            + (brake_pm10.motorway + brake_pm25.motorway) * MOTORWAY_SHARE,
                    )
                };

                let (road_pm10, road_pm25) = road_wear(mass);
                let (dust_pm10, dust_pm25) = resuspended_road_dust(mass);

                data.push(tire);
                data.push(brake);
                data.push(road_pm10 + road_pm25);
                data.push(dust_pm10 + dust_pm25);
            }
        }

        AbrasionEmissions {
            samples: self.samples,
            slots,
            data,
        }
    }
}
