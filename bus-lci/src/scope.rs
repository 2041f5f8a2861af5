use serde::{Deserialize, Serialize};

use crate::error::FlowTableError;

/// A modeled bus driveline configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Powertrain {
    /// Diesel internal combustion.
    IcevD,
    /// Compressed-gas internal combustion.
    IcevG,
    /// Diesel hybrid.
    HevD,
    /// Diesel plug-in hybrid.
    PhevD,
    /// Battery electric, opportunity charging (pantograph).
    BevOpp,
    /// Battery electric, overnight depot charging.
    BevDepot,
    /// Battery electric, in-motion charging (overhead lines).
    BevMotion,
    /// Fuel cell electric.
    Fcev,
}

impl Powertrain {
    pub const ALL: [Powertrain; 8] = [
        Powertrain::IcevD,
        Powertrain::IcevG,
        Powertrain::HevD,
        Powertrain::PhevD,
        Powertrain::BevOpp,
        Powertrain::BevDepot,
        Powertrain::BevMotion,
        Powertrain::Fcev,
    ];

    /// The token used in activity labels and selector queries.
    pub fn token(&self) -> &'static str {
        match self {
            Powertrain::IcevD => "ICEV-d",
            Powertrain::IcevG => "ICEV-g",
            Powertrain::HevD => "HEV-d",
            Powertrain::PhevD => "PHEV-d",
            Powertrain::BevOpp => "BEV-opp",
            Powertrain::BevDepot => "BEV-depot",
            Powertrain::BevMotion => "BEV-motion",
            Powertrain::Fcev => "FCEV",
        }
    }
}

impl std::str::FromStr for Powertrain {
    type Err = FlowTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Powertrain::ALL
            .into_iter()
            .find(|p| p.token() == s)
            .ok_or_else(|| FlowTableError::UnknownPowertrain(s.to_string()))
    }
}

/// Bus size class. The `13m` classes come in single and double-deck forms and
/// in city (urban duty cycle) and coach (intercity duty cycle) forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeClass {
    Midibus9m,
    City13m,
    CityDouble13m,
    Coach13m,
    CoachDouble13m,
    Articulated18m,
}

impl SizeClass {
    pub const ALL: [SizeClass; 6] = [
        SizeClass::Midibus9m,
        SizeClass::City13m,
        SizeClass::CityDouble13m,
        SizeClass::Coach13m,
        SizeClass::CoachDouble13m,
        SizeClass::Articulated18m,
    ];

    /// The token used in activity labels and selector queries.
    pub fn token(&self) -> &'static str {
        match self {
            SizeClass::Midibus9m => "9m",
            SizeClass::City13m => "13m-city",
            SizeClass::CityDouble13m => "13m-city-double",
            SizeClass::Coach13m => "13m-coach",
            SizeClass::CoachDouble13m => "13m-coach-double",
            SizeClass::Articulated18m => "18m",
        }
    }

    /// Size classes configured for urban-only duty. Their non-exhaust
    /// particulate rates use the urban driving situation alone; all other
    /// classes blend urban and motorway driving.
    pub fn is_urban_profile(&self) -> bool {
        matches!(
            self,
            SizeClass::Midibus9m | SizeClass::City13m | SizeClass::CityDouble13m
        )
    }
}

impl std::str::FromStr for SizeClass {
    type Err = FlowTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeClass::ALL
            .into_iter()
            .find(|c| c.token() == s)
            .ok_or_else(|| FlowTableError::UnknownSizeClass(s.to_string()))
    }
}

/// One modeled vehicle configuration: a point on the powertrain x size x year
/// axes of the attribute array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleConfig {
    pub powertrain: Powertrain,
    pub size: SizeClass,
    pub year: u16,
}

/// The declared powertrain/size/year space of one inventory run.
///
/// Configurations enumerate the cartesian product powertrain-major, then
/// size, then year; the attribute array's config axis follows the same order.
/// The declared powertrain set may be a strict subset of [`Powertrain::ALL`];
/// steps targeting absent variants are skipped by their selectors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VehicleScope {
    powertrains: Vec<Powertrain>,
    sizes: Vec<SizeClass>,
    years: Vec<u16>,
    configs: Vec<VehicleConfig>,
}

impl VehicleScope {
    pub fn new(powertrains: Vec<Powertrain>, sizes: Vec<SizeClass>, years: Vec<u16>) -> Self {
        let mut configs =
            Vec::with_capacity(powertrains.len() * sizes.len() * years.len());
        for &powertrain in &powertrains {
            for &size in &sizes {
                for &year in &years {
                    configs.push(VehicleConfig {
                        powertrain,
                        size,
                        year,
                    });
                }
            }
        }
        Self {
            powertrains,
            sizes,
            years,
            configs,
        }
    }

    pub fn powertrains(&self) -> &[Powertrain] {
        &self.powertrains
    }

    pub fn sizes(&self) -> &[SizeClass] {
        &self.sizes
    }

    pub fn years(&self) -> &[u16] {
        &self.years
    }

    pub fn configs(&self) -> &[VehicleConfig] {
        &self.configs
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn contains_powertrain(&self, powertrain: Powertrain) -> bool {
        self.powertrains.contains(&powertrain)
    }

    /// Returns the config indices matched by `query`, in config order.
    ///
    /// A query naming only powertrains absent from the scope returns an empty
    /// selection; callers treat that as "skip this step", not as an error.
    pub fn select(&self, query: &VariantQuery) -> Vec<usize> {
        self.configs
            .iter()
            .enumerate()
            .filter(|(_, config)| query.matches(config))
            .map(|(i, _)| i)
            .collect()
    }
}

/// How a [`VariantQuery`]'s constraints combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineMode {
    /// A config matches when it satisfies any named constraint.
    Any,
    /// A config matches only when it satisfies every constraint group;
    /// needed when powertrains and a year are specified together.
    All,
}

/// Selector over the scope's config axis: a set of powertrain tokens, an
/// optional set of years, and an explicit combination mode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariantQuery {
    pub powertrains: Vec<Powertrain>,
    pub years: Vec<u16>,
    pub mode: CombineMode,
}

impl VariantQuery {
    /// Match any of the named powertrains, regardless of year.
    pub fn any(powertrains: &[Powertrain]) -> Self {
        Self {
            powertrains: powertrains.to_vec(),
            years: Vec::new(),
            mode: CombineMode::Any,
        }
    }

    /// Match the named powertrains restricted to the named year.
    pub fn all(powertrains: &[Powertrain], year: u16) -> Self {
        Self {
            powertrains: powertrains.to_vec(),
            years: vec![year],
            mode: CombineMode::All,
        }
    }

    fn matches(&self, config: &VehicleConfig) -> bool {
        let powertrain_hit =
            !self.powertrains.is_empty() && self.powertrains.contains(&config.powertrain);
        let year_hit = !self.years.is_empty() && self.years.contains(&config.year);
        match self.mode {
            CombineMode::Any => powertrain_hit || year_hit,
            CombineMode::All => {
                (self.powertrains.is_empty() || powertrain_hit)
                    && (self.years.is_empty() || year_hit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> VehicleScope {
        VehicleScope::new(
            vec![Powertrain::IcevD, Powertrain::BevDepot],
            vec![SizeClass::City13m, SizeClass::Coach13m],
            vec![2020, 2030],
        )
    }

    #[test]
    fn test_config_enumeration_order() {
        let scope = scope();
        assert_eq!(scope.len(), 8);
        // powertrain-major, then size, then year
        assert_eq!(
            scope.configs()[0],
            VehicleConfig {
                powertrain: Powertrain::IcevD,
                size: SizeClass::City13m,
                year: 2020
            }
        );
        assert_eq!(
            scope.configs()[5],
            VehicleConfig {
                powertrain: Powertrain::BevDepot,
                size: SizeClass::City13m,
                year: 2030
            }
        );
    }

    #[test]
    fn test_select_any_powertrain() {
        let scope = scope();
        let selected = scope.select(&VariantQuery::any(&[Powertrain::BevDepot]));
        assert_eq!(selected, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_select_all_powertrain_and_year() {
        let scope = scope();
        let selected = scope.select(&VariantQuery::all(&[Powertrain::IcevD], 2030));
        assert_eq!(selected, vec![1, 3]);
        for i in selected {
            let config = scope.configs()[i];
            assert_eq!(config.powertrain, Powertrain::IcevD);
            assert_eq!(config.year, 2030);
        }
    }

    #[test]
    fn test_select_any_with_year_widens() {
        let scope = scope();
        let query = VariantQuery {
            powertrains: vec![Powertrain::BevDepot],
            years: vec![2020],
            mode: CombineMode::Any,
        };
        // Any: BEV-depot configs of either year plus ICEV-d configs of 2020.
        assert_eq!(scope.select(&query), vec![0, 2, 4, 5, 6, 7]);
    }

    #[test]
    fn test_absent_variant_selects_nothing() {
        let scope = scope();
        let selected = scope.select(&VariantQuery::any(&[Powertrain::Fcev]));
        assert!(selected.is_empty());
    }

    #[test]
    fn test_urban_profile_set() {
        assert!(SizeClass::Midibus9m.is_urban_profile());
        assert!(SizeClass::City13m.is_urban_profile());
        assert!(SizeClass::CityDouble13m.is_urban_profile());
        assert!(!SizeClass::Coach13m.is_urban_profile());
        assert!(!SizeClass::CoachDouble13m.is_urban_profile());
        assert!(!SizeClass::Articulated18m.is_urban_profile());
    }

    #[test]
    fn test_tokens_round_trip() {
        for powertrain in Powertrain::ALL {
            assert_eq!(powertrain.token().parse::<Powertrain>().unwrap(), powertrain);
        }
        for size in SizeClass::ALL {
            assert_eq!(size.token().parse::<SizeClass>().unwrap(), size);
        }
        assert!("ICEV-x".parse::<Powertrain>().is_err());
    }
}
