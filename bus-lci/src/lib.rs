//! # Bus Life-Cycle Inventory
//!
//! Assembles the technosphere coefficient matrix for bus fleets: for every
//! combination of powertrain variant, size class and calendar year in scope,
//! the [`InventoryBuilder`] maps vehicle attributes (masses, energy flows,
//! distances, lifetimes) onto matrix coefficients covering manufacturing,
//! energy supply, maintenance, infrastructure amortization and end-of-life
//! treatment. Solving the assembled matrix is left to collaborators.

pub mod error;
pub mod flows;
pub mod inventory;
pub mod particulates;
pub mod scope;

pub use error::BusLciError;
pub use flows::FlowTable;
pub use inventory::{ContributionSet, InventoryBuilder, required_parameters};
pub use particulates::{AbrasionEmissions, ParticulatesEmissionsModel, WearCategory};
pub use scope::{CombineMode, Powertrain, SizeClass, VariantQuery, VehicleConfig, VehicleScope};
