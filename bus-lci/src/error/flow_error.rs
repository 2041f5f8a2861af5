use lci_core::LciCoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowTableError {
    #[error("Inventory core error: {0}")]
    Core(#[from] LciCoreError), // Error from label resolution

    #[error("Scope declares no {0}")]
    EmptyScope(&'static str),

    #[error("Vehicle activity for configuration '{config}' could not be resolved: {source}")]
    VehicleActivity {
        config: String,
        source: LciCoreError,
    },

    #[error("Transport activity for configuration '{config}' could not be resolved: {source}")]
    TransportActivity {
        config: String,
        source: LciCoreError,
    },

    #[error("Unknown powertrain token: {0}")]
    UnknownPowertrain(String),

    #[error("Unknown size class token: {0}")]
    UnknownSizeClass(String),
}
