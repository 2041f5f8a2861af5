mod flow_error;

pub use flow_error::FlowTableError;
use derive_more::From;

use lci_core::LciCoreError;

pub type Result<T> = core::result::Result<T, BusLciError>;

#[derive(Debug, From)]
pub enum BusLciError {
    // -- Externals
    #[from]
    Core(LciCoreError),

    #[from]
    FlowTable(FlowTableError),

    DimensionError(String),
}

// region:    --- Error Boilerplate

impl core::fmt::Display for BusLciError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for BusLciError {}

// endregion: --- Error Boilerplate
