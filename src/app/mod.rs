pub mod lead_sourcing_use_case;
pub mod ports;

pub use lead_sourcing_use_case::LeadSourcingUseCase;
