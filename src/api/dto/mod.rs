//! Data Transfer Objects for REST response serialization.

pub mod kpi_dto;
pub mod system_dto;
pub mod unit_dto;

pub use kpi_dto::*;
pub use system_dto::*;
pub use unit_dto::*;
