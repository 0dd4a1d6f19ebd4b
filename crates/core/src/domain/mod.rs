pub mod aml;
pub mod company;
pub mod contract;
pub mod record;
pub mod score;
