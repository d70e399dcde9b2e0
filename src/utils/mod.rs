pub mod cost_calculator;
pub mod error;

pub use cost_calculator::{CostBreakdown, CostCalculator, ModelPricing, OcrModel};
pub use error::{OcrError, Result};
