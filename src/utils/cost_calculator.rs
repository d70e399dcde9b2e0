// ABOUTME: cost_calculator turns Gemini token usage into a dollar breakdown
// Holds the static model catalog and its per-million-token pricing

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Models offered for OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrModel {
    /// Fast and low cost
    Flash,
    /// Slower, higher accuracy
    Pro,
}

impl Default for OcrModel {
    fn default() -> Self {
        OcrModel::Flash
    }
}

impl OcrModel {
    pub const ALL: [OcrModel; 2] = [OcrModel::Flash, OcrModel::Pro];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "flash" | "gemini-2.5-flash" | "gemini-2.5-flash-preview-05-20" => Some(Self::Flash),
            "pro" | "gemini-2.5-pro" | "gemini-2.5-pro-preview-06-05" => Some(Self::Pro),
            _ => None,
        }
    }

    /// Model identifier sent to the API
    pub fn id(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash-preview-05-20",
            Self::Pro => "gemini-2.5-pro-preview-06-05",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Flash => "Gemini 2.5 Flash",
            Self::Pro => "Gemini 2.5 Pro",
        }
    }

    pub fn tagline(&self) -> &'static str {
        match self {
            Self::Flash => "fast, low cost",
            Self::Pro => "high accuracy",
        }
    }

    /// The other model in the two-entry catalog
    pub fn toggle(self) -> Self {
        match self {
            Self::Flash => Self::Pro,
            Self::Pro => Self::Flash,
        }
    }

    pub fn pricing(&self) -> ModelPricing {
        match self {
            Self::Flash => ModelPricing::from_million_tokens(0.15, 0.60),
            Self::Pro => ModelPricing::from_million_tokens(1.25, 10.00),
        }
    }
}

impl std::fmt::Display for OcrModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Per-token prices for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Cost per million input tokens in USD
    pub input_cost_per_million: f64,
    /// Cost per million output tokens in USD
    pub output_cost_per_million: f64,
}

impl ModelPricing {
    pub fn from_million_tokens(input_cost_per_million: f64, output_cost_per_million: f64) -> Self {
        Self {
            input_cost_per_million,
            output_cost_per_million,
        }
    }

    pub fn free() -> Self {
        Self::from_million_tokens(0.0, 0.0)
    }
}

/// Cost of a single OCR run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

pub struct CostCalculator {
    pricing_data: HashMap<String, ModelPricing>,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl CostCalculator {
    /// Create a calculator seeded with the built-in model catalog
    pub fn new() -> Self {
        let pricing_data = OcrModel::ALL
            .iter()
            .map(|model| (model.id().to_string(), model.pricing()))
            .collect();

        Self { pricing_data }
    }

    /// Calculate the cost of a run from its token counts.
    ///
    /// Unknown model identifiers are priced at zero rather than rejected, so a
    /// completed run is always recorded.
    pub fn compute_cost(&self, model_id: &str, input_tokens: u64, output_tokens: u64) -> CostBreakdown {
        let pricing = self.get_pricing(model_id);

        let input_cost = input_tokens as f64 / 1_000_000.0 * pricing.input_cost_per_million;
        let output_cost = output_tokens as f64 / 1_000_000.0 * pricing.output_cost_per_million;

        CostBreakdown {
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }

    fn get_pricing(&self, model_id: &str) -> ModelPricing {
        match self.pricing_data.get(model_id) {
            Some(pricing) => *pricing,
            None => {
                warn!(model = model_id, "no pricing for model, treating run as free");
                ModelPricing::free()
            }
        }
    }

    /// Format cost as USD string
    pub fn format_cost(cost: f64) -> String {
        if cost < 0.01 {
            format!("${:.5}", cost)
        } else {
            format!("${:.2}", cost)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_cost_calculation_flash() {
        let calculator = CostCalculator::new();
        let cost = calculator.compute_cost(OcrModel::Flash.id(), 1000, 500);

        // (1000 * 0.15/1M) + (500 * 0.60/1M) = 0.00015 + 0.0003
        assert!(approx(cost.input_cost, 0.00015));
        assert!(approx(cost.output_cost, 0.0003));
        assert!(approx(cost.total_cost, 0.00045));
    }

    #[test]
    fn test_cost_calculation_pro() {
        let calculator = CostCalculator::new();
        let cost = calculator.compute_cost(OcrModel::Pro.id(), 2000, 1000);

        // (2000 * 1.25/1M) + (1000 * 10/1M) = 0.0025 + 0.01
        assert!(approx(cost.input_cost, 0.0025));
        assert!(approx(cost.output_cost, 0.01));
        assert!(approx(cost.total_cost, 0.0125));
    }

    #[test]
    fn test_zero_tokens() {
        let calculator = CostCalculator::new();

        let cost = calculator.compute_cost(OcrModel::Pro.id(), 0, 750);
        assert_eq!(cost.input_cost, 0.0);
        assert!(approx(cost.total_cost, cost.output_cost));

        let cost = calculator.compute_cost(OcrModel::Flash.id(), 0, 0);
        assert_eq!(cost, CostBreakdown::default());
    }

    #[test]
    fn test_unknown_model_is_free() {
        let calculator = CostCalculator::new();
        let cost = calculator.compute_cost("gemini-1.0-ultra", 1_000_000, 1_000_000);

        assert_eq!(cost.input_cost, 0.0);
        assert_eq!(cost.output_cost, 0.0);
        assert_eq!(cost.total_cost, 0.0);
    }

    #[test]
    fn test_costs_are_non_negative() {
        let calculator = CostCalculator::new();
        for model in OcrModel::ALL {
            for (input, output) in [(0, 0), (1, 0), (0, 1), (123_456, 7_890), (u32::MAX as u64, 1)] {
                let cost = calculator.compute_cost(model.id(), input, output);
                assert!(cost.input_cost >= 0.0);
                assert!(cost.output_cost >= 0.0);
                assert!(approx(cost.total_cost, cost.input_cost + cost.output_cost));
            }
        }
    }

    #[test]
    fn test_model_lookup() {
        assert_eq!(OcrModel::from_str("flash"), Some(OcrModel::Flash));
        assert_eq!(OcrModel::from_str("PRO"), Some(OcrModel::Pro));
        assert_eq!(OcrModel::from_str(OcrModel::Pro.id()), Some(OcrModel::Pro));
        assert_eq!(OcrModel::from_str("ultra"), None);
        assert_eq!(OcrModel::Flash.toggle(), OcrModel::Pro);
        assert_eq!(OcrModel::Pro.toggle(), OcrModel::Flash);
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(CostCalculator::format_cost(0.00045), "$0.00045");
        assert_eq!(CostCalculator::format_cost(0.01), "$0.01");
        assert_eq!(CostCalculator::format_cost(1.234), "$1.23");
        assert_eq!(CostCalculator::format_cost(1234.56), "$1234.56");
    }
}
