pub mod median;
pub mod resolver;
pub mod rules;

pub use resolver::ItemPriceResolver;
pub use rules::PricingRules;
