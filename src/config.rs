use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::market::ClientConfig;
use crate::pricing::PricingRules;
use crate::run::{Granularity, RunOptions};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub export_url: String,
    pub shard_url_prefix: String,
    pub api_base_url: String,
    /// Comma-separated
    pub api_keys: String,

    pub output_path: String,

    // Pricing
    pub min_price: String,
    pub max_price: String,
    pub min_sales: usize,
    pub max_gap_days: u32,
    pub bid_trigger: String,
    pub bid_ratio: String,
    pub ask_margin: String,
    pub ask_ratio: String,
    /// Comma-separated name prefixes skipped before pricing
    pub excluded_prefixes: String,

    // Throughput
    pub concurrency: usize,
    pub item_delay_ms: u64,
    pub queue_granularity: String,
    pub rate_limit_cooldown_ms: u64,
    pub http_timeout_sec: u64,

    // Stats
    pub stats_log_sec: u64,
    pub stats_jsonl_path: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::load(config::Environment::default())
    }

    fn load(env: config::Environment) -> anyhow::Result<Self> {
        let c = config::Config::builder()
            .set_default("export_url", "https://market.csgo.com/api/full-export/RUB.json")?
            .set_default("shard_url_prefix", "https://market.csgo.com/api/full-export/")?
            .set_default("api_base_url", "https://market.csgo.com/api/v2")?
            .set_default("output_path", "Skins.txt")?
            .set_default("min_price", "700")?
            .set_default("max_price", "10000")?
            .set_default("min_sales", 5_i64)?
            .set_default("max_gap_days", 30_i64)?
            .set_default("bid_trigger", "1.10")?
            .set_default("bid_ratio", "1.05")?
            .set_default("ask_margin", "0.10")?
            .set_default("ask_ratio", "0.90")?
            .set_default("excluded_prefixes", "Sticker |,Souvenir")?
            .set_default("concurrency", 10_i64)?
            .set_default("item_delay_ms", 10_000_i64)?
            .set_default("queue_granularity", "shard")?
            .set_default("rate_limit_cooldown_ms", 60_000_i64)?
            .set_default("http_timeout_sec", 30_i64)?
            .set_default("stats_log_sec", 60_i64)?
            .add_source(env)
            .build()?;
        let s: Settings = c.try_deserialize()?;
        s.validate()?;
        Ok(s)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.api_key_list().is_empty() {
            anyhow::bail!("API_KEYS must contain at least one key");
        }
        if self.concurrency == 0 {
            anyhow::bail!("CONCURRENCY must be at least 1");
        }
        let rules = self.pricing_rules()?;
        if rules.min_price > rules.max_price {
            anyhow::bail!(
                "MIN_PRICE ({}) is above MAX_PRICE ({})",
                rules.min_price,
                rules.max_price
            );
        }
        self.granularity()?;
        Ok(())
    }

    pub fn api_key_list(&self) -> Vec<String> {
        split_list(&self.api_keys)
    }

    pub fn pricing_rules(&self) -> anyhow::Result<PricingRules> {
        Ok(PricingRules {
            min_price: parse_decimal("MIN_PRICE", &self.min_price)?,
            max_price: parse_decimal("MAX_PRICE", &self.max_price)?,
            min_sales: self.min_sales,
            max_gap_days: Decimal::from(self.max_gap_days),
            bid_trigger: parse_decimal("BID_TRIGGER", &self.bid_trigger)?,
            bid_ratio: parse_decimal("BID_RATIO", &self.bid_ratio)?,
            ask_margin: parse_decimal("ASK_MARGIN", &self.ask_margin)?,
            ask_ratio: parse_decimal("ASK_RATIO", &self.ask_ratio)?,
        })
    }

    pub fn granularity(&self) -> anyhow::Result<Granularity> {
        match self.queue_granularity.trim().to_ascii_lowercase().as_str() {
            "shard" => Ok(Granularity::Shard),
            "item" => Ok(Granularity::Item),
            other => anyhow::bail!("QUEUE_GRANULARITY must be `shard` or `item`, got `{other}`"),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            export_url: self.export_url.clone(),
            shard_url_prefix: self.shard_url_prefix.clone(),
            api_base_url: self.api_base_url.clone(),
            rate_limit_cooldown: Duration::from_millis(self.rate_limit_cooldown_ms),
            http_timeout: Duration::from_secs(self.http_timeout_sec),
        }
    }

    pub fn run_options(&self) -> anyhow::Result<RunOptions> {
        Ok(RunOptions {
            rules: self.pricing_rules()?,
            excluded_prefixes: split_list(&self.excluded_prefixes),
            concurrency: self.concurrency,
            item_delay: Duration::from_millis(self.item_delay_ms),
            granularity: self.granularity()?,
            output_path: self.output_path.clone().into(),
        })
    }
}

fn parse_decimal(name: &str, s: &str) -> anyhow::Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("{name} is not a decimal: `{s}`"))
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let s = Settings::load(env(&[("API_KEYS", "k1, k2")])).unwrap();
        assert_eq!(s.api_key_list(), vec!["k1", "k2"]);
        assert_eq!(s.concurrency, 10);
        assert_eq!(s.item_delay_ms, 10_000);
        assert_eq!(s.rate_limit_cooldown_ms, 60_000);
        assert_eq!(s.output_path, "Skins.txt");
        assert_eq!(s.granularity().unwrap(), Granularity::Shard);

        let r = s.pricing_rules().unwrap();
        assert_eq!(r.min_price, dec!(700));
        assert_eq!(r.max_price, dec!(10000));
        assert_eq!(r.min_sales, 5);
        assert_eq!(r.max_gap_days, dec!(30));
        assert_eq!(r.bid_trigger, dec!(1.10));
        assert_eq!(r.ask_ratio, dec!(0.90));

        let opts = s.run_options().unwrap();
        assert_eq!(opts.excluded_prefixes, vec!["Sticker |", "Souvenir"]);
    }

    #[test]
    fn test_overrides() {
        let s = Settings::load(env(&[
            ("API_KEYS", "a"),
            ("MIN_PRICE", "50.5"),
            ("CONCURRENCY", "5"),
            ("QUEUE_GRANULARITY", "item"),
            ("EXCLUDED_PREFIXES", "Sticker |, Patch |,Souvenir"),
        ]))
        .unwrap();
        assert_eq!(s.pricing_rules().unwrap().min_price, dec!(50.5));
        assert_eq!(s.concurrency, 5);
        assert_eq!(s.granularity().unwrap(), Granularity::Item);
        assert_eq!(
            s.run_options().unwrap().excluded_prefixes,
            vec!["Sticker |", "Patch |", "Souvenir"]
        );
    }

    #[test]
    fn test_missing_keys_fail_fast() {
        assert!(Settings::load(env(&[])).is_err());
        assert!(Settings::load(env(&[("API_KEYS", " , ")])).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Settings::load(env(&[("API_KEYS", "a"), ("MIN_PRICE", "abc")])).is_err());
        assert!(Settings::load(env(&[("API_KEYS", "a"), ("MIN_PRICE", "20000")])).is_err());
        assert!(Settings::load(env(&[("API_KEYS", "a"), ("CONCURRENCY", "0")])).is_err());
        assert!(Settings::load(env(&[("API_KEYS", "a"), ("QUEUE_GRANULARITY", "batch")])).is_err());
    }
}
