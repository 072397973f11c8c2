//! Mining yield, power draw, energy cost and wear.
//!
//! Wear reduces effective hashrate but not power draw: a worn rig earns
//! less while still drawing its full nameplate power.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tycoon_types::{EnergyContract, Rig, RigId, RigStatus, Site, SiteId};

use crate::LedgerError;

/// Seconds per hour, for kW to kWh conversion.
const SECS_PER_HOUR: f64 = 3600.0;

/// Upper bound of rig wear.
pub const MAX_WEAR: f64 = 100.0;

/// Tunables for the mining ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningParams {
    /// BTC paid per block.
    pub block_reward: f64,
    /// Average seconds between blocks.
    pub block_interval_secs: f64,
    /// Wear added to each active rig per tick.
    pub wear_per_tick: f64,
    /// Total width of the uniform per-tick uptime noise.
    pub uptime_noise: f64,
    /// Lowest site uptime.
    pub uptime_min: f64,
    /// Highest site uptime.
    pub uptime_max: f64,
    /// USD balance under which a company is warned.
    pub low_balance_threshold: f64,
}

impl Default for MiningParams {
    fn default() -> Self {
        Self {
            block_reward: 6.25,
            block_interval_secs: 600.0,
            wear_per_tick: 0.001,
            uptime_noise: 0.5,
            uptime_min: 90.0,
            uptime_max: 100.0,
            low_balance_threshold: 1000.0,
        }
    }
}

impl MiningParams {
    /// Rejects parameter blocks the ledger cannot run with.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let checks = [
            (
                "mining.block_reward",
                self.block_reward,
                self.block_reward >= 0.0 && self.block_reward.is_finite(),
            ),
            (
                "mining.block_interval_secs",
                self.block_interval_secs,
                self.block_interval_secs > 0.0,
            ),
            (
                "mining.wear_per_tick",
                self.wear_per_tick,
                self.wear_per_tick >= 0.0 && self.wear_per_tick.is_finite(),
            ),
            (
                "mining.uptime_noise",
                self.uptime_noise,
                self.uptime_noise >= 0.0 && self.uptime_noise.is_finite(),
            ),
            (
                "mining.uptime_min",
                self.uptime_min,
                (0.0..=self.uptime_max).contains(&self.uptime_min),
            ),
            ("mining.uptime_max", self.uptime_max, self.uptime_max <= 100.0),
        ];
        match checks.into_iter().find(|(_, _, ok)| !ok) {
            Some((field, value, _)) => Err(LedgerError::InvalidParameter { field, value }),
            None => Ok(()),
        }
    }

    /// Whether `usd_balance` should trigger a low-balance warning.
    pub fn is_low_balance(&self, usd_balance: f64) -> bool {
        usd_balance < self.low_balance_threshold
    }
}

// ---------------------------------------------------------------------------
// Rig-level math
// ---------------------------------------------------------------------------

/// Hashrate after wear: `hashrate * (1 - wear / 200)`.
pub fn effective_hashrate(rig: &Rig) -> f64 {
    rig.hashrate * (1.0 - rig.wear.clamp(0.0, MAX_WEAR) / 200.0)
}

/// Power draw in kW from nameplate hashrate: `efficiency * hashrate / 1000`.
pub fn rig_power_kw(rig: &Rig) -> f64 {
    rig.efficiency * rig.hashrate / 1000.0
}

/// Wear after one tick of activity, kept within `0..=MAX_WEAR`.
pub fn next_wear(wear: f64, increment: f64) -> f64 {
    (wear + increment.max(0.0)).clamp(0.0, MAX_WEAR)
}

// ---------------------------------------------------------------------------
// Site-level math
// ---------------------------------------------------------------------------

/// BTC earned in one tick by `effective_hashrate` against the network.
pub fn block_yield(
    params: &MiningParams,
    tick_secs: f64,
    effective_hashrate: f64,
    network_hashrate: f64,
) -> f64 {
    if network_hashrate <= 0.0 {
        return 0.0;
    }
    (effective_hashrate / network_hashrate)
        * params.block_reward
        * (tick_secs / params.block_interval_secs)
}

/// USD cost of drawing `power_kw` for one tick at `price_per_kwh`.
pub fn energy_cost(power_kw: f64, price_per_kwh: f64, tick_secs: f64) -> f64 {
    power_kw * price_per_kwh * (tick_secs / SECS_PER_HOUR)
}

/// Site uptime after applying `noise`, clamped to the configured band.
pub fn next_uptime(params: &MiningParams, uptime: f64, noise: f64) -> f64 {
    (uptime + noise).clamp(params.uptime_min, params.uptime_max)
}

/// Contract price in force at `at`, if any.
///
/// When several windows overlap, the most recently started contract wins.
pub fn active_contract_price(contracts: &[EnergyContract], at: DateTime<Utc>) -> Option<f64> {
    contracts
        .iter()
        .filter(|c| c.is_active_at(at))
        .max_by_key(|c| c.starts_at)
        .map(|c| c.price_per_kwh)
}

/// Wear update for one rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigWear {
    /// Rig that wore.
    pub rig_id: RigId,
    /// Wear after this tick.
    pub wear: f64,
}

/// Everything one site produced in one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteOutcome {
    /// Site the outcome belongs to.
    pub site_id: SiteId,
    /// Sum of wear-adjusted hashrate over active rigs.
    pub total_hashrate: f64,
    /// `total_hashrate` scaled by uptime.
    pub effective_hashrate: f64,
    /// Nameplate power draw of active rigs in kW.
    pub power_kw: f64,
    /// Energy price applied, contract or spot.
    pub energy_price: f64,
    /// BTC mined.
    pub btc_mined: f64,
    /// USD spent on energy.
    pub energy_cost: f64,
    /// Uptime to store for the next tick.
    pub next_uptime: f64,
    /// Wear updates for rigs that actually ran.
    pub rig_wear: Vec<RigWear>,
}

/// Tick-wide inputs shared by every site.
#[derive(Debug, Clone, Copy)]
pub struct MiningEnv<'a> {
    /// Ledger tunables.
    pub params: &'a MiningParams,
    /// Tick length in seconds.
    pub tick_secs: f64,
    /// Network hashrate for this tick.
    pub network_hashrate: f64,
}

/// Runs one site through a tick.
///
/// `spot_price` is the region's energy price; `contract_price` overrides
/// it when present. Only `ACTIVE` rigs hash, draw power and wear. Uptime
/// from the start of the tick scales this tick's output; the noisy uptime
/// is what the site carries into the next tick.
pub fn compute_site<R>(
    rng: &mut R,
    env: MiningEnv<'_>,
    site: &Site,
    rigs: &[Rig],
    spot_price: f64,
    contract_price: Option<f64>,
) -> SiteOutcome
where
    R: Rng + ?Sized,
{
    let params = env.params;
    let active = rigs.iter().filter(|r| r.status == RigStatus::Active);

    let mut total_hashrate = 0.0;
    let mut power_kw = 0.0;
    let mut rig_wear = Vec::new();
    for rig in active {
        total_hashrate += effective_hashrate(rig);
        power_kw += rig_power_kw(rig);
        rig_wear.push(RigWear {
            rig_id: rig.id,
            wear: next_wear(rig.wear, params.wear_per_tick),
        });
    }

    let effective = total_hashrate * (site.uptime / 100.0);
    let energy_price = contract_price.unwrap_or(spot_price);
    let half = params.uptime_noise / 2.0;
    let noise = if half > 0.0 && half.is_finite() {
        rng.random_range(-half..=half)
    } else {
        0.0
    };

    SiteOutcome {
        site_id: site.id,
        total_hashrate,
        effective_hashrate: effective,
        power_kw,
        energy_price,
        btc_mined: block_yield(params, env.tick_secs, effective, env.network_hashrate),
        energy_cost: energy_cost(power_kw, energy_price, env.tick_secs),
        next_uptime: next_uptime(params, site.uptime, noise),
        rig_wear,
    }
}

/// Per-company totals across all sites for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompanyYield {
    /// BTC mined across all sites.
    pub btc_mined: f64,
    /// USD spent on energy across all sites.
    pub energy_cost: f64,
}

impl CompanyYield {
    /// Folds one site's outcome into the totals.
    pub fn add(&mut self, site: &SiteOutcome) {
        self.btc_mined += site.btc_mined;
        self.energy_cost += site.energy_cost;
    }

    /// Whether the company had any mining activity this tick.
    pub fn is_empty(&self) -> bool {
        self.btc_mined == 0.0 && self.energy_cost == 0.0
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::arithmetic_side_effects
)]
mod tests {
    use chrono::Duration;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tycoon_types::{CompanyId, ContractId, Region};

    use super::*;

    fn rig(hashrate: f64, efficiency: f64, wear: f64, status: RigStatus) -> Rig {
        Rig {
            id: RigId::new(),
            site_id: SiteId::new(),
            model: "ANTMINER_S19".to_owned(),
            hashrate,
            efficiency,
            wear,
            status,
            created_at: Utc::now(),
        }
    }

    fn site(uptime: f64) -> Site {
        Site {
            id: SiteId::new(),
            company_id: CompanyId::new(),
            name: "Test".to_owned(),
            region: Region::UsWest,
            uptime,
            total_hashrate: 0.0,
            power_usage: 0.0,
            created_at: Utc::now(),
        }
    }

    fn env(params: &MiningParams) -> MiningEnv<'_> {
        MiningEnv {
            params,
            tick_secs: 5.0,
            network_hashrate: 450e6,
        }
    }

    fn contract(price: f64, starts_at: DateTime<Utc>, days: i64) -> EnergyContract {
        EnergyContract {
            id: ContractId::new(),
            site_id: SiteId::new(),
            price_per_kwh: price,
            starts_at,
            ends_at: starts_at + Duration::days(days),
        }
    }

    #[test]
    fn fully_worn_rig_runs_at_half_speed() {
        let r = rig(110.0, 29.5, 100.0, RigStatus::Active);
        assert_eq!(effective_hashrate(&r), 55.0);
    }

    #[test]
    fn fresh_rig_runs_at_nameplate() {
        let r = rig(110.0, 29.5, 0.0, RigStatus::Active);
        assert_eq!(effective_hashrate(&r), 110.0);
    }

    #[test]
    fn power_ignores_wear() {
        let fresh = rig(100.0, 30.0, 0.0, RigStatus::Active);
        let worn = rig(100.0, 30.0, 80.0, RigStatus::Active);
        assert_eq!(rig_power_kw(&fresh), 3.0);
        assert_eq!(rig_power_kw(&worn), 3.0);
    }

    #[test]
    fn wear_is_capped_and_monotonic() {
        assert_eq!(next_wear(99.9995, 0.001), 100.0);
        assert_eq!(next_wear(100.0, 0.001), 100.0);
        assert!(next_wear(10.0, 0.001) > 10.0);
        assert_eq!(next_wear(10.0, -5.0), 10.0);
    }

    #[test]
    fn out_of_range_wear_is_pulled_back() {
        assert_eq!(next_wear(150.0, 0.001), 100.0);
        assert_eq!(next_wear(-3.0, 0.001), 0.0);
    }

    #[test]
    fn proportional_share_yield() {
        let params = MiningParams::default();
        let btc = block_yield(&params, 5.0, 45_000.0, 450_000_000.0);
        let expected = (45_000.0 / 450_000_000.0) * 6.25 * (5.0 / 600.0);
        assert!((btc - expected).abs() < 1e-15);
        assert!((btc - 0.000_005_208_3).abs() < 1e-10);
    }

    #[test]
    fn zero_network_yields_nothing() {
        let params = MiningParams::default();
        assert_eq!(block_yield(&params, 5.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn uptime_stays_in_band() {
        let params = MiningParams::default();
        assert_eq!(next_uptime(&params, 99.9, 0.25), 100.0);
        assert_eq!(next_uptime(&params, 90.1, -0.25), 90.0);
        assert!((next_uptime(&params, 95.0, 0.1) - 95.1).abs() < 1e-9);
    }

    #[test]
    fn newest_active_contract_wins() {
        let now = Utc::now();
        let older = contract(0.04, now - Duration::days(10), 30);
        let newer = contract(0.05, now - Duration::days(1), 30);
        let expired = contract(0.01, now - Duration::days(60), 30);
        let future = contract(0.02, now + Duration::days(1), 30);
        let contracts = [older, newer, expired, future];
        assert_eq!(active_contract_price(&contracts, now), Some(0.05));
        assert_eq!(active_contract_price(&contracts[2..], now), None);
    }

    #[test]
    fn site_totals_skip_inactive_rigs() {
        let params = MiningParams {
            uptime_noise: 0.0,
            ..MiningParams::default()
        };
        let s = site(100.0);
        let rigs = [
            rig(100.0, 30.0, 0.0, RigStatus::Active),
            rig(100.0, 30.0, 100.0, RigStatus::Active),
            rig(500.0, 30.0, 0.0, RigStatus::Offline),
            rig(500.0, 30.0, 0.0, RigStatus::Broken),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let out = compute_site(&mut rng, env(&params), &s, &rigs, 0.08, None);

        assert_eq!(out.total_hashrate, 150.0);
        assert_eq!(out.effective_hashrate, 150.0);
        assert_eq!(out.power_kw, 6.0);
        assert_eq!(out.rig_wear.len(), 2);
        assert_eq!(out.next_uptime, 100.0);
        assert!((out.energy_cost - 6.0 * 0.08 * 5.0 / 3600.0).abs() < 1e-15);
    }

    #[test]
    fn uptime_scales_effective_hashrate() {
        let params = MiningParams::default();
        let s = site(90.0);
        let rigs = [rig(100.0, 30.0, 0.0, RigStatus::Active)];
        let mut rng = StdRng::seed_from_u64(2);
        let out = compute_site(&mut rng, env(&params), &s, &rigs, 0.08, None);
        assert!((out.effective_hashrate - 90.0).abs() < 1e-9);
        assert!((90.0..=100.0).contains(&out.next_uptime));
    }

    #[test]
    fn contract_overrides_spot_price() {
        let params = MiningParams::default();
        let s = site(100.0);
        let rigs = [rig(100.0, 30.0, 0.0, RigStatus::Active)];
        let mut rng = StdRng::seed_from_u64(3);
        let out = compute_site(&mut rng, env(&params), &s, &rigs, 0.15, Some(0.04));
        assert_eq!(out.energy_price, 0.04);
    }

    #[test]
    fn company_totals_accumulate() {
        let params = MiningParams {
            uptime_noise: 0.0,
            ..MiningParams::default()
        };
        let rigs = [rig(100.0, 30.0, 0.0, RigStatus::Active)];
        let mut rng = StdRng::seed_from_u64(4);
        let mut totals = CompanyYield::default();
        assert!(totals.is_empty());
        for _ in 0..3 {
            let out = compute_site(&mut rng, env(&params), &site(100.0), &rigs, 0.08, None);
            totals.add(&out);
        }
        assert!(!totals.is_empty());
        assert!((totals.energy_cost - 3.0 * 3.0 * 0.08 * 5.0 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_noise_is_rejected() {
        for noise in [f64::INFINITY, f64::NAN] {
            let params = MiningParams {
                uptime_noise: noise,
                ..MiningParams::default()
            };
            assert!(matches!(
                params.validate(),
                Err(LedgerError::InvalidParameter {
                    field: "mining.uptime_noise",
                    ..
                })
            ));
        }
        let params = MiningParams {
            wear_per_tick: f64::INFINITY,
            ..MiningParams::default()
        };
        assert!(params.validate().is_err());
        assert!(MiningParams::default().validate().is_ok());
    }

    #[test]
    fn low_balance_threshold_is_strict() {
        let params = MiningParams::default();
        assert!(params.is_low_balance(999.99));
        assert!(!params.is_low_balance(1000.0));
    }
}
