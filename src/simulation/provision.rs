//! Funding and approvals done by the deployer before any step runs.

use crate::amount;
use crate::dex::{AssetPair, Ledger};
use crate::errors::Result;
use ethers::types::{Address, U256};
use tracing::{debug, info};

/// Send `per_user` of both assets from `deployer` to every recipient.
pub async fn distribute<L: Ledger>(
    assets: &AssetPair<L>,
    deployer: Address,
    recipients: impl IntoIterator<Item = Address>,
    per_user: U256,
) -> Result<usize> {
    let mut funded = 0;
    for user in recipients {
        assets.token_a.transfer(deployer, user, per_user).await?;
        assets.token_b.transfer(deployer, user, per_user).await?;
        debug!(user = ?user, amount = %amount::to_decimal_string(per_user), "[INIT] funded");
        funded += 1;
    }
    info!(
        funded,
        per_user = %amount::to_decimal_string(per_user),
        "[INIT] tokens distributed"
    );
    Ok(funded)
}

/// Let `spender` pull up to `allowance` of both assets from every owner.
pub async fn approve_all<L: Ledger>(
    assets: &AssetPair<L>,
    owners: impl IntoIterator<Item = Address>,
    spender: Address,
    allowance: U256,
) -> Result<()> {
    for owner in owners {
        futures::try_join!(
            assets.token_a.approve(owner, spender, allowance),
            assets.token_b.approve(owner, spender, allowance),
        )?;
    }
    debug!(spender = ?spender, "[INIT] approvals granted");
    Ok(())
}
