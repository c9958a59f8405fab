use super::types::{ArbitrageOutcome, ArbitrageReceipt, ExecutedTrade};
use crate::amount;
use ethers::types::U256;
use tracing::{info, warn};

/// Classify a receipt and convert its amounts to human units.
///
/// Codes 0 and 5 never yield a trade, and neither does an unknown code: the
/// amounts are only trusted when the contract says it traded.
pub fn decode_receipt(receipt: &ArbitrageReceipt) -> (ArbitrageOutcome, Option<ExecutedTrade>) {
    let code = if receipt.action_type > U256::from(u64::MAX) {
        u64::MAX
    } else {
        receipt.action_type.as_u64()
    };
    let outcome = ArbitrageOutcome::from_code(code);
    let trade = match outcome {
        ArbitrageOutcome::Executed(_) => Some(ExecutedTrade {
            amount_chosen: amount::to_decimal_string(receipt.amount_chosen),
            profit_achieved: amount::to_decimal_string(receipt.profit_achieved),
        }),
        _ => None,
    };
    (outcome, trade)
}

/// Log a decoded invocation the same way for every scenario.
pub fn log_outcome(outcome: ArbitrageOutcome, trade: Option<&ExecutedTrade>, raw: &ArbitrageReceipt) {
    match (outcome, trade) {
        (ArbitrageOutcome::Executed(route), Some(trade)) => info!(
            route = %route,
            amount_chosen = %trade.amount_chosen,
            profit_achieved = %trade.profit_achieved,
            "[ARB] arbitrage executed"
        ),
        (ArbitrageOutcome::Unrecognized(code), _) => warn!(
            code,
            amount_chosen = %amount::to_decimal_string(raw.amount_chosen),
            profit_achieved = %amount::to_decimal_string(raw.profit_achieved),
            "[ARB] unrecognized action type, no trade reported"
        ),
        (outcome, _) => info!(outcome = %outcome, "[ARB] no trade"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::units;
    use crate::arbitrage::types::Route;

    fn receipt(code: u64, amount: U256, profit: U256) -> ArbitrageReceipt {
        ArbitrageReceipt {
            action_type: U256::from(code),
            amount_chosen: amount,
            profit_achieved: profit,
        }
    }

    #[test]
    fn codes_zero_and_five_never_report_trade() {
        for code in [0u64, 5] {
            let (outcome, trade) = decode_receipt(&receipt(code, units(40), units(2)));
            assert_eq!(outcome.code(), code);
            assert!(trade.is_none());
        }
    }

    #[test]
    fn profitable_codes_report_converted_amounts() {
        let routes = [
            Route::BabPool1First,
            Route::AbaPool2First,
            Route::BabPool2First,
            Route::AbaPool1First,
        ];
        for (code, route) in (1u64..=4).zip(routes) {
            let (outcome, trade) =
                decode_receipt(&receipt(code, units(25), units(3) / U256::from(2u8)));
            assert_eq!(outcome, ArbitrageOutcome::Executed(route));
            let trade = trade.expect("trade for executed route");
            assert_eq!(trade.amount_chosen, "25");
            assert_eq!(trade.profit_achieved, "1.5");
            assert!(!trade.profit_achieved.starts_with('-'));
        }
    }

    #[test]
    fn unknown_codes_are_flagged() {
        let (outcome, trade) = decode_receipt(&receipt(9, units(1), units(1)));
        assert_eq!(outcome, ArbitrageOutcome::Unrecognized(9));
        assert!(trade.is_none());

        let huge = ArbitrageReceipt {
            action_type: U256::MAX,
            amount_chosen: U256::zero(),
            profit_achieved: U256::zero(),
        };
        assert!(matches!(
            decode_receipt(&huge).0,
            ArbitrageOutcome::Unrecognized(_)
        ));
    }
}
