//! Fund ticker resolution from remittance text.

use crate::ledger::FundTicker;

/// Resolves the fund a trade settlement refers to.
///
/// The text is split on anything that is not alphanumeric and every token is
/// compared to the known tickers. Exactly one distinct ticker must appear;
/// no match or conflicting tickers yield `None`.
#[must_use]
pub fn resolve_ticker(remittance: &str) -> Option<FundTicker> {
    let mut found: Option<FundTicker> = None;
    for token in remittance.split(|c: char| !c.is_ascii_alphanumeric()) {
        let Some(ticker) = FundTicker::parse(token) else {
            continue;
        };
        match found {
            None => found = Some(ticker),
            Some(existing) if existing == ticker => {}
            Some(_) => return None,
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("BUY TUK75 120.5 @ 1.02", Some(FundTicker::Tuk75))]
    #[case("sell tkf100/2026-10-14", Some(FundTicker::Tkf100))]
    #[case("TUV100 subscription TUV100", Some(FundTicker::Tuv100))]
    #[case("TUK00,TUK75 rebalance", None)]
    #[case("TUK750 units", None)]
    #[case("", None)]
    fn test_resolve(#[case] text: &str, #[case] expected: Option<FundTicker>) {
        assert_eq!(resolve_ticker(text), expected);
    }
}
