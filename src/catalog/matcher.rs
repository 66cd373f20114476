//! Classification of account states against contract interfaces.

use crate::models::{AccountState, ContractInterface};

fn matches_by_address(i: &ContractInterface, state: &AccountState) -> bool {
    i.addresses.contains(&state.address)
}

fn matches_by_code(i: &ContractInterface, state: &AccountState) -> bool {
    match (&i.code_hash, &state.code_hash) {
        (Some(want), Some(have)) => want == have,
        _ => false,
    }
}

fn matches_by_get_methods(i: &ContractInterface, state: &AccountState) -> bool {
    i.matches_by_get_methods_only()
        && i.get_method_hashes
            .iter()
            .all(|h| state.get_method_hashes.contains(h))
}

/// Returns the interfaces implemented by `state`, most specific criterion
/// first: an address match hides code-hash matches, which in turn hide
/// get-method matches.
pub fn match_interfaces<'a>(
    interfaces: &'a [ContractInterface],
    state: &AccountState,
) -> Vec<&'a ContractInterface> {
    let tiers: [fn(&ContractInterface, &AccountState) -> bool; 3] =
        [matches_by_address, matches_by_code, matches_by_get_methods];

    for tier in tiers {
        let matched: Vec<_> = interfaces.iter().filter(|i| tier(i, state)).collect();
        if !matched.is_empty() {
            return matched;
        }
    }

    Vec::new()
}
