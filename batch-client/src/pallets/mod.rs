/// Pallet balances API
pub mod balances;
/// Pallet utility API
pub mod utility;
